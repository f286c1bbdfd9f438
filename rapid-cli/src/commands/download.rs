//! Download command - fetch a file through the server and follow it.

use std::sync::Arc;

use console::style;
use rapid::cancellation::{CancelReason, Coordinator};
use rapid::config::ClientConfig;
use rapid::format::format_size;
use rapid::job::{Cookie, FetchRequest};
use rapid::notifier::StopOutcome;
use rapid::progress::{NullSink, ProgressSink};
use rapid::session::{DownloadSession, SessionOutcome};

use crate::error::CliError;
use crate::runner::{CliRunner, Overrides};
use crate::ui::{fetch_spinner, ChunkBars};

/// Arguments for the download command.
pub struct DownloadArgs {
    pub url: String,
    pub provider: Option<String>,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    pub cookies: Vec<String>,
    pub quiet: bool,
}

/// Run the download command. Returns the process exit code.
pub fn run(overrides: &Overrides, args: DownloadArgs) -> Result<i32, CliError> {
    let runner = CliRunner::new(overrides)?;
    runner.log_startup("download");
    let config = runner.config().clone();
    let request = build_request(&config, &args)?;

    let coordinator = Coordinator::new();
    runner.install_interrupt_handler(coordinator.clone())?;

    let sink: Arc<dyn ProgressSink> = if args.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(ChunkBars::new())
    };
    let session = DownloadSession::new(config, sink, coordinator)?;

    runner.block_on(async {
        let spinner = fetch_spinner(&request.url, args.quiet);
        let fetched = session.fetch(&request).await;
        spinner.finish_and_clear();
        let job = fetched?;

        print!("{}", job);
        println!("{}", job.headline());

        let outcome = session.observe(job).await;
        print_summary(&outcome);
        Ok::<_, CliError>(outcome.exit_code())
    })
}

/// Assemble the fetch body from flags, falling back to configured defaults.
fn build_request(config: &ClientConfig, args: &DownloadArgs) -> Result<FetchRequest, CliError> {
    if args.url.trim().is_empty() {
        return Err(CliError::InvalidArgument("url must not be empty".to_string()));
    }

    let provider = args
        .provider
        .clone()
        .unwrap_or_else(|| config.provider.clone());
    let mut request = FetchRequest::new(args.url.trim()).with_provider(provider);

    if let Some(user_agent) = &args.user_agent {
        request = request.with_user_agent(user_agent.clone());
    }
    if let Some(content_type) = &args.content_type {
        request = request.with_content_type(content_type.clone());
    }
    for pair in &args.cookies {
        let cookie = Cookie::parse_pair(pair).ok_or_else(|| {
            CliError::InvalidArgument(format!("cookie '{}' is not NAME=VALUE", pair))
        })?;
        request = request.with_cookie(cookie);
    }
    Ok(request)
}

fn print_summary(outcome: &SessionOutcome) {
    println!();
    let status = match outcome.reason {
        CancelReason::RemoteDone => style("Completed").green().bold(),
        CancelReason::UserInterrupt => style("Interrupted").yellow().bold(),
        CancelReason::TransportError => style("Failed").red().bold(),
    };
    println!("{}: {} ({})", status, outcome.job.file_name(), outcome.reason);
    println!(
        "  Received: {} of {} in {} chunk(s)",
        format_size(outcome.downloaded_bytes()),
        format_size(outcome.job.size),
        outcome.chunks.len()
    );

    match &outcome.stop_request {
        Some(StopOutcome::Sent(id)) => println!("  Server asked to stop job {}", id),
        Some(StopOutcome::Failed { job_id, reason }) => {
            println!("  Could not stop job {} on the server: {}", job_id, reason);
            println!("  Run `rapid stop {}` to retry", job_id);
        }
        Some(StopOutcome::NoActiveJob) | Some(StopOutcome::AlreadyNotified) | None => {}
    }
    if outcome.close_failures > 0 {
        println!("  {} background task(s) did not close cleanly", outcome.close_failures);
    }
}
