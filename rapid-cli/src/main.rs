//! Rapid CLI - command-line front end for the download server.
//!
//! This binary asks a download server to fetch a file and renders the
//! server-side transfer as one progress bar per chunk.

mod commands;
mod error;
mod runner;
mod ui;

use clap::{Parser, Subcommand};

use commands::download::DownloadArgs;
use error::CliError;
use runner::Overrides;

#[derive(Parser)]
#[command(name = "rapid")]
#[command(about = "Fetch files through a download server and follow their progress", long_about = None)]
#[command(version)]
struct Cli {
    /// Download server base URL (overrides RAPID_SERVER and config.ini)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Client identifier used in download and stream paths
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Log debug output to the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the server to download a file and follow its progress
    #[command(visible_alias = "d")]
    Download {
        /// URL of the file to download
        url: String,

        /// Download provider to use on the server
        #[arg(long)]
        provider: Option<String>,

        /// User-Agent the server should send upstream
        #[arg(long)]
        user_agent: Option<String>,

        /// Content type hint for the server
        #[arg(long)]
        content_type: Option<String>,

        /// Cookie to send upstream, as NAME=VALUE (repeatable)
        #[arg(long = "cookie", value_name = "NAME=VALUE")]
        cookies: Vec<String>,

        /// Do not render progress bars
        #[arg(short, long)]
        quiet: bool,
    },

    /// Ask the server to abort a job
    Stop {
        /// Job identifier printed when the download started
        job_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let overrides = Overrides {
        server: cli.server,
        client_id: cli.client_id,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Download {
            url,
            provider,
            user_agent,
            content_type,
            cookies,
            quiet,
        } => commands::download::run(
            &overrides,
            DownloadArgs {
                url,
                provider,
                user_agent,
                content_type,
                cookies,
                quiet,
            },
        ),
        Commands::Stop { job_id } => commands::stop::run(&overrides, &job_id),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => exit_with_error(e),
    }
}

fn exit_with_error(error: CliError) -> ! {
    eprintln!("Error: {}", error);
    std::process::exit(error.exit_code());
}
