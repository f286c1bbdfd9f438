//! Stop command - abort a job left running on the server.

use rapid::client::ServerClient;

use crate::error::CliError;
use crate::runner::{CliRunner, Overrides};

/// Run the stop command.
pub fn run(overrides: &Overrides, job_id: &str) -> Result<i32, CliError> {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return Err(CliError::InvalidArgument("job id must not be empty".to_string()));
    }

    let runner = CliRunner::new(overrides)?;
    runner.log_startup("stop");

    let client = ServerClient::new(runner.config().clone())?;
    runner.block_on(client.stop(job_id))?;

    println!("Stop requested for job {}", job_id);
    Ok(0)
}
