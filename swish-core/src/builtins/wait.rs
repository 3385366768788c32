use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Waits for background jobs to finish.
#[derive(Parser)]
pub(crate) struct WaitCommand {}

impl Command for WaitCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let status = context.shell.jobs.wait_all()?;
        if status == 0 {
            Ok(ExitCode::Success)
        } else {
            Ok(ExitCode::Custom(status))
        }
    }
}
