use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Exits the shell.
#[derive(Parser)]
pub(crate) struct ExitCommand {
    /// The status to exit with.
    code: Option<i32>,
}

impl Command for ExitCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let status = self
            .code
            .map_or(context.shell.last_exit_status, |c| (c & 0xFF) as u8);
        Ok(ExitCode::ExitShell(status))
    }
}
