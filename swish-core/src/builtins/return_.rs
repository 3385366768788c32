use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Returns from the currently executing function.
#[derive(Parser)]
pub(crate) struct ReturnCommand {
    /// The status to return.
    code: Option<i32>,
}

impl Command for ReturnCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let status = self
            .code
            .map_or(context.shell.last_exit_status, |c| (c & 0xFF) as u8);

        if context.shell.function_depth > 0 {
            Ok(ExitCode::ReturnFromFunction(status))
        } else {
            Ok(ExitCode::Custom(status))
        }
    }
}
