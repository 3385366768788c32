use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Continues the next iteration of a control-flow loop.
#[derive(Parser)]
pub(crate) struct ContinueCommand {
    /// Number of nested loops to skip outward through.
    #[clap(default_value = "1")]
    which_loop: u32,
}

impl Command for ContinueCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.which_loop == 0 {
            return Ok(ExitCode::InvalidUsage);
        }

        let depth = context.shell.loop_depth;
        if depth == 0 {
            return Ok(ExitCode::Success);
        }

        let count = self.which_loop.min(depth);
        #[allow(clippy::cast_possible_truncation)]
        Ok(ExitCode::ContinueLoop((count - 1) as u8))
    }
}
