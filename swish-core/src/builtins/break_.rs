use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Breaks out of a control-flow loop.
#[derive(Parser)]
pub(crate) struct BreakCommand {
    /// Number of nested loops to break out of.
    #[clap(default_value = "1")]
    which_loop: u32,
}

impl Command for BreakCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.which_loop == 0 {
            return Ok(ExitCode::InvalidUsage);
        }

        // Requests past the current nesting clamp to it; outside any loop
        // there's nothing to do.
        let depth = context.shell.loop_depth;
        if depth == 0 {
            return Ok(ExitCode::Success);
        }

        let count = self.which_loop.min(depth);
        #[allow(clippy::cast_possible_truncation)]
        Ok(ExitCode::BreakLoop((count - 1) as u8))
    }
}
