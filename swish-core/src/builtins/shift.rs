use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Shifts the positional parameters left.
#[derive(Parser)]
pub(crate) struct ShiftCommand {
    /// How many positions to shift.
    #[clap(default_value = "1")]
    count: usize,
}

impl Command for ShiftCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.count > context.shell.positional_parameters.len() {
            let _ = writeln!(context.stderr(), "shift: can't shift that many");
            return Ok(ExitCode::InvalidUsage);
        }

        context.shell.positional_parameters.drain(..self.count);
        Ok(ExitCode::Success)
    }
}
