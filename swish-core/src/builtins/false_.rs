use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Returns failure.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct FalseCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    #[allow(dead_code)]
    args: Vec<String>,
}

impl Command for FalseCommand {
    fn execute(
        &self,
        _context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        Ok(ExitCode::Custom(1))
    }
}
