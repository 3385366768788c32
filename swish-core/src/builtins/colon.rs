use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Does nothing, successfully.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct ColonCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    #[allow(dead_code)]
    args: Vec<String>,
}

impl Command for ColonCommand {
    fn execute(
        &self,
        _context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        Ok(ExitCode::Success)
    }
}
