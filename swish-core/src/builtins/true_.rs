use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Returns success.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct TrueCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    #[allow(dead_code)]
    args: Vec<String>,
}

impl Command for TrueCommand {
    fn execute(
        &self,
        _context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        Ok(ExitCode::Success)
    }
}
