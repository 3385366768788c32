use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Prints the current working directory.
#[derive(Parser)]
pub(crate) struct PwdCommand {}

impl Command for PwdCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let dir = context.shell.working_dir.clone();
        let _ = writeln!(context.stdout(), "{}", dir.display());
        Ok(ExitCode::Success)
    }
}
