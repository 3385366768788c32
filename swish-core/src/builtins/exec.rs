use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::{self, ExecutionContext};
use crate::error;

/// Replaces the shell with the given command, or makes its redirections
/// permanent when invoked without one.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct ExecCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Command for ExecCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.args.is_empty() {
            // The dispatcher applied our redirections without saving them;
            // nothing more to do.
            return Ok(ExitCode::Success);
        }

        // The shell gives up its identity from here on.
        context.shell.options.interactive = false;

        Err(commands::exec_external(
            context.shell,
            &self.args,
            &[],
            &[],
            0,
        ))
    }
}
