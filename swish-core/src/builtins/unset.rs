use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Removes variables or function definitions.
#[derive(Parser)]
pub(crate) struct UnsetCommand {
    /// Unset shell functions instead of variables.
    #[clap(short = 'f')]
    functions: bool,

    /// Unset shell variables (the default).
    #[clap(short = 'v')]
    variables: bool,

    /// The names to unset.
    names: Vec<String>,
}

impl Command for UnsetCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.functions && self.variables {
            let _ = writeln!(context.stderr(), "unset: cannot combine -f and -v");
            return Ok(ExitCode::InvalidUsage);
        }

        for name in &self.names {
            if self.functions {
                context.shell.cmd_cache.unset_function(name);
            } else {
                context.shell.env.unset(name);
            }
        }
        Ok(ExitCode::Success)
    }
}
