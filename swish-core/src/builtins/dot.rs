use std::path::Path;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Reads and executes commands from a file in the current shell
/// environment.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct DotCommand {
    /// Path of the file to read.
    script_path: String,

    /// Positional parameters to install while the file runs.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

impl Command for DotCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let replaced_params = if self.script_args.is_empty() {
            None
        } else {
            Some(std::mem::replace(
                &mut context.shell.positional_parameters,
                self.script_args.clone(),
            ))
        };

        let outcome = context.shell.source_file(Path::new(&self.script_path));

        if let Some(saved) = replaced_params {
            context.shell.positional_parameters = saved;
        }

        let status = outcome?;
        if status == 0 {
            Ok(ExitCode::Success)
        } else {
            Ok(ExitCode::Custom(status))
        }
    }
}
