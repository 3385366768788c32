use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Writes its arguments to standard output.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct EchoCommand {
    /// Suppress the trailing newline.
    #[clap(short = 'n')]
    no_newline: bool,

    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Command for EchoCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let mut out = context.stdout();
        let text = self.args.join(" ");
        if self.no_newline {
            let _ = write!(out, "{text}");
        } else {
            let _ = writeln!(out, "{text}");
        }
        let _ = out.flush();
        Ok(ExitCode::Success)
    }
}
