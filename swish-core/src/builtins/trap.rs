use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;
use crate::traps::TrapSignal;

/// Installs, removes, or lists trap handlers.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct TrapCommand {
    /// The handler command, or `-` to reset, followed by the conditions it
    /// applies to.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Command for TrapCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.args.is_empty() {
            let mut out = context.stdout();
            let mut lines: Vec<_> = context
                .shell
                .traps
                .iter_handlers()
                .map(|(signal, command)| format!("trap -- '{command}' {signal}"))
                .collect();
            lines.sort();
            for line in lines {
                let _ = writeln!(out, "{line}");
            }
            return Ok(ExitCode::Success);
        }

        let Some((action, conditions)) = self.args.split_first() else {
            return Ok(ExitCode::InvalidUsage);
        };
        if conditions.is_empty() {
            let _ = writeln!(context.stderr(), "trap: condition missing");
            return Ok(ExitCode::InvalidUsage);
        }

        for condition in conditions {
            let signal: TrapSignal = condition.parse()?;
            if action == "-" {
                context.shell.traps.remove_handler(signal)?;
            } else {
                context
                    .shell
                    .traps
                    .register_handler(signal, action.clone())?;
            }
        }

        Ok(ExitCode::Success)
    }
}
