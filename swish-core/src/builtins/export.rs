use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;
use crate::variables;

/// Marks variables for export to child process environments.
#[derive(Parser)]
pub(crate) struct ExportCommand {
    /// Names or `name=value` assignments to export.
    #[clap(trailing_var_arg = true)]
    names: Vec<String>,
}

impl Command for ExportCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.names.is_empty() {
            let mut out = context.stdout();
            let mut exported: Vec<_> = context
                .shell
                .env
                .iter()
                .filter(|(_, var)| var.is_exported())
                .map(|(name, var)| format!("export {name}={}", var.value()))
                .collect();
            exported.sort();
            for line in exported {
                let _ = writeln!(out, "{line}");
            }
            return Ok(ExitCode::Success);
        }

        for name in &self.names {
            match variables::split_assignment(name) {
                (name, Some(value)) => context.shell.assign_variable(name, value, true),
                (name, None) => context.shell.env.export(name),
            }
        }

        Ok(ExitCode::Success)
    }
}
