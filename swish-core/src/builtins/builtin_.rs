use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Forces its first operand to be resolved as a builtin. The resolution is
/// handled by the command dispatcher; this body only runs when `builtin`
/// is invoked with no operand, where it does nothing and preserves the
/// last exit status.
#[derive(Parser)]
pub(crate) struct BuiltinCommand {}

impl Command for BuiltinCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        Ok(ExitCode::Custom(context.shell.last_exit_status))
    }
}
