use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Declares function-local variables.
#[derive(Parser)]
pub(crate) struct LocalCommand {
    /// Names or `name=value` assignments to make local.
    #[clap(trailing_var_arg = true)]
    declarations: Vec<String>,
}

impl Command for LocalCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if context.shell.function_depth == 0 {
            return Err(error::Error::LocalOutsideFunction);
        }

        for declaration in &self.declarations {
            context.shell.env.make_local(declaration)?;
        }

        Ok(ExitCode::Success)
    }
}
