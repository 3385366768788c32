use clap::Parser;

use crate::builtins::{result_to_exit_code, Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;
use crate::interp::ExecutionParameters;

/// Concatenates its arguments and evaluates them as shell input.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct EvalCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Command for EvalCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.args.is_empty() {
            return Ok(ExitCode::Success);
        }

        let text = self.args.join(" ");
        let params = ExecutionParameters {
            tested: context.params.tested,
            ..ExecutionParameters::default()
        };
        let result = context.shell.run_string(&text, &params)?;
        Ok(result_to_exit_code(&result))
    }
}
