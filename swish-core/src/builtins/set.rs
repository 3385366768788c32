use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Sets shell options and positional parameters.
///
/// Option words (`-e`, `+x`, ...) are interpreted by hand: clap has no
/// notion of `+`-prefixed flags, and any non-option word ends option
/// processing.
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct SetCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Command for SetCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.args.is_empty() {
            let mut out = context.stdout();
            let mut lines: Vec<_> = context
                .shell
                .env
                .iter()
                .map(|(name, var)| format!("{name}={}", var.value()))
                .collect();
            lines.sort();
            for line in lines {
                let _ = writeln!(out, "{line}");
            }
            return Ok(ExitCode::Success);
        }

        let mut positional: Option<Vec<String>> = None;

        let mut iter = self.args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--" => {
                    positional = Some(iter.by_ref().cloned().collect());
                    break;
                }
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    for letter in arg.chars().skip(1) {
                        if !context.shell.options.set_by_letter(letter, true) {
                            let _ =
                                writeln!(context.stderr(), "set: unknown option -{letter}");
                            return Ok(ExitCode::InvalidUsage);
                        }
                    }
                }
                _ if arg.starts_with('+') && arg.len() > 1 => {
                    for letter in arg.chars().skip(1) {
                        if !context.shell.options.set_by_letter(letter, false) {
                            let _ =
                                writeln!(context.stderr(), "set: unknown option +{letter}");
                            return Ok(ExitCode::InvalidUsage);
                        }
                    }
                }
                _ => {
                    // First non-option word: it and the rest become the
                    // positional parameters.
                    let mut rest = vec![arg.clone()];
                    rest.extend(iter.by_ref().cloned());
                    positional = Some(rest);
                    break;
                }
            }
        }

        if let Some(positional) = positional {
            context.shell.positional_parameters = positional;
        }

        Ok(ExitCode::Success)
    }
}
