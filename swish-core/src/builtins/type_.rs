use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::cmdcache::{self, CommandKind};
use crate::commands::ExecutionContext;
use crate::error;
use crate::pathsearch;

/// Reports how each name would be resolved as a command.
#[derive(Parser)]
pub(crate) struct TypeCommand {
    /// The names to describe.
    names: Vec<String>,
}

impl Command for TypeCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let mut status = ExitCode::Success;

        for name in &self.names {
            match cmdcache::find_command(context.shell, name) {
                Ok(CommandKind::Builtin(_)) => {
                    let _ = writeln!(context.stdout(), "{name} is a shell builtin");
                }
                Ok(CommandKind::Function(_)) => {
                    let _ = writeln!(context.stdout(), "{name} is a shell function");
                }
                Ok(CommandKind::External { path_index }) => {
                    let path = context.shell.pathval();
                    let location = if name.contains('/') {
                        name.clone()
                    } else {
                        pathsearch::split_path(&path)
                            .get(path_index)
                            .map_or_else(|| name.clone(), |entry| entry.candidate(name))
                    };
                    let _ = writeln!(context.stdout(), "{name} is {location}");
                }
                Err(e) => {
                    let _ = writeln!(context.stderr(), "type: {e}");
                    status = ExitCode::Custom(1);
                }
            }
        }

        Ok(status)
    }
}
