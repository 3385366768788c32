use std::io::Write;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::cmdcache::{self, CommandKind};
use crate::commands::ExecutionContext;
use crate::error;
use crate::pathsearch;

/// Reports or manipulates the command cache.
#[derive(Parser)]
pub(crate) struct HashCommand {
    /// Forget all cached locations.
    #[clap(short = 'r')]
    reset: bool,

    /// Report each name's resolution after re-priming it.
    #[clap(short = 'v')]
    verbose: bool,

    /// Names to re-prime in the cache.
    names: Vec<String>,
}

impl Command for HashCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        if self.reset {
            context.shell.cmd_cache.clear_from(0);
        }

        if self.names.is_empty() && !self.reset {
            let mut out = context.stdout();
            let path = context.shell.pathval();
            let mut lines: Vec<String> = context
                .shell
                .cmd_cache
                .iter()
                .map(|(name, entry)| {
                    let mut line = describe_entry(name, &entry.kind, &path);
                    if entry.rehash {
                        line.push('*');
                    }
                    line
                })
                .collect();
            lines.sort();
            for line in lines {
                let _ = writeln!(out, "{line}");
            }
            return Ok(ExitCode::Success);
        }

        let mut status = ExitCode::Success;
        for name in &self.names {
            // Stale locations are dropped before re-resolving, as are
            // builtins whose position depends on a %builtin marker.
            if let Some(entry) = context.shell.cmd_cache.get(name) {
                let positioned_builtin = matches!(entry.kind, CommandKind::Builtin(_))
                    && context.shell.cmd_cache.builtin_loc().is_some();
                if matches!(entry.kind, CommandKind::External { .. }) || positioned_builtin {
                    context.shell.cmd_cache.remove(name);
                }
            }

            match cmdcache::find_command(context.shell, name) {
                Ok(kind) => {
                    if self.verbose {
                        let path = context.shell.pathval();
                        let _ =
                            writeln!(context.stdout(), "{}", describe_entry(name, &kind, &path));
                    }
                }
                Err(e) => {
                    let _ = writeln!(context.stderr(), "hash: {e}");
                    status = ExitCode::Custom(1);
                }
            }
        }

        Ok(status)
    }
}

fn describe_entry(name: &str, kind: &CommandKind, path: &str) -> String {
    match kind {
        CommandKind::Builtin(_) => format!("builtin {name}"),
        CommandKind::Function(_) => format!("function {name}"),
        CommandKind::External { path_index } => pathsearch::split_path(path)
            .get(*path_index)
            .map_or_else(|| name.to_owned(), |entry| entry.candidate(name)),
    }
}
