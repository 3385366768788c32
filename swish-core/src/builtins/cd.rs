use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Changes the current working directory.
#[derive(Parser)]
pub(crate) struct CdCommand {
    /// The target directory; `$HOME` when omitted, the previous directory
    /// for `-`.
    target: Option<String>,
}

impl Command for CdCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let mut print_target = false;
        let target = match self.target.as_deref() {
            Some("-") => {
                print_target = true;
                match context.shell.env.get_str("OLDPWD") {
                    Some(oldpwd) => oldpwd.to_owned(),
                    None => {
                        let _ = writeln!(context.stderr(), "cd: OLDPWD not set");
                        return Ok(ExitCode::Custom(1));
                    }
                }
            }
            Some(dir) => dir.to_owned(),
            None => match context.shell.env.get_str("HOME") {
                Some(home) => home.to_owned(),
                None => {
                    let _ = writeln!(context.stderr(), "cd: HOME not set");
                    return Ok(ExitCode::Custom(1));
                }
            },
        };

        if let Err(e) = std::env::set_current_dir(&target) {
            let _ = writeln!(context.stderr(), "cd: {target}: {e}");
            return Ok(ExitCode::Custom(1));
        }

        let new_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from(&target));
        let old_dir = context.shell.working_dir.clone();

        context
            .shell
            .env
            .set("OLDPWD", old_dir.to_string_lossy(), false);
        context
            .shell
            .env
            .set("PWD", new_dir.to_string_lossy(), true);
        context.shell.working_dir = new_dir;

        // Cached command locations may now resolve differently.
        context.shell.cmd_cache.mark_all_rehash();

        if print_target {
            let _ = writeln!(context.stdout(), "{target}");
        }

        Ok(ExitCode::Success)
    }
}
