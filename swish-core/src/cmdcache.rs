//! Command resolution and the command cache.
//!
//! The first lookup of a name walks `PATH` and records where the command was
//! found; later lookups are served from the cache. Entries are marked for
//! revalidation (`rehash`) when the working directory changes, and dropped
//! outright when `PATH` changes at or before the position they were found
//! at. Function definitions live in the same table, as owned
//! reference-counted clones so redefinition or unsetting is safe while an
//! invocation is still running.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use swish_parser::ast;

use crate::error;
use crate::pathsearch;
use crate::shell::Shell;
use crate::sys::fs::PathExt;

/// What a command name resolves to.
#[derive(Clone)]
pub enum CommandKind {
    /// A builtin, by index into the shell's builtin table.
    Builtin(usize),
    /// A shell function.
    Function(Arc<ast::FunctionDefinition>),
    /// An external command found at the given `PATH` position.
    External {
        /// 0-based index of the `PATH` element the command was found in.
        path_index: usize,
    },
}

/// One cache entry.
pub struct CommandEntry {
    /// The resolution recorded for the name.
    pub kind: CommandKind,
    /// Whether the entry must be revalidated against the filesystem before
    /// use.
    pub rehash: bool,
}

/// The command cache.
#[derive(Default)]
pub struct CommandCache {
    entries: HashMap<String, CommandEntry>,
    builtin_loc: Option<usize>,
}

impl CommandCache {
    /// Returns a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.get(name)
    }

    /// Returns the position of `%builtin` within the current `PATH`, if
    /// present.
    pub fn builtin_loc(&self) -> Option<usize> {
        self.builtin_loc
    }

    /// Iterates over the cache entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CommandEntry)> {
        self.entries.iter()
    }

    /// Installs (or replaces) an entry with the rehash bit clear.
    pub fn install(&mut self, name: &str, kind: CommandKind) {
        self.entries.insert(
            name.to_owned(),
            CommandEntry {
                kind,
                rehash: false,
            },
        );
    }

    /// Installs a function definition.
    pub fn install_function(&mut self, name: &str, body: Arc<ast::FunctionDefinition>) {
        self.install(name, CommandKind::Function(body));
    }

    /// Removes a function entry. Returns whether one was removed. The body
    /// itself is freed once the last executing invocation drops its
    /// reference.
    pub fn unset_function(&mut self, name: &str) -> bool {
        if matches!(
            self.entries.get(name),
            Some(CommandEntry {
                kind: CommandKind::Function(_),
                ..
            })
        ) {
            self.entries.remove(name);
            true
        } else {
            false
        }
    }

    /// Removes every function entry (interpreter re-entry).
    pub fn delete_functions(&mut self) {
        self.entries
            .retain(|_, e| !matches!(e.kind, CommandKind::Function(_)));
    }

    /// Removes an entry of any kind.
    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Marks entries for revalidation after a working-directory change.
    /// Externals always revalidate; builtins only when their position is
    /// determined by a `%builtin` path element.
    pub fn mark_all_rehash(&mut self) {
        let builtin_positioned = self.builtin_loc.is_some();
        for entry in self.entries.values_mut() {
            match entry.kind {
                CommandKind::External { .. } => entry.rehash = true,
                CommandKind::Builtin(_) if builtin_positioned => entry.rehash = true,
                _ => (),
            }
        }
    }

    /// Reacts to a `PATH` change: deletes every external found at or after
    /// the first differing element, and every builtin entry when the
    /// `%builtin` marker moved or disappeared.
    pub fn on_path_change(&mut self, old: &str, new: &str) {
        let mut first_change = pathsearch::first_change_index(old, new);
        let new_builtin_loc = pathsearch::builtin_marker_position(new);

        if self.builtin_loc.is_none() && new_builtin_loc.is_some() {
            self.builtin_loc = new_builtin_loc;
        }
        if self.builtin_loc.is_some() && new_builtin_loc.is_none() {
            first_change = 0;
        }

        self.clear_from(first_change);
        self.builtin_loc = new_builtin_loc;
    }

    /// Deletes externals found at positions `>= first_change`, and builtins
    /// when the builtin marker position is `>= first_change`. Functions are
    /// untouched.
    pub fn clear_from(&mut self, first_change: usize) {
        let builtin_loc = self.builtin_loc;
        self.entries.retain(|_, e| match e.kind {
            CommandKind::External { path_index } => path_index < first_change,
            CommandKind::Builtin(_) => !builtin_loc.is_some_and(|loc| loc >= first_change),
            CommandKind::Function(_) => true,
        });
    }
}

/// Resolves a command name for execution.
///
/// Names containing `/` bypass the cache entirely. Bare names consult the
/// cache, then the builtin table (unless `%builtin` defers it), then walk
/// `PATH`. Not-found and found-but-not-executable are reported as errors for
/// the caller to convert to statuses 127 and 126.
pub(crate) fn find_command(shell: &mut Shell, name: &str) -> Result<CommandKind, error::Error> {
    if name.contains('/') {
        return Ok(CommandKind::External { path_index: 0 });
    }

    if let Some(entry) = shell.cmd_cache.get(name) {
        if !entry.rehash {
            return Ok(entry.kind.clone());
        }
    }

    if shell.cmd_cache.builtin_loc().is_none() {
        if let Some(i) = shell.find_builtin(name) {
            shell.cmd_cache.install(name, CommandKind::Builtin(i));
            return Ok(CommandKind::Builtin(i));
        }
    }

    // Position of a stale prior entry, used to skip redundant stats on
    // absolute path elements while rehashing.
    let prev = shell.cmd_cache.get(name).map(|e| match &e.kind {
        CommandKind::Builtin(_) => shell.cmd_cache.builtin_loc().unwrap_or(usize::MAX),
        CommandKind::External { path_index } => *path_index,
        CommandKind::Function(_) => usize::MAX,
    });

    let path = shell.pathval();
    let mut not_executable = false;

    for entry in pathsearch::split_path(&path) {
        if entry.is_builtin_marker() {
            if let Some(i) = shell.find_builtin(name) {
                shell.cmd_cache.install(name, CommandKind::Builtin(i));
                return Ok(CommandKind::Builtin(i));
            }
            continue;
        }

        let candidate = entry.candidate(name);

        if entry.is_func_marker() {
            let candidate_path = Path::new(&candidate);
            if !candidate_path.is_regular_file() {
                continue;
            }
            shell.read_command_file(candidate_path)?;
            match shell.cmd_cache.get(name) {
                Some(CommandEntry {
                    kind: kind @ CommandKind::Function(_),
                    ..
                }) => {
                    return Ok(kind.clone());
                }
                _ => {
                    return Err(error::Error::FunctionNotDefinedInFile(
                        name.to_owned(),
                        candidate_path.to_path_buf(),
                    ));
                }
            }
        }

        // An absolute path element can't be affected by cd; reuse the stale
        // entry when we reach its recorded position without a hit.
        if let Some(prev) = prev {
            if candidate.starts_with('/') && entry.index <= prev {
                if entry.index < prev {
                    continue;
                }
                let kind = shell
                    .cmd_cache
                    .get(name)
                    .map(|e| e.kind.clone())
                    .unwrap_or(CommandKind::External {
                        path_index: entry.index,
                    });
                shell.cmd_cache.install(name, kind.clone());
                return Ok(kind);
            }
        }

        let candidate_path = Path::new(&candidate);
        if !candidate_path.is_regular_file() {
            continue;
        }
        if !candidate_path.executable() {
            not_executable = true;
            continue;
        }

        tracing::trace!(target: "lookup", "{name} found at {candidate} (path index {})", entry.index);
        shell.cmd_cache.install(
            name,
            CommandKind::External {
                path_index: entry.index,
            },
        );
        return Ok(CommandKind::External {
            path_index: entry.index,
        });
    }

    if prev.is_some() {
        shell.cmd_cache.remove(name);
    }

    if not_executable {
        Err(error::Error::CommandNotExecutable(name.to_owned()))
    } else {
        Err(error::Error::CommandNotFound(name.to_owned()))
    }
}

/// Warms the cache for the first word of a command about to run in a forked
/// pipeline stage, so the fork inherits a primed table.
pub(crate) fn prehash(shell: &mut Shell, cmd: &ast::Command) {
    if let ast::Command::Simple(simple) = cmd {
        if let Some(word) = simple.words.first() {
            let name = &word.value;
            if !name.is_empty()
                && !name.contains('/')
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "_-.".contains(c))
            {
                let _ = find_command(shell, name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{CreateOptions, Shell};
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;

    fn make_executable(path: &Path) {
        std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn shell_with_path(path: &str) -> Shell {
        let mut shell = Shell::new(CreateOptions::default()).unwrap();
        shell.assign_variable("PATH", path, false);
        shell
    }

    fn external_index(kind: &CommandKind) -> usize {
        match kind {
            CommandKind::External { path_index } => *path_index,
            _ => panic!("expected an external command"),
        }
    }

    #[test]
    fn resolution_is_deterministic_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(&dir.path().join("foo"));

        let mut shell = shell_with_path(dir.path().to_str().unwrap());

        let first = find_command(&mut shell, "foo").unwrap();
        let second = find_command(&mut shell, "foo").unwrap();
        assert_eq!(external_index(&first), 0);
        assert_eq!(external_index(&second), 0);
        assert!(!shell.cmd_cache.get("foo").unwrap().rehash);
    }

    #[test]
    fn slash_names_bypass_the_cache() {
        let mut shell = shell_with_path("/nonexistent");
        let kind = find_command(&mut shell, "/bin/ls").unwrap();
        assert_eq!(external_index(&kind), 0);
        assert!(shell.cmd_cache.get("/bin/ls").is_none());
    }

    #[test]
    fn builtins_win_over_path_without_marker() {
        let mut shell = shell_with_path("/bin:/usr/bin");
        let kind = find_command(&mut shell, "cd").unwrap();
        assert!(matches!(kind, CommandKind::Builtin(_)));
    }

    #[test]
    fn cd_marks_entries_for_rehash() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(&dir.path().join("foo"));

        let mut shell = shell_with_path(dir.path().to_str().unwrap());
        find_command(&mut shell, "foo").unwrap();
        assert!(!shell.cmd_cache.get("foo").unwrap().rehash);

        shell.cmd_cache.mark_all_rehash();
        assert!(shell.cmd_cache.get("foo").unwrap().rehash);

        // Resolution after rehash consults the filesystem again and clears
        // the bit.
        find_command(&mut shell, "foo").unwrap();
        assert!(!shell.cmd_cache.get("foo").unwrap().rehash);
    }

    #[test]
    fn path_change_drops_entries_at_or_after_divergence() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        make_executable(&dir_a.path().join("foo"));
        make_executable(&dir_b.path().join("foo"));

        let a = dir_a.path().to_str().unwrap().to_owned();
        let b = dir_b.path().to_str().unwrap().to_owned();

        let mut shell = shell_with_path(&format!("{a}:{b}"));
        let kind = find_command(&mut shell, "foo").unwrap();
        assert_eq!(external_index(&kind), 0);

        // A change only in the second element keeps the entry.
        shell.assign_variable("PATH", &format!("{a}:/elsewhere"), false);
        assert!(shell.cmd_cache.get("foo").is_some());

        // A change in the first element drops it.
        shell.assign_variable("PATH", &format!("{b}:{a}"), false);
        assert!(shell.cmd_cache.get("foo").is_none());

        let kind = find_command(&mut shell, "foo").unwrap();
        assert_eq!(external_index(&kind), 0);
    }

    #[test]
    fn stale_entry_resolves_to_later_element_after_removal() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        make_executable(&dir_a.path().join("foo"));
        make_executable(&dir_b.path().join("foo"));

        let a = dir_a.path().to_str().unwrap().to_owned();
        let b = dir_b.path().to_str().unwrap().to_owned();

        let mut shell = shell_with_path(&format!("{a}:{b}"));
        assert_eq!(external_index(&find_command(&mut shell, "foo").unwrap()), 0);

        // Remove the first copy; a cleared cache must find the second.
        std::fs::remove_file(dir_a.path().join("foo")).unwrap();
        shell.cmd_cache.clear_from(0);
        assert_eq!(external_index(&find_command(&mut shell, "foo").unwrap()), 1);
    }

    #[test]
    fn unset_function_removes_entry() {
        let mut shell = shell_with_path("/bin");
        let def = Arc::new(ast::FunctionDefinition {
            fname: "f".to_owned(),
            body: Box::new(ast::Command::Simple(ast::SimpleCommand::default())),
        });
        shell.cmd_cache.install_function("f", def.clone());
        assert!(matches!(
            find_command(&mut shell, "f").unwrap(),
            CommandKind::Function(_)
        ));

        assert!(shell.cmd_cache.unset_function("f"));
        assert!(shell.cmd_cache.get("f").is_none());
        assert!(!shell.cmd_cache.unset_function("f"));

        // The definition remains alive only through our handle.
        assert_eq!(Arc::strong_count(&def), 1);
    }

    #[test]
    fn not_found_and_not_executable_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("noexec"), "").unwrap();
        std::fs::set_permissions(
            dir.path().join("noexec"),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        let mut shell = shell_with_path(dir.path().to_str().unwrap());
        assert!(matches!(
            find_command(&mut shell, "absent"),
            Err(error::Error::CommandNotFound(_))
        ));
        assert!(matches!(
            find_command(&mut shell, "noexec"),
            Err(error::Error::CommandNotExecutable(_))
        ));
    }

    #[test]
    fn path_change_with_builtin_marker_repositions_builtins() {
        let mut shell = shell_with_path("/bin");
        find_command(&mut shell, "cd").unwrap();
        assert!(matches!(
            shell.cmd_cache.get("cd").unwrap().kind,
            CommandKind::Builtin(_)
        ));

        // Introducing a %builtin marker re-evaluates builtin positions.
        shell.assign_variable("PATH", "/bin:/usr/bin%builtin", false);
        assert_eq!(shell.cmd_cache.builtin_loc(), Some(1));

        // Removing it again clears all non-function entries.
        shell.assign_variable("PATH", "/bin", false);
        assert_eq!(shell.cmd_cache.builtin_loc(), None);
        assert!(shell.cmd_cache.get("cd").is_none());
    }
}
