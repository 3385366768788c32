//! Command dispatch: resolving a simple command and running it as a
//! builtin, a function, or an external program, with the fork decisions
//! that distinguish those cases.

use std::cell::RefCell;
use std::ffi::CString;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use itertools::Itertools;
use swish_parser::ast;

use crate::builtins::{DispatchClass, ExitCode};
use crate::cmdcache::{self, CommandKind};
use crate::error;
use crate::interp::{self, child_exit, ExecutionParameters, ExecutionResult};
use crate::jobs::Job;
use crate::pathsearch;
use crate::redir::{ExpandedRedirect, RedirMode};
use crate::shell::Shell;
use crate::sys;

/// Output of a command run in a command-substitution context: either an
/// in-memory buffer (builtins) or a pipe and the job writing to it.
#[derive(Default)]
pub(crate) struct BackCmd {
    pub buffer: Vec<u8>,
    pub fd: Option<OwnedFd>,
    pub job: Option<Job>,
}

/// The context a builtin runs in.
pub struct ExecutionContext<'a, 'b> {
    /// The shell executing the builtin.
    pub shell: &'a mut Shell,
    /// The execution flags in effect.
    pub params: &'b ExecutionParameters,
}

impl ExecutionContext<'_, '_> {
    /// Returns a writer for the builtin's standard output; honors both
    /// pushed redirections and command-substitution capture.
    pub fn stdout(&self) -> Box<dyn Write> {
        if let Some(capture) = &self.params.capture {
            return Box::new(CaptureWriter(capture.clone()));
        }
        match sys::process::dup_fd(1) {
            Ok(fd) => Box::new(std::fs::File::from(fd)),
            Err(_) => Box::new(std::io::sink()),
        }
    }

    /// Returns a writer for the builtin's standard error.
    pub fn stderr(&self) -> Box<dyn Write> {
        match sys::process::dup_fd(2) {
            Ok(fd) => Box::new(std::fs::File::from(fd)),
            Err(_) => Box::new(std::io::sink()),
        }
    }
}

struct CaptureWriter(Rc<RefCell<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Evaluates a simple command: expands its words and redirections, resolves
/// the name, and launches per kind. `back` is present when the command is
/// the body of a command substitution.
pub(crate) fn eval_command(
    shell: &mut Shell,
    cmd: &ast::SimpleCommand,
    params: &ExecutionParameters,
    mut back: Option<&mut BackCmd>,
) -> Result<ExecutionResult, error::Error> {
    shell.last_command_subst_status = None;

    let (assignments, mut args) = interp::expand_command_words(shell, params, &cmd.words)?;
    let redirects = interp::expand_redirects(shell, params, &cmd.redirects)?;

    if shell.options.print_commands_and_arguments {
        let rendered = assignments
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .chain(args.iter().cloned())
            .join(" ");
        eprintln!("+ {rendered}");
    }

    if args.is_empty() {
        // Assignments apply to the shell itself; redirections still run for
        // their side effects.
        for (name, value) in &assignments {
            shell.assign_variable(name, value, false);
        }
        if !redirects.is_empty() {
            shell.redirs.apply(&redirects, RedirMode::Push)?;
            shell.redirs.pop();
        }
        let status = shell.last_command_subst_status.take().unwrap_or(0);
        return Ok(ExecutionResult::new(status));
    }

    // Resolve, following `builtin` prefixes to force builtin lookup.
    let mut lookup = cmdcache::find_command(shell, &args[0]);
    loop {
        let Ok(CommandKind::Builtin(index)) = &lookup else {
            break;
        };
        if !matches!(shell.builtins[*index].dispatch, DispatchClass::BuiltinCmd) {
            break;
        }
        if args.len() == 1 {
            break;
        }

        args.remove(0);
        match shell.find_builtin(&args[0]) {
            Some(index) => lookup = Ok(CommandKind::Builtin(index)),
            None => {
                let message = format!("{}: not a shell builtin", args[0]);
                let _ = writeln!(std::io::stderr(), "swish: {message}");
                return Ok(ExecutionResult::new(2));
            }
        }
    }

    let kind = match lookup {
        Ok(kind) => kind,
        Err(e) if e.is_recoverable() => {
            shell.report_error(&e);
            return Ok(ExecutionResult::new(e.exit_code()));
        }
        Err(e) => return Err(e),
    };

    let last_arg = args.last().cloned();

    // Decide whether this command needs its own process: externals that are
    // not already running in a doomed child, and command-substitution
    // bodies other than plain builtins.
    let builtin_runs_captured = matches!(&kind, CommandKind::Builtin(index)
        if !matches!(shell.builtins[*index].dispatch, DispatchClass::Dot | DispatchClass::Eval));
    let fork_for_capture = back.is_some() && !builtin_runs_captured;
    let fork_normal =
        matches!(kind, CommandKind::External { .. }) && !params.exit_after && back.is_none();

    let result = if fork_for_capture || fork_normal {
        let mut job = shell.jobs.create_job(args.iter().join(" "));
        let pipe_pair = if fork_for_capture {
            Some(sys::process::pipe()?)
        } else {
            None
        };

        match sys::process::fork()? {
            sys::process::ForkResult::Child => {
                shell.on_fork_child();
                if let Some((read_end, write_end)) = pipe_pair {
                    drop(read_end);
                    let _ = sys::process::dup2(write_end.as_raw_fd(), 1);
                    drop(write_end);
                }
                let child_params = ExecutionParameters {
                    exit_after: true,
                    tested: params.tested,
                    capture: None,
                };
                let outcome = execute_resolved(
                    shell,
                    kind,
                    args,
                    &assignments,
                    &redirects,
                    &child_params,
                    None,
                );
                child_exit(shell, outcome)
            }
            sys::process::ForkResult::Parent { child } => {
                job.add_pid(child);
                if let Some((read_end, write_end)) = pipe_pair {
                    drop(write_end);
                    if let Some(back) = back.as_mut() {
                        back.fd = Some(read_end);
                        back.job = Some(job);
                    }
                    ExecutionResult::success()
                } else {
                    let status = job.wait()?;
                    ExecutionResult::new(status)
                }
            }
        }
    } else {
        execute_resolved(
            shell,
            kind,
            args,
            &assignments,
            &redirects,
            params,
            back.as_deref_mut(),
        )?
    };

    // Track the last argument of interactive top-level commands in `$_`.
    if shell.options.interactive && shell.function_depth == 0 {
        if let Some(last_arg) = last_arg {
            shell.env.set("_", last_arg, false);
        }
    }

    Ok(result)
}

fn execute_resolved(
    shell: &mut Shell,
    kind: CommandKind,
    args: Vec<String>,
    assignments: &[(String, String)],
    redirects: &[ExpandedRedirect],
    params: &ExecutionParameters,
    back: Option<&mut BackCmd>,
) -> Result<ExecutionResult, error::Error> {
    match kind {
        CommandKind::Function(def) => {
            invoke_function(shell, &def, &args, assignments, redirects, params)
        }
        CommandKind::Builtin(index) => {
            execute_builtin(shell, index, args, assignments, redirects, params, back)
        }
        CommandKind::External { path_index } => {
            Err(exec_external(shell, &args, assignments, redirects, path_index))
        }
    }
}

/// Invokes a shell function: redirections pushed, positional parameters and
/// a local-variable scope installed, and the `return` marker consumed on
/// the way out. Every installation is undone on all exit paths.
pub(crate) fn invoke_function(
    shell: &mut Shell,
    def: &Arc<ast::FunctionDefinition>,
    args: &[String],
    assignments: &[(String, String)],
    redirects: &[ExpandedRedirect],
    _params: &ExecutionParameters,
) -> Result<ExecutionResult, error::Error> {
    use crate::interp::Execute;

    shell.redirs.apply(redirects, RedirMode::Push)?;

    let saved_params = std::mem::replace(
        &mut shell.positional_parameters,
        args.iter().skip(1).cloned().collect(),
    );
    let saved_command_name = shell.command_name.clone();
    shell.command_name = args.first().cloned();

    shell.env.push_locals();
    for (name, value) in assignments {
        // The frame was just pushed, so locals cannot fail here.
        let _ = shell.env.make_local(&format!("{name}={value}"));
    }

    shell.function_depth += 1;
    let outcome = def.body.execute(shell, &ExecutionParameters::default());
    shell.function_depth -= 1;

    shell.env.pop_locals();
    shell.positional_parameters = saved_params;
    shell.command_name = saved_command_name;
    shell.redirs.pop();

    let mut result = outcome?;
    if result.return_from_function {
        result.return_from_function = false;
    }

    Ok(result)
}

fn execute_builtin(
    shell: &mut Shell,
    index: usize,
    args: Vec<String>,
    assignments: &[(String, String)],
    redirects: &[ExpandedRedirect],
    params: &ExecutionParameters,
    back: Option<&mut BackCmd>,
) -> Result<ExecutionResult, error::Error> {
    let registration = shell.builtins[index];

    // Prefix assignments for builtins persist in the shell.
    for (name, value) in assignments {
        shell.assign_variable(name, value, false);
    }

    // `exec` applies its redirections permanently.
    let push_mode = if matches!(registration.dispatch, DispatchClass::Exec) {
        RedirMode::NoSave
    } else {
        RedirMode::Push
    };
    shell.redirs.apply(redirects, push_mode)?;

    let saved_command_name = shell.command_name.clone();
    shell.command_name = args.first().cloned();

    let capture = back
        .as_ref()
        .map(|_| Rc::new(RefCell::new(Vec::new())));
    let builtin_params = ExecutionParameters {
        exit_after: params.exit_after,
        tested: params.tested,
        capture: capture.clone(),
    };

    let outcome = {
        let mut context = ExecutionContext {
            shell: &mut *shell,
            params: &builtin_params,
        };
        (registration.execute)(&mut context, args)
    };

    if let (Some(back), Some(capture)) = (back, capture) {
        back.buffer = std::mem::take(&mut *capture.borrow_mut());
    }

    if !matches!(registration.dispatch, DispatchClass::Exec) {
        shell.redirs.pop();
    }

    let result = match outcome {
        Ok(code) => Ok(exit_code_to_result(code)),
        Err(e) => {
            // Errors inside `builtin`, `.`, `eval`, and `exec` keep
            // unwinding; other builtins convert them to a failure status.
            let protected = matches!(
                registration.dispatch,
                DispatchClass::BuiltinCmd
                    | DispatchClass::Dot
                    | DispatchClass::Eval
                    | DispatchClass::Exec
            );
            if !e.is_recoverable() || protected {
                Err(e)
            } else {
                shell.report_error(&e);
                Ok(ExecutionResult::new(e.exit_code()))
            }
        }
    };

    shell.command_name = saved_command_name;
    result
}

pub(crate) fn exit_code_to_result(code: ExitCode) -> ExecutionResult {
    match code {
        ExitCode::Success => ExecutionResult::success(),
        ExitCode::InvalidUsage => ExecutionResult::new(2),
        ExitCode::Custom(status) => ExecutionResult::new(status),
        ExitCode::ExitShell(status) => ExecutionResult {
            exit_code: status,
            exit_shell: true,
            ..ExecutionResult::default()
        },
        ExitCode::ReturnFromFunction(status) => ExecutionResult {
            exit_code: status,
            return_from_function: true,
            ..ExecutionResult::default()
        },
        ExitCode::BreakLoop(count) => ExecutionResult {
            break_loop: Some(count),
            ..ExecutionResult::default()
        },
        ExitCode::ContinueLoop(count) => ExecutionResult {
            continue_loop: Some(count),
            ..ExecutionResult::default()
        },
    }
}

/// Replaces the current process with an external command. The process has
/// taken on the command's identity at this point: saved descriptors are
/// forgotten and redirections applied destructively. On success this never
/// returns; every return value is the error to report.
pub(crate) fn exec_external(
    shell: &mut Shell,
    args: &[String],
    assignments: &[(String, String)],
    redirects: &[ExpandedRedirect],
    path_index: usize,
) -> error::Error {
    shell.redirs.forget_all();
    if let Err(e) = shell.redirs.apply(redirects, RedirMode::NoSave) {
        return e;
    }

    for (name, value) in assignments {
        shell.env.set(name, value, true);
    }

    let envp = shell.env.environment();
    let path = shell.pathval();
    shell_exec(shell, args, &path, path_index, &envp)
}

/// Searches for and execs the command, starting at the recorded `PATH`
/// position. Returns the most interesting error seen.
pub(crate) fn shell_exec(
    shell: &mut Shell,
    args: &[String],
    path: &str,
    path_index: usize,
    envp: &[CString],
) -> error::Error {
    let Ok(argv) = args
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<Vec<_>, _>>()
    else {
        return error::Error::CommandNotFound(args.first().cloned().unwrap_or_default());
    };

    let name = &args[0];

    tracing::debug!(target: "commands", "execing: {}", args.join(" "));

    if name.contains('/') {
        return classify_exec_error(name, try_exec(shell, name, args, &argv, envp));
    }

    let mut last_interesting: Option<nix::errno::Errno> = None;
    for entry in pathsearch::split_path(path) {
        if entry.option.is_some() || entry.index < path_index {
            continue;
        }
        let candidate = entry.candidate(name);
        match try_exec(shell, &candidate, args, &argv, envp) {
            TryExecOutcome::Errno(errno) => {
                if errno != nix::errno::Errno::ENOENT && errno != nix::errno::Errno::ENOTDIR {
                    last_interesting = Some(errno);
                }
            }
            other @ TryExecOutcome::Error(_) => {
                return classify_exec_error(name, other);
            }
        }
    }

    match last_interesting {
        Some(nix::errno::Errno::EACCES) => error::Error::CommandNotExecutable(name.clone()),
        Some(errno) => errno.into(),
        None => error::Error::CommandNotFound(name.clone()),
    }
}

enum TryExecOutcome {
    Errno(nix::errno::Errno),
    Error(error::Error),
}

fn classify_exec_error(name: &str, outcome: TryExecOutcome) -> error::Error {
    match outcome {
        TryExecOutcome::Errno(nix::errno::Errno::ENOENT | nix::errno::Errno::ENOTDIR) => {
            error::Error::CommandNotFound(name.to_owned())
        }
        TryExecOutcome::Errno(nix::errno::Errno::EACCES) => {
            error::Error::CommandNotExecutable(name.to_owned())
        }
        TryExecOutcome::Errno(errno) => errno.into(),
        TryExecOutcome::Error(e) => e,
    }
}

// Execs one candidate path. An ENOEXEC result means the file exists but is
// not a binary: interpret a `#!` line by hand, or arrange for the shell to
// restart as the script's interpreter.
fn try_exec(
    shell: &mut Shell,
    candidate: &str,
    args: &[String],
    argv: &[CString],
    envp: &[CString],
) -> TryExecOutcome {
    let Ok(c_path) = CString::new(candidate) else {
        return TryExecOutcome::Errno(nix::errno::Errno::ENOENT);
    };

    let errno = sys::process::execve(&c_path, argv, envp);
    if errno != nix::errno::Errno::ENOEXEC {
        return TryExecOutcome::Errno(errno);
    }

    // Peek at the head of the file for a `#!` line.
    let head = read_file_head(candidate);
    if let Some(mut interp_words) = parse_interpreter_line(&head) {
        let interp_base = Path::new(&interp_words[0])
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        if interp_base != "sh" && interp_base != "swish" {
            // Re-exec under the named interpreter, passing the script path.
            interp_words.push(candidate.to_owned());
            interp_words.extend(args.iter().skip(1).cloned());
            let path = shell.pathval();
            return TryExecOutcome::Error(shell_exec(shell, &interp_words, &path, 0, envp));
        }
        // The interpreter is this shell; fall through and interpret
        // directly.
    }

    TryExecOutcome::Error(error::Error::RunAsScript(Box::new(error::ScriptToRun {
        path: PathBuf::from(candidate),
        arg0: args[0].clone(),
        args: args.iter().skip(1).cloned().collect(),
    })))
}

fn read_file_head(path: &str) -> Vec<u8> {
    use std::io::Read;
    let mut head = vec![0u8; 256];
    let Ok(mut file) = std::fs::File::open(path) else {
        return vec![];
    };
    let n = file.read(&mut head).unwrap_or(0);
    head.truncate(n);
    head
}

// Parses a `#!interpreter arg...` first line into its words (up to 5, as
// the historical implementations allowed).
fn parse_interpreter_line(head: &[u8]) -> Option<Vec<String>> {
    if head.len() < 2 || head[0] != b'#' || head[1] != b'!' {
        return None;
    }

    let line_end = head
        .iter()
        .position(|b| *b == b'\n')
        .unwrap_or(head.len());
    let line = String::from_utf8_lossy(&head[2..line_end]).into_owned();

    let words: Vec<String> = line
        .split_ascii_whitespace()
        .take(5)
        .map(str::to_owned)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_line_parsing() {
        assert_eq!(
            parse_interpreter_line(b"#!/bin/sh\necho hi\n"),
            Some(vec!["/bin/sh".to_owned()])
        );
        assert_eq!(
            parse_interpreter_line(b"#!/usr/bin/env python3\n"),
            Some(vec!["/usr/bin/env".to_owned(), "python3".to_owned()])
        );
        assert_eq!(parse_interpreter_line(b"echo plain\n"), None);
        assert_eq!(parse_interpreter_line(b"#!\n"), None);
    }

    #[test]
    fn exit_codes_map_to_results() {
        assert!(exit_code_to_result(ExitCode::Success).is_success());
        assert_eq!(exit_code_to_result(ExitCode::InvalidUsage).exit_code, 2);

        let exit = exit_code_to_result(ExitCode::ExitShell(3));
        assert!(exit.exit_shell);
        assert_eq!(exit.exit_code, 3);

        let ret = exit_code_to_result(ExitCode::ReturnFromFunction(7));
        assert!(ret.return_from_function);
        assert_eq!(ret.exit_code, 7);

        assert_eq!(
            exit_code_to_result(ExitCode::BreakLoop(1)).break_loop,
            Some(1)
        );
    }
}
