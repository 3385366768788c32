//! The tree evaluator.
//!
//! Each AST node implements [`Execute`]. Control flow out of loops and
//! functions travels as data in [`ExecutionResult`] rather than as errors:
//! loops consume `break`/`continue` counters, function frames consume the
//! return flag, and `exit` propagates as a flag the driver loops honor.
//! Recoverable shell errors and interrupts unwind through `Result`.

use std::cell::RefCell;
use std::os::fd::AsRawFd;
use std::rc::Rc;

use swish_parser::ast;

use crate::cmdcache;
use crate::commands::{self, BackCmd};
use crate::error;
use crate::expansion;
use crate::redir::{ExpandedRedirect, RedirAction, RedirMode};
use crate::shell::Shell;
use crate::sys;
use crate::variables;

/// Encapsulates the result of executing a command.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// The numerical exit code of the command.
    pub exit_code: u8,
    /// Whether the shell should exit after this command.
    pub exit_shell: bool,
    /// Whether the shell should return from the currently executing
    /// function.
    pub return_from_function: bool,
    /// Number of additional loop levels to break out of, if breaking.
    pub break_loop: Option<u8>,
    /// Number of additional loop levels to continue at, if continuing.
    pub continue_loop: Option<u8>,
}

impl ExecutionResult {
    /// Returns a new result with the given exit code.
    pub fn new(exit_code: u8) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    /// Returns a new result with an exit code of 0.
    pub fn success() -> Self {
        Self::new(0)
    }

    /// Returns whether the command was successful.
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns whether the result carries any non-local control flow.
    pub const fn has_control_flow(&self) -> bool {
        self.exit_shell
            || self.return_from_function
            || self.break_loop.is_some()
            || self.continue_loop.is_some()
    }
}

/// Flags threaded through evaluation.
#[derive(Clone, Default)]
pub struct ExecutionParameters {
    /// The process exits with the command's status once it completes (set
    /// inside forked children, enabling exec-in-place for externals).
    pub exit_after: bool,
    /// The caller examines the exit status, so `-e` must not fire.
    pub tested: bool,
    /// In-memory sink for a builtin running in a command substitution.
    pub(crate) capture: Option<Rc<RefCell<Vec<u8>>>>,
}

impl ExecutionParameters {
    /// Parameters for a subordinate node inheriting this node's flags.
    pub(crate) fn inherit(&self) -> Self {
        Self {
            exit_after: self.exit_after,
            tested: self.tested,
            capture: None,
        }
    }

    /// Parameters for a node whose status will be examined.
    pub(crate) fn tested(&self) -> Self {
        Self {
            exit_after: false,
            tested: true,
            capture: None,
        }
    }

    /// Parameters for a node evaluated with no inherited flags.
    pub(crate) fn plain() -> Self {
        Self::default()
    }
}

/// Implemented by AST nodes that can be evaluated.
pub trait Execute {
    /// Evaluates the node within the given shell.
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error>;
}

impl Execute for ast::Program {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut result = ExecutionResult::success();
        for command in &self.complete_commands {
            result = command.execute(shell, params)?;
            if result.has_control_flow() {
                break;
            }
        }
        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

impl Execute for ast::CompoundList {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut result = ExecutionResult::success();

        for (idx, ast::CompoundListItem(ao_list, sep)) in self.0.iter().enumerate() {
            let last = idx == self.0.len() - 1;

            let item_params = if last {
                params.inherit()
            } else {
                ExecutionParameters::plain()
            };

            if matches!(sep, ast::SeparatorOperator::Async) {
                spawn_background(shell, ao_list)?;
                result = ExecutionResult::success();
            } else {
                result = ao_list.execute(shell, &item_params)?;
            }

            shell.last_exit_status = result.exit_code;

            // Statement boundary: deliver pending traps, then stop on any
            // control flow or an errexit-triggering failure.
            shell.dispatch_traps()?;

            if result.has_control_flow() {
                break;
            }

            if shell.options.exit_on_nonzero_command_exit
                && !item_params.tested
                && !result.is_success()
            {
                result.exit_shell = true;
                break;
            }
        }

        Ok(result)
    }
}

impl Execute for ast::AndOrList {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let count = self.additional.len();
        let first_params = if count == 0 {
            params.inherit()
        } else {
            params.tested()
        };
        let mut result = self.first.execute(shell, &first_params)?;

        for (i, next) in self.additional.iter().enumerate() {
            if result.has_control_flow() {
                break;
            }

            let (is_and, pipeline) = match next {
                ast::AndOr::And(p) => (true, p),
                ast::AndOr::Or(p) => (false, p),
            };

            // Short-circuit without breaking the chain; a later operator may
            // still apply.
            if is_and {
                if !result.is_success() {
                    continue;
                }
            } else if result.is_success() {
                continue;
            }

            let next_params = if i == count - 1 {
                params.inherit()
            } else {
                params.tested()
            };
            result = pipeline.execute(shell, &next_params)?;
        }

        Ok(result)
    }
}

impl Execute for ast::Pipeline {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        if shell.options.do_not_execute_commands {
            return Ok(ExecutionResult::success());
        }

        let stage_params = if self.bang {
            params.tested()
        } else {
            params.inherit()
        };

        let mut result = if self.seq.len() == 1 {
            self.seq[0].execute(shell, &stage_params)?
        } else {
            execute_pipeline_stages(shell, self, false)?
        };

        if self.bang {
            result.exit_code = if result.exit_code == 0 { 1 } else { 0 };
        }

        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

impl Execute for ast::Command {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        match self {
            Self::Simple(simple) => commands::eval_command(shell, simple, params, None),
            Self::Compound(ast::CompoundCommand::Subshell(list), redirects) => {
                execute_subshell(shell, list, redirects.as_ref(), params)
            }
            Self::Compound(compound, redirects) => {
                let expanded = match redirects {
                    Some(redirects) => expand_redirects(shell, params, &redirects.0)?,
                    None => vec![],
                };

                let pushed = !expanded.is_empty();
                if pushed {
                    shell.redirs.apply(&expanded, RedirMode::Push)?;
                }

                let result = compound.execute(shell, params);

                if pushed {
                    shell.redirs.pop();
                }

                result
            }
            Self::Function(def) => {
                shell
                    .cmd_cache
                    .install_function(&def.fname, std::sync::Arc::new(def.clone()));
                let result = ExecutionResult::success();
                shell.last_exit_status = result.exit_code;
                Ok(result)
            }
        }
    }
}

impl Execute for ast::CompoundCommand {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        match self {
            Self::BraceGroup(list) => list.execute(shell, params),
            Self::Subshell(list) => execute_subshell(shell, list, None, params),
            Self::ForClause(f) => f.execute(shell, params),
            Self::CaseClause(c) => c.execute(shell, params),
            Self::IfClause(i) => i.execute(shell, params),
            Self::WhileClause(w) => execute_while_or_until(shell, w, false, params),
            Self::UntilClause(u) => execute_while_or_until(shell, u, true, params),
        }
    }
}

// Consumes or propagates a loop-control marker produced by one loop phase.
enum LoopFlow {
    Normal,
    NextIteration,
    ExitLoop,
}

fn consume_loop_marker(result: &mut ExecutionResult) -> LoopFlow {
    if let Some(count) = result.continue_loop {
        if count == 0 {
            result.continue_loop = None;
            return LoopFlow::NextIteration;
        }
        result.continue_loop = Some(count - 1);
        return LoopFlow::ExitLoop;
    }

    if let Some(count) = result.break_loop {
        if count == 0 {
            result.break_loop = None;
        } else {
            result.break_loop = Some(count - 1);
        }
        return LoopFlow::ExitLoop;
    }

    if result.exit_shell || result.return_from_function {
        return LoopFlow::ExitLoop;
    }

    LoopFlow::Normal
}

fn execute_while_or_until(
    shell: &mut Shell,
    clause: &ast::WhileOrUntilClauseCommand,
    until: bool,
    params: &ExecutionParameters,
) -> Result<ExecutionResult, error::Error> {
    shell.loop_depth += 1;
    let outcome = run_while_or_until(shell, clause, until, params);
    shell.loop_depth -= 1;
    outcome
}

fn run_while_or_until(
    shell: &mut Shell,
    clause: &ast::WhileOrUntilClauseCommand,
    until: bool,
    params: &ExecutionParameters,
) -> Result<ExecutionResult, error::Error> {
    let mut result = ExecutionResult::success();

    loop {
        let mut condition_result = clause.condition.execute(shell, &params.tested())?;

        match consume_loop_marker(&mut condition_result) {
            LoopFlow::Normal => (),
            LoopFlow::NextIteration => continue,
            LoopFlow::ExitLoop => {
                if condition_result.has_control_flow() {
                    result = condition_result;
                }
                break;
            }
        }

        if condition_result.is_success() == until {
            break;
        }

        result = clause.body.execute(shell, &ExecutionParameters::plain())?;

        match consume_loop_marker(&mut result) {
            LoopFlow::Normal | LoopFlow::NextIteration => (),
            LoopFlow::ExitLoop => break,
        }
    }

    shell.last_exit_status = result.exit_code;
    Ok(result)
}

impl Execute for ast::ForClauseCommand {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        // Expand the word list (or take the positional parameters), in order.
        let mut expanded_values = vec![];
        match &self.values {
            Some(unexpanded_values) => {
                for value in unexpanded_values {
                    let mut fields = expansion::expand_word_fields(shell, params, value)?;
                    expanded_values.append(&mut fields);
                }
            }
            None => {
                expanded_values.extend_from_slice(&shell.positional_parameters);
            }
        }

        shell.loop_depth += 1;
        let outcome = (|| -> Result<ExecutionResult, error::Error> {
            let mut result = ExecutionResult::success();

            for value in expanded_values {
                shell.assign_variable(&self.variable_name, &value, false);

                result = self.body.execute(shell, &ExecutionParameters::plain())?;

                match consume_loop_marker(&mut result) {
                    LoopFlow::Normal | LoopFlow::NextIteration => (),
                    LoopFlow::ExitLoop => break,
                }
            }

            Ok(result)
        })();
        shell.loop_depth -= 1;

        let result: ExecutionResult = outcome?;
        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

impl Execute for ast::CaseClauseCommand {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let subject = expansion::expand_word_single(shell, params, &self.value)?;

        for case in &self.cases {
            for pattern in &case.patterns {
                let expanded = expansion::expand_word_pattern(shell, params, pattern)?;
                if crate::patterns::pattern_matches(&expanded, &subject)? {
                    let result = match &case.cmd {
                        Some(cmd) => cmd.execute(shell, &params.inherit())?,
                        None => ExecutionResult::success(),
                    };
                    shell.last_exit_status = result.exit_code;
                    return Ok(result);
                }
            }
        }

        let result = ExecutionResult::success();
        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

impl Execute for ast::IfClauseCommand {
    fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let condition = self.condition.execute(shell, &params.tested())?;

        if condition.has_control_flow() {
            return Ok(condition);
        }

        if condition.is_success() {
            return self.then.execute(shell, &params.inherit());
        }

        for else_clause in &self.elses {
            match &else_clause.condition {
                Some(else_condition) => {
                    let else_result = else_condition.execute(shell, &params.tested())?;
                    if else_result.has_control_flow() {
                        return Ok(else_result);
                    }
                    if else_result.is_success() {
                        return else_clause.body.execute(shell, &params.inherit());
                    }
                }
                None => {
                    return else_clause.body.execute(shell, &params.inherit());
                }
            }
        }

        let result = ExecutionResult::success();
        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

/// Expands the targets of a redirection list, in order.
pub(crate) fn expand_redirects(
    shell: &mut Shell,
    params: &ExecutionParameters,
    redirects: &[ast::IoRedirect],
) -> Result<Vec<ExpandedRedirect>, error::Error> {
    let mut expanded = vec![];

    for redirect in redirects {
        match redirect {
            ast::IoRedirect::File(fd, kind, target) => {
                let target = expansion::expand_word_single(shell, params, target)?;
                let (default_fd, action) = match kind {
                    ast::IoFileRedirectKind::Read => (0, RedirAction::ReadFile(target)),
                    ast::IoFileRedirectKind::Write => (1, RedirAction::WriteFile(target)),
                    ast::IoFileRedirectKind::Append => (1, RedirAction::AppendFile(target)),
                    ast::IoFileRedirectKind::DuplicateInput
                    | ast::IoFileRedirectKind::DuplicateOutput => {
                        let default_fd =
                            if matches!(kind, ast::IoFileRedirectKind::DuplicateInput) {
                                0
                            } else {
                                1
                            };
                        if target == "-" {
                            (default_fd, RedirAction::Close)
                        } else {
                            let source: u32 = target
                                .parse()
                                .map_err(|_| error::Error::InvalidRedirection)?;
                            (default_fd, RedirAction::DupFrom(source))
                        }
                    }
                };
                expanded.push(ExpandedRedirect {
                    fd: fd.unwrap_or(default_fd),
                    action,
                });
            }
            ast::IoRedirect::HereDocument(fd, doc) => {
                let body = if doc.requires_expansion {
                    expansion::expand_heredoc(shell, params, &doc.doc.value)?
                } else {
                    doc.doc.value.clone()
                };
                expanded.push(ExpandedRedirect {
                    fd: fd.unwrap_or(0),
                    action: RedirAction::HereDoc(body),
                });
            }
        }
    }

    Ok(expanded)
}

/// Terminates a forked child with the outcome of its evaluation. The
/// interpreter re-entry path restarts the child as a script interpreter
/// first.
pub(crate) fn child_exit(shell: &mut Shell, result: Result<ExecutionResult, error::Error>) -> ! {
    let status = match result {
        Ok(r) => r.exit_code,
        Err(error::Error::RunAsScript(script)) => shell.reenter_as_script(*script),
        Err(error::Error::Interrupted) => 130,
        Err(e) => {
            shell.report_error(&e);
            e.exit_code()
        }
    };
    std::process::exit(i32::from(status))
}

// Redirects stdin from /dev/null, for background children with no explicit
// stdin of their own.
fn detach_stdin() {
    if let Ok(devnull) = std::fs::File::open("/dev/null") {
        let _ = sys::process::dup2(devnull.as_raw_fd(), 0);
    }
}

// Without job control, background children share the terminal's process
// group; they ignore keyboard signals so an interrupt aimed at the
// foreground doesn't take them down too.
fn shield_background_child() {
    let _ = sys::signal::ignore(sys::signal::Signal::SIGINT);
    let _ = sys::signal::ignore(sys::signal::Signal::SIGQUIT);
}

/// Runs an and-or list in the background: a single forked child evaluates
/// the list and exits, and the parent records the job without waiting.
/// A lone multi-stage pipeline is instead spawned stage-by-stage so the job
/// holds every stage's process.
pub(crate) fn spawn_background(
    shell: &mut Shell,
    ao_list: &ast::AndOrList,
) -> Result<(), error::Error> {
    if ao_list.additional.is_empty() && !ao_list.first.bang && ao_list.first.seq.len() > 1 {
        execute_pipeline_stages(shell, &ao_list.first, true)?;
        return Ok(());
    }

    let mut job = shell.jobs.create_job(ao_list.to_string());

    match sys::process::fork()? {
        sys::process::ForkResult::Child => {
            shell.on_fork_child();
            shield_background_child();
            detach_stdin();
            let params = ExecutionParameters {
                exit_after: true,
                ..ExecutionParameters::default()
            };
            let result = ao_list.execute(shell, &params);
            child_exit(shell, result)
        }
        sys::process::ForkResult::Parent { child } => {
            tracing::debug!(target: "jobs", "started background job (pid {child})");
            job.add_pid(child);
            let interactive = shell.options.interactive;
            let job = shell.jobs.add_background(job);
            if interactive {
                eprintln!("{}", job.to_pid_style_string());
            }
            Ok(())
        }
    }
}

/// Forks and plumbs the stages of a multi-command pipeline. Foreground
/// pipelines wait for the job and report the last stage's status;
/// background pipelines are recorded and report success immediately.
pub(crate) fn execute_pipeline_stages(
    shell: &mut Shell,
    pipeline: &ast::Pipeline,
    background: bool,
) -> Result<ExecutionResult, error::Error> {
    // Prime the cache so every child inherits the resolutions.
    for cmd in &pipeline.seq {
        cmdcache::prehash(shell, cmd);
    }

    let mut job = shell.jobs.create_job(pipeline.to_string());
    let mut prev_read: Option<std::os::fd::OwnedFd> = None;
    let stage_count = pipeline.seq.len();

    for (i, cmd) in pipeline.seq.iter().enumerate() {
        let pipe_pair = if i < stage_count - 1 {
            Some(sys::process::pipe()?)
        } else {
            None
        };

        match sys::process::fork()? {
            sys::process::ForkResult::Child => {
                shell.on_fork_child();
                if background {
                    shield_background_child();
                }

                match prev_read.take() {
                    Some(fd) => {
                        let _ = sys::process::dup2(fd.as_raw_fd(), 0);
                        drop(fd);
                    }
                    None => {
                        if background {
                            detach_stdin();
                        }
                    }
                }

                if let Some((read_end, write_end)) = pipe_pair {
                    drop(read_end);
                    let _ = sys::process::dup2(write_end.as_raw_fd(), 1);
                    drop(write_end);
                }

                let params = ExecutionParameters {
                    exit_after: true,
                    ..ExecutionParameters::default()
                };
                let result = cmd.execute(shell, &params);
                child_exit(shell, result)
            }
            sys::process::ForkResult::Parent { child } => {
                job.add_pid(child);
                drop(prev_read.take());
                if let Some((read_end, write_end)) = pipe_pair {
                    drop(write_end);
                    prev_read = Some(read_end);
                }
            }
        }
    }

    if background {
        let interactive = shell.options.interactive;
        let job = shell.jobs.add_background(job);
        if interactive {
            eprintln!("{}", job.to_pid_style_string());
        }
        Ok(ExecutionResult::success())
    } else {
        let status = job.wait()?;
        Ok(ExecutionResult::new(status))
    }
}

fn execute_subshell(
    shell: &mut Shell,
    list: &ast::CompoundList,
    redirects: Option<&ast::RedirectList>,
    params: &ExecutionParameters,
) -> Result<ExecutionResult, error::Error> {
    // Expand targets in the parent, apply in the child with no save.
    let expanded = match redirects {
        Some(redirects) => expand_redirects(shell, params, &redirects.0)?,
        None => vec![],
    };

    let mut job = shell.jobs.create_job(format!("({list})"));

    match sys::process::fork()? {
        sys::process::ForkResult::Child => {
            shell.on_fork_child();
            let result = shell
                .redirs
                .apply(&expanded, RedirMode::NoSave)
                .and_then(|()| {
                    let child_params = ExecutionParameters {
                        exit_after: true,
                        tested: params.tested,
                        capture: None,
                    };
                    list.execute(shell, &child_params)
                });
            child_exit(shell, result)
        }
        sys::process::ForkResult::Parent { child } => {
            job.add_pid(child);
            let status = job.wait()?;
            shell.last_exit_status = status;
            Ok(ExecutionResult::new(status))
        }
    }
}

/// Evaluates a command-substitution body and returns its captured output.
/// The substitution's exit status is recorded in the shell.
pub(crate) fn eval_back_cmd(
    shell: &mut Shell,
    params: &ExecutionParameters,
    text: &str,
) -> Result<Vec<u8>, error::Error> {
    let program = shell.parse_string(text)?;
    if program.complete_commands.is_empty() {
        return Ok(vec![]);
    }

    let mut back = BackCmd::default();

    if let Some(simple) = single_simple_command(&program) {
        let result = commands::eval_command(shell, simple, params, Some(&mut back))?;
        if back.fd.is_none() {
            shell.last_exit_status = result.exit_code;
            shell.last_command_subst_status = Some(result.exit_code);
            return Ok(std::mem::take(&mut back.buffer));
        }
    } else {
        let mut job = shell.jobs.create_job(text.to_owned());
        let (read_end, write_end) = sys::process::pipe()?;

        match sys::process::fork()? {
            sys::process::ForkResult::Child => {
                shell.on_fork_child();
                drop(read_end);
                let _ = sys::process::dup2(write_end.as_raw_fd(), 1);
                drop(write_end);
                let child_params = ExecutionParameters {
                    exit_after: true,
                    ..ExecutionParameters::default()
                };
                let result = program.execute(shell, &child_params);
                child_exit(shell, result)
            }
            sys::process::ForkResult::Parent { child } => {
                job.add_pid(child);
                drop(write_end);
                back.fd = Some(read_end);
                back.job = Some(job);
            }
        }
    }

    // Drain the pipe, then reap the job for its status.
    let mut output = vec![];
    if let Some(fd) = back.fd.take() {
        use std::io::Read;
        let mut reader = std::fs::File::from(fd);
        reader.read_to_end(&mut output)?;
    }
    if let Some(mut job) = back.job.take() {
        let status = job.wait()?;
        shell.last_exit_status = status;
        shell.last_command_subst_status = Some(status);
    }

    Ok(output)
}

fn single_simple_command(program: &ast::Program) -> Option<&ast::SimpleCommand> {
    if program.complete_commands.len() != 1 {
        return None;
    }
    let list = &program.complete_commands[0];
    if list.0.len() != 1 {
        return None;
    }
    let ast::CompoundListItem(ao_list, sep) = &list.0[0];
    if !matches!(sep, ast::SeparatorOperator::Sequence)
        || !ao_list.additional.is_empty()
        || ao_list.first.bang
        || ao_list.first.seq.len() != 1
    {
        return None;
    }
    match &ao_list.first.seq[0] {
        ast::Command::Simple(simple) => Some(simple),
        _ => None,
    }
}

/// Splits a simple command's words into leading assignments and expanded
/// arguments.
pub(crate) fn expand_command_words(
    shell: &mut Shell,
    params: &ExecutionParameters,
    words: &[ast::Word],
) -> Result<(Vec<(String, String)>, Vec<String>), error::Error> {
    let mut assignments = vec![];
    let mut args: Vec<String> = vec![];
    let mut assignment_phase = true;

    for word in words {
        if assignment_phase && variables::is_assignment_word(&word.value) {
            let (name, raw_value) = word
                .value
                .split_once('=')
                .unwrap_or((word.value.as_str(), ""));
            let value =
                expansion::expand_word_single(shell, params, &ast::Word::new(raw_value))?;
            assignments.push((name.to_owned(), value));
            continue;
        }

        assignment_phase = false;
        let mut fields = expansion::expand_word_fields(shell, params, word)?;
        args.append(&mut fields);
    }

    Ok((assignments, args))
}
