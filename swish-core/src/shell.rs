//! The core shell structure and its driver loops.

use std::path::{Path, PathBuf};

use swish_parser::{ast, Parser, SourceInfo};

use crate::builtins;
use crate::cmdcache::CommandCache;
use crate::error;
use crate::input::InputStack;
use crate::interp::{Execute, ExecutionParameters, ExecutionResult};
use crate::jobs::JobManager;
use crate::options::RuntimeOptions;
use crate::redir::RedirStack;
use crate::sys;
use crate::traps::{TrapHandlerConfig, TrapSignal};
use crate::variables::VariableStore;

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
const DEFAULT_PS1: &str = "$ ";
const DEFAULT_PS2: &str = "> ";

/// Options for creating a shell instance.
#[derive(Default)]
pub struct CreateOptions {
    /// Whether the shell is interactive.
    pub interactive: bool,
    /// The name the shell was invoked under (`$0`).
    pub shell_name: Option<String>,
    /// Initial positional parameters.
    pub positional_args: Vec<String>,
    /// Enable `-e`.
    pub errexit: bool,
    /// Enable `-x`.
    pub xtrace: bool,
    /// Enable `-u`.
    pub nounset: bool,
    /// Enable `-f`.
    pub noglob: bool,
    /// Enable `-n`.
    pub noexec: bool,
    /// Don't seed variables from the process environment.
    pub do_not_inherit_env: bool,
}

/// Represents an instance of a shell.
pub struct Shell {
    /// Trap handler configuration for the shell.
    pub traps: TrapHandlerConfig,

    /// The current working directory.
    pub working_dir: PathBuf,

    /// The shell's variables.
    pub env: VariableStore,

    /// Runtime shell options.
    pub options: RuntimeOptions,

    /// State of managed background jobs.
    pub jobs: JobManager,

    /// The command cache (builtins, functions, and external locations).
    pub cmd_cache: CommandCache,

    /// The ordered builtin table.
    pub(crate) builtins: Vec<builtins::Registration>,

    /// The status of the last completed command.
    pub last_exit_status: u8,

    /// Status of a command substitution performed during the most recent
    /// word expansion, if any.
    pub(crate) last_command_subst_status: Option<u8>,

    /// Positional parameters (`$1`...).
    pub positional_parameters: Vec<String>,

    /// The shell or script name (`$0`).
    pub shell_name: String,

    /// The input stack feeding the parser.
    pub input: InputStack,

    /// Pushed redirections.
    pub(crate) redirs: RedirStack,

    /// Dynamic nesting depth of `while`/`until`/`for` loops.
    pub(crate) loop_depth: u32,

    /// Dynamic nesting depth of function invocations.
    pub(crate) function_depth: u32,

    /// The name of the currently executing builtin or function, for
    /// diagnostics.
    pub(crate) command_name: Option<String>,

    /// Subshell depth (0 in the root shell).
    pub(crate) depth: usize,

    exit_trap_ran: bool,
}

impl Shell {
    /// Returns a new shell instance created with the given options.
    pub fn new(options: CreateOptions) -> Result<Self, error::Error> {
        let mut runtime_options = RuntimeOptions {
            interactive: options.interactive,
            exit_on_nonzero_command_exit: options.errexit,
            print_commands_and_arguments: options.xtrace,
            treat_unset_variables_as_error: options.nounset,
            disable_filename_globbing: options.noglob,
            do_not_execute_commands: options.noexec,
            ..RuntimeOptions::default()
        };

        // noexec is meaningless interactively.
        if runtime_options.interactive {
            runtime_options.do_not_execute_commands = false;
        }

        let mut shell = Self {
            traps: TrapHandlerConfig::default(),
            working_dir: std::env::current_dir()?,
            env: VariableStore::new(),
            options: runtime_options,
            jobs: JobManager::new(),
            cmd_cache: CommandCache::new(),
            builtins: builtins::default_builtins(),
            last_exit_status: 0,
            last_command_subst_status: None,
            positional_parameters: options.positional_args,
            shell_name: options.shell_name.unwrap_or_else(|| "swish".to_owned()),
            input: InputStack::new(),
            redirs: RedirStack::new(),
            loop_depth: 0,
            function_depth: 0,
            command_name: None,
            depth: 0,
            exit_trap_ran: false,
        };

        if !options.do_not_inherit_env {
            for (name, value) in std::env::vars() {
                shell.env.set(&name, value, true);
            }
        }

        if shell.env.get_str("IFS").is_none() {
            shell.env.set("IFS", " \t\n", false);
        }
        shell
            .env
            .set("PWD", shell.working_dir.to_string_lossy(), true);

        if shell.options.interactive {
            sys::signal::catch(sys::signal::Signal::SIGINT)?;
            sys::signal::ignore(sys::signal::Signal::SIGQUIT)?;
        }

        Ok(shell)
    }

    /// Returns whether this shell is a subshell.
    pub fn is_subshell(&self) -> bool {
        self.depth > 0
    }

    /// Returns the current `PATH` value.
    pub fn pathval(&self) -> String {
        self.env
            .get_str("PATH")
            .unwrap_or(DEFAULT_PATH)
            .to_owned()
    }

    /// Finds a builtin by name in the builtin table.
    pub(crate) fn find_builtin(&self, name: &str) -> Option<usize> {
        self.builtins.iter().position(|r| r.name == name)
    }

    /// Assigns a variable, routing `PATH` changes through cache
    /// invalidation.
    pub fn assign_variable(&mut self, name: &str, value: &str, export: bool) {
        if name == "PATH" {
            let old = self.pathval();
            self.env.set(name, value, export);
            self.cmd_cache.on_path_change(&old, value);
        } else {
            self.env.set(name, value, export);
        }
    }

    /// Writes a diagnostic for the given error to standard error.
    pub fn report_error(&self, e: &error::Error) {
        match &self.command_name {
            Some(name) => eprintln!("swish: {name}: {e}"),
            None => eprintln!("swish: {e}"),
        }
    }

    /// Parses a string into a complete program (without executing it).
    pub(crate) fn parse_string(&mut self, text: &str) -> Result<ast::Program, error::Error> {
        self.input.push_string(text);
        let result = {
            let source_info = SourceInfo::new("<string>");
            let mut parser = Parser::new(&mut self.input, &source_info);
            parser.parse_program()
        };
        self.input.pop();
        Ok(result?)
    }

    /// Executes commands from a string in the current shell environment.
    pub fn run_string(
        &mut self,
        text: &str,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        self.input.push_string(text);

        let outcome = (|| -> Result<ExecutionResult, error::Error> {
            let mut result = ExecutionResult::success();
            loop {
                let parsed = {
                    let source_info = SourceInfo::new("<string>");
                    let mut parser = Parser::new(&mut self.input, &source_info);
                    parser.parse_command()
                };

                match parsed? {
                    None => break,
                    Some(list) if list.0.is_empty() => continue,
                    Some(list) => {
                        result = list.execute(self, params)?;
                        if result.has_control_flow() {
                            break;
                        }
                    }
                }
            }
            Ok(result)
        })();

        self.input.pop();
        outcome
    }

    /// Sources a file in the current shell environment (the `.` builtin and
    /// profile loading).
    pub fn source_file(&mut self, path: &Path) -> Result<u8, error::Error> {
        self.input.push_file(path)?;
        let outcome = self.command_loop(false);
        self.input.pop();
        outcome
    }

    /// Reads command definitions from a file found via a `%func` path
    /// entry.
    pub(crate) fn read_command_file(&mut self, path: &Path) -> Result<(), error::Error> {
        self.source_file(path)?;
        Ok(())
    }

    /// The read–eval loop over the current top of the input stack.
    ///
    /// At the top level of an interactive shell, recoverable errors are
    /// reported and the loop resumes at the prompt; everywhere else they
    /// propagate to the caller.
    pub fn command_loop(&mut self, top_level: bool) -> Result<u8, error::Error> {
        let input_base = self.input.depth();
        let redir_base = self.redirs.depth();
        let mut eof_nags = 0u32;

        loop {
            // Sweep finished background jobs between commands.
            match self.jobs.reap_finished() {
                Ok(finished) => {
                    if self.options.interactive && top_level {
                        for job in finished {
                            eprintln!("{job}");
                        }
                    }
                }
                Err(_) => (),
            }

            if let Err(e) = self.dispatch_traps() {
                self.recover_or_rethrow(e, top_level, input_base, redir_base)?;
                continue;
            }

            let interactive_prompting = self.options.interactive && top_level;
            if interactive_prompting {
                let ps1 = self
                    .env
                    .get_str("PS1")
                    .unwrap_or(DEFAULT_PS1)
                    .to_owned();
                let ps2 = self
                    .env
                    .get_str("PS2")
                    .unwrap_or(DEFAULT_PS2)
                    .to_owned();
                self.input.prompt_next = Some(ps1);
                self.input.continuation_prompt = Some(ps2);
            }

            let source_name = self.shell_name.clone();
            let parsed = {
                let source_info = SourceInfo::new(source_name);
                let mut parser = Parser::new(&mut self.input, &source_info);
                parser.parse_command()
            };

            let list = match parsed {
                Ok(Some(list)) => list,
                Ok(None) => {
                    if interactive_prompting && self.options.ignore_eof && eof_nags < 50 {
                        eprintln!("\nUse \"exit\" to leave swish.");
                        eof_nags += 1;
                        self.input.rewind_eof();
                        continue;
                    }
                    break;
                }
                Err(parse_error) => {
                    let e = match parse_error {
                        swish_parser::ParseError::Io(io)
                            if io.kind() == std::io::ErrorKind::Interrupted =>
                        {
                            sys::signal::take_pending();
                            error::Error::Interrupted
                        }
                        other => error::Error::ParseError(other),
                    };
                    self.recover_or_rethrow(e, top_level, input_base, redir_base)?;
                    continue;
                }
            };

            if list.0.is_empty() {
                continue;
            }

            let params = ExecutionParameters::default();
            match list.execute(self, &params) {
                Ok(result) => {
                    if result.exit_shell {
                        self.last_exit_status = result.exit_code;
                        break;
                    }
                }
                Err(e) => {
                    self.recover_or_rethrow(e, top_level, input_base, redir_base)?;
                }
            }
        }

        Ok(self.last_exit_status)
    }

    // Top-level error recovery: an interactive top-level loop reports the
    // error and carries on with reset state; everything else unwinds.
    fn recover_or_rethrow(
        &mut self,
        e: error::Error,
        top_level: bool,
        input_base: usize,
        redir_base: usize,
    ) -> Result<(), error::Error> {
        if !(top_level && self.options.interactive && e.is_recoverable()) {
            return Err(e);
        }

        if matches!(e, error::Error::Interrupted) {
            eprintln!();
        } else {
            self.report_error(&e);
        }
        self.last_exit_status = e.exit_code();

        // Restore the invariants an unwound evaluation may have left behind.
        self.loop_depth = 0;
        self.function_depth = 0;
        self.input.pop_to_depth(input_base);
        while self.redirs.depth() > redir_base {
            self.redirs.pop();
        }

        Ok(())
    }

    /// Delivers pending traps. Untrapped interrupts surface as an
    /// [`error::Error::Interrupted`] unwind.
    pub(crate) fn dispatch_traps(&mut self) -> Result<(), error::Error> {
        if !sys::signal::any_pending() {
            return Ok(());
        }
        // A trap body doesn't re-enter dispatch; its pending signals run
        // after it completes.
        if self.traps.handler_depth > 0 {
            return Ok(());
        }

        let pending = sys::signal::take_pending();
        let mut interrupted = false;

        for signo in 1..64 {
            let Ok(signal) = sys::signal::Signal::try_from(signo) else {
                continue;
            };
            if !sys::signal::mask_contains(pending, signal) {
                continue;
            }

            match self
                .traps
                .get_handler(TrapSignal::Signal(signal))
                .map(str::to_owned)
            {
                Some(body) if !body.is_empty() => {
                    // Traps run with a clean slate: their status doesn't
                    // leak into `$?`, and errexit doesn't fire inside them.
                    let saved_status = self.last_exit_status;
                    self.traps.handler_depth += 1;
                    let outcome = self.run_string(
                        &body,
                        &ExecutionParameters {
                            tested: true,
                            ..ExecutionParameters::default()
                        },
                    );
                    self.traps.handler_depth -= 1;
                    self.last_exit_status = saved_status;
                    outcome?;
                }
                Some(_) => (),
                None => {
                    if signal == sys::signal::Signal::SIGINT {
                        interrupted = true;
                    }
                }
            }
        }

        if interrupted {
            return Err(error::Error::Interrupted);
        }
        Ok(())
    }

    /// Runs the `EXIT` trap, once, if one is registered.
    pub fn run_exit_trap(&mut self) {
        if self.exit_trap_ran {
            return;
        }
        self.exit_trap_ran = true;

        if let Some(body) = self.traps.get_handler(TrapSignal::Exit).map(str::to_owned) {
            if !body.is_empty() {
                let _ = self.run_string(
                    &body,
                    &ExecutionParameters {
                        tested: true,
                        ..ExecutionParameters::default()
                    },
                );
            }
        }
    }

    /// Reinitializes the forked child's copy of the shell state: signals
    /// return to their defaults, and parent-only state (jobs, saved
    /// descriptors, traps) is dropped.
    pub(crate) fn on_fork_child(&mut self) {
        for (signal, _) in self.traps.iter_handlers() {
            if let TrapSignal::Signal(signal) = signal {
                let _ = sys::signal::set_default(signal);
            }
        }
        self.traps.clear_for_child();

        let _ = sys::signal::set_default(sys::signal::Signal::SIGINT);
        let _ = sys::signal::set_default(sys::signal::Signal::SIGQUIT);
        sys::signal::clear_pending();

        self.jobs.clear();
        self.redirs.forget_all();
        self.options.interactive = false;
        self.depth += 1;
        self.exit_trap_ran = true;
    }

    /// Restarts this process as an interpreter for a script file that
    /// `execve` rejected. Every piece of per-invocation state is reset, the
    /// script becomes the input, and the command loop runs it to
    /// completion. Returns the status the process should exit with.
    pub fn reenter_as_script(&mut self, script: error::ScriptToRun) -> u8 {
        let mut next = Some(script);

        // A script may in turn exec another script; keep re-entering.
        while let Some(script) = next.take() {
            self.cmd_cache.delete_functions();
            self.traps.clear_for_child();
            self.jobs.clear();
            self.redirs.forget_all();
            self.input.pop_all();
            self.loop_depth = 0;
            self.function_depth = 0;
            self.options.interactive = false;
            self.last_exit_status = 0;
            self.shell_name = script.arg0;
            self.positional_parameters = script.args;

            if let Err(e) = self.input.push_file(&script.path) {
                self.report_error(&e);
                return 127;
            }

            match self.command_loop(false) {
                Ok(status) => return status,
                Err(error::Error::RunAsScript(inner)) => next = Some(*inner),
                Err(error::Error::Interrupted) => return 130,
                Err(e) => {
                    self.report_error(&e);
                    return e.exit_code();
                }
            }
        }

        self.last_exit_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_shell() -> Shell {
        Shell::new(CreateOptions::default()).unwrap()
    }

    fn run(shell: &mut Shell, text: &str) -> ExecutionResult {
        shell
            .run_string(text, &ExecutionParameters::default())
            .unwrap()
    }

    #[test]
    fn sequences_and_connectives_set_status() {
        let mut shell = test_shell();
        assert_eq!(run(&mut shell, "true; false").exit_code, 1);
        assert_eq!(run(&mut shell, "false && true").exit_code, 1);
        assert_eq!(run(&mut shell, "false || true").exit_code, 0);
        assert_eq!(run(&mut shell, "! true").exit_code, 1);
        assert_eq!(run(&mut shell, "! false").exit_code, 0);
    }

    #[test]
    fn variables_flow_through_commands() {
        let mut shell = test_shell();
        run(&mut shell, "x=hello");
        assert_eq!(shell.env.get_str("x"), Some("hello"));

        run(&mut shell, "y=$x");
        assert_eq!(shell.env.get_str("y"), Some("hello"));
    }

    #[test]
    fn if_clause_branches() {
        let mut shell = test_shell();
        run(&mut shell, "if true; then r=then; else r=else; fi");
        assert_eq!(shell.env.get_str("r"), Some("then"));

        run(&mut shell, "if false; then r2=then; else r2=else; fi");
        assert_eq!(shell.env.get_str("r2"), Some("else"));

        run(
            &mut shell,
            "if false; then r3=a; elif true; then r3=b; else r3=c; fi",
        );
        assert_eq!(shell.env.get_str("r3"), Some("b"));
    }

    #[test]
    fn for_loop_iterates_in_order() {
        let mut shell = test_shell();
        run(&mut shell, "acc=; for i in 1 2 3; do acc=$acc$i; done");
        assert_eq!(shell.env.get_str("acc"), Some("123"));
    }

    #[test]
    fn while_loop_with_break() {
        let mut shell = test_shell();
        run(
            &mut shell,
            "i=0; while true; do i=$((i+1)); if [ $i = 2 ]; then break; fi; done",
        );
        assert_eq!(shell.env.get_str("i"), Some("2"));
        // The loop nesting fully unwound.
        assert_eq!(shell.loop_depth, 0);
    }

    #[test]
    fn until_loop_runs_until_success() {
        let mut shell = test_shell();
        run(&mut shell, "i=0; until [ $i = 3 ]; do i=$((i+1)); done");
        assert_eq!(shell.env.get_str("i"), Some("3"));
    }

    #[test]
    fn break_levels_clamp_to_nesting() {
        let mut shell = test_shell();
        run(
            &mut shell,
            "hits=; for a in 1 2; do for b in 1 2; do hits=$hits$a$b; break 5; done; done",
        );
        // `break 5` clamps to the two enclosing loops.
        assert_eq!(shell.env.get_str("hits"), Some("11"));
        assert_eq!(shell.loop_depth, 0);
    }

    #[test]
    fn continue_skips_to_next_iteration() {
        let mut shell = test_shell();
        run(
            &mut shell,
            "acc=; for i in 1 2 3; do if [ $i = 2 ]; then continue; fi; acc=$acc$i; done",
        );
        assert_eq!(shell.env.get_str("acc"), Some("13"));
    }

    #[test]
    fn case_selects_first_matching_arm() {
        let mut shell = test_shell();
        run(
            &mut shell,
            "case abc in a) r=first;; a*) r=second;; *) r=third;; esac",
        );
        assert_eq!(shell.env.get_str("r"), Some("second"));

        run(&mut shell, "case xyz in a) r2=a;; b) r2=b;; esac");
        assert_eq!(shell.env.get_str("r2"), None);
    }

    #[test]
    fn functions_define_call_and_return() {
        let mut shell = test_shell();
        let result = run(&mut shell, "f() { return 7; }; f");
        assert_eq!(result.exit_code, 7);
        assert_eq!(shell.function_depth, 0);

        run(&mut shell, "g() { r=$1; }; g arg1");
        assert_eq!(shell.env.get_str("r"), Some("arg1"));
        // The caller's positional parameters were restored.
        assert!(shell.positional_parameters.is_empty());
    }

    #[test]
    fn function_redefinition_replaces_body() {
        let mut shell = test_shell();
        run(&mut shell, "f() { r=one; }; f() { r=two; }; f");
        assert_eq!(shell.env.get_str("r"), Some("two"));
    }

    #[test]
    fn unset_function_is_gone() {
        let mut shell = test_shell();
        run(&mut shell, "f() { :; }; unset -f f");
        assert!(shell.cmd_cache.get("f").is_none());
    }

    #[test]
    fn locals_are_scoped_to_functions() {
        let mut shell = test_shell();
        run(
            &mut shell,
            "x=outer; f() { local x=inner; r1=$x; }; f; r2=$x",
        );
        assert_eq!(shell.env.get_str("r1"), Some("inner"));
        assert_eq!(shell.env.get_str("r2"), Some("outer"));
    }

    #[test]
    fn command_substitution_captures_builtin_output() {
        let mut shell = test_shell();
        run(&mut shell, "x=$(echo hello)");
        assert_eq!(shell.env.get_str("x"), Some("hello"));

        run(&mut shell, "y=`echo back`");
        assert_eq!(shell.env.get_str("y"), Some("back"));
    }

    #[test]
    fn assignment_only_command_reports_substitution_status() {
        let mut shell = test_shell();
        let result = run(&mut shell, "x=$(false)");
        assert_eq!(result.exit_code, 1);
        let result = run(&mut shell, "x=plain");
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn errexit_stops_on_failure() {
        let mut shell = test_shell();
        shell.options.exit_on_nonzero_command_exit = true;
        let result = run(&mut shell, "false; marker=set");
        assert!(result.exit_shell);
        assert_eq!(shell.env.get_str("marker"), None);
    }

    #[test]
    fn errexit_spares_tested_commands() {
        let mut shell = test_shell();
        shell.options.exit_on_nonzero_command_exit = true;
        let result = run(&mut shell, "if false; then :; fi; marker=set");
        assert!(!result.exit_shell);
        assert_eq!(shell.env.get_str("marker"), Some("set"));
    }

    #[test]
    fn eval_builtin_reenters_the_evaluator() {
        let mut shell = test_shell();
        run(&mut shell, "eval 'x=from eval'");
        assert_eq!(shell.env.get_str("x"), Some("from"));

        run(&mut shell, "eval x='from' y='eval'");
        assert_eq!(shell.env.get_str("y"), Some("eval"));
    }

    #[test]
    fn dot_builtin_sources_in_current_environment() {
        use std::io::Write as _;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "sourced=yes").unwrap();

        let mut shell = test_shell();
        run(&mut shell, &format!(". {}", tmp.path().display()));
        assert_eq!(shell.env.get_str("sourced"), Some("yes"));
    }

    #[test]
    fn top_level_state_is_clean_after_runs() {
        let mut shell = test_shell();
        run(
            &mut shell,
            "f() { for i in 1 2; do break 9; done; return 3; }; f",
        );
        assert_eq!(shell.loop_depth, 0);
        assert_eq!(shell.function_depth, 0);
        assert_eq!(shell.redirs.depth(), 0);
    }

    #[test]
    fn exit_requests_shell_termination() {
        let mut shell = test_shell();
        let result = run(&mut shell, "exit 3; echo unreachable");
        assert!(result.exit_shell);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn shift_moves_positional_parameters() {
        let mut shell = test_shell();
        shell.positional_parameters = vec!["a".into(), "b".into(), "c".into()];
        run(&mut shell, "shift");
        assert_eq!(shell.positional_parameters, vec!["b", "c"]);
        run(&mut shell, "shift 2");
        assert!(shell.positional_parameters.is_empty());
    }

    #[test]
    fn set_updates_options_and_parameters() {
        let mut shell = test_shell();
        run(&mut shell, "set -e");
        assert!(shell.options.exit_on_nonzero_command_exit);
        run(&mut shell, "set +e");
        assert!(!shell.options.exit_on_nonzero_command_exit);

        run(&mut shell, "set -- one two");
        assert_eq!(shell.positional_parameters, vec!["one", "two"]);
    }

    // Commands that fork (externals, pipelines, subshells, background
    // jobs) are exercised end-to-end through the shell binary, where the
    // process is single-threaded; see the integration tests.

    #[test]
    fn unknown_commands_report_127() {
        let mut shell = test_shell();
        let result = run(&mut shell, "definitely-not-a-command-2931");
        assert_eq!(result.exit_code, 127);
    }

    #[test]
    fn traps_run_at_statement_boundaries() {
        let mut shell = test_shell();
        run(&mut shell, "trap 'hit=yes' USR1");

        // Raise the signal in-process; the next statement boundary should
        // run the trap body. Another test thread draining the pending mask
        // can steal the delivery, so retry until the trap has fired.
        for _ in 0..20 {
            sys::signal::kill_process(
                nix::unistd::Pid::this(),
                sys::signal::Signal::SIGUSR1,
            )
            .unwrap();
            run(&mut shell, "probe=1");
            if shell.env.get_str("hit").is_some() {
                break;
            }
        }
        assert_eq!(shell.env.get_str("hit"), Some("yes"));
    }

    #[test]
    fn exit_trap_runs_once() {
        let mut shell = test_shell();
        run(&mut shell, "trap 'counter=${counter}x' EXIT");
        shell.run_exit_trap();
        shell.run_exit_trap();
        assert_eq!(shell.env.get_str("counter"), Some("x"));
    }
}
