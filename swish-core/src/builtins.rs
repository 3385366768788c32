//! Facilities for implementing and registering builtins.

use std::io::Write;

use crate::commands::ExecutionContext;
use crate::error;

mod break_;
mod builtin_;
mod cd;
mod colon;
mod continue_;
mod dot;
mod echo;
mod eval;
mod exec;
mod exit;
mod export;
mod false_;
mod hash;
mod local;
mod pwd;
mod return_;
mod set;
mod shift;
mod test;
mod trap;
mod true_;
mod type_;
mod unset;
mod wait;

/// The outcome of a builtin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitCode {
    /// Zero exit status.
    Success,
    /// The command was invoked incorrectly.
    InvalidUsage,
    /// A specific exit status.
    Custom(u8),
    /// The shell should exit with the given status.
    ExitShell(u8),
    /// The shell should return from the current function with the given
    /// status.
    ReturnFromFunction(u8),
    /// Break out of the containing loop, plus the given number of outer
    /// levels.
    BreakLoop(u8),
    /// Continue the containing loop at the given number of outer levels.
    ContinueLoop(u8),
}

/// How the dispatcher must treat a builtin.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DispatchClass {
    /// No special handling.
    Normal,
    /// The `builtin` command: the following word names a builtin to run.
    BuiltinCmd,
    /// The `.` command: forks under command substitution; errors unwind.
    Dot,
    /// The `eval` command: forks under command substitution; errors unwind.
    Eval,
    /// The `exec` command: redirections apply without saving; errors unwind.
    Exec,
}

/// Type of the function implementing a builtin.
pub(crate) type BuiltinFn =
    fn(&mut ExecutionContext<'_, '_>, Vec<String>) -> Result<ExitCode, error::Error>;

/// A builtin's entry in the shell's (ordered) builtin table.
#[derive(Clone, Copy)]
pub(crate) struct Registration {
    /// The command name.
    pub name: &'static str,
    /// The implementing function.
    pub execute: BuiltinFn,
    /// Dispatch treatment.
    pub dispatch: DispatchClass,
}

/// Trait implemented by builtins.
pub(crate) trait Command: clap::Parser {
    /// Runs the builtin in the given context.
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error>;
}

// Parses arguments with clap and runs the builtin; a parse failure reports
// usage and yields status 2.
fn parse_and_run<T: Command>(
    context: &mut ExecutionContext<'_, '_>,
    args: Vec<String>,
) -> Result<ExitCode, error::Error> {
    match T::try_parse_from(args) {
        Ok(command) => command.execute(context),
        Err(e) => {
            let _ = write!(context.stderr(), "{e}");
            Ok(ExitCode::InvalidUsage)
        }
    }
}

// Maps an evaluation result back into a builtin's exit code, preserving any
// control flow it carries (used by builtins that re-enter the evaluator).
pub(crate) fn result_to_exit_code(result: &crate::interp::ExecutionResult) -> ExitCode {
    if result.exit_shell {
        ExitCode::ExitShell(result.exit_code)
    } else if result.return_from_function {
        ExitCode::ReturnFromFunction(result.exit_code)
    } else if let Some(count) = result.break_loop {
        ExitCode::BreakLoop(count)
    } else if let Some(count) = result.continue_loop {
        ExitCode::ContinueLoop(count)
    } else {
        ExitCode::Custom(result.exit_code)
    }
}

fn builtin<T: Command>(name: &'static str) -> Registration {
    Registration {
        name,
        execute: parse_and_run::<T>,
        dispatch: DispatchClass::Normal,
    }
}

fn special<T: Command>(name: &'static str, dispatch: DispatchClass) -> Registration {
    Registration {
        name,
        execute: parse_and_run::<T>,
        dispatch,
    }
}

/// Returns the shell's builtin table, in its canonical order.
pub(crate) fn default_builtins() -> Vec<Registration> {
    vec![
        special::<builtin_::BuiltinCommand>("builtin", DispatchClass::BuiltinCmd),
        special::<dot::DotCommand>(".", DispatchClass::Dot),
        special::<eval::EvalCommand>("eval", DispatchClass::Eval),
        special::<exec::ExecCommand>("exec", DispatchClass::Exec),
        builtin::<colon::ColonCommand>(":"),
        builtin::<break_::BreakCommand>("break"),
        builtin::<cd::CdCommand>("cd"),
        builtin::<continue_::ContinueCommand>("continue"),
        builtin::<echo::EchoCommand>("echo"),
        builtin::<exit::ExitCommand>("exit"),
        builtin::<export::ExportCommand>("export"),
        builtin::<false_::FalseCommand>("false"),
        builtin::<hash::HashCommand>("hash"),
        builtin::<local::LocalCommand>("local"),
        builtin::<pwd::PwdCommand>("pwd"),
        builtin::<return_::ReturnCommand>("return"),
        builtin::<set::SetCommand>("set"),
        builtin::<shift::ShiftCommand>("shift"),
        builtin::<test::TestCommand>("test"),
        builtin::<test::TestCommand>("["),
        builtin::<trap::TrapCommand>("trap"),
        builtin::<true_::TrueCommand>("true"),
        builtin::<type_::TypeCommand>("type"),
        builtin::<unset::UnsetCommand>("unset"),
        builtin::<wait::WaitCommand>("wait"),
    ]
}
