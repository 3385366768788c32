//! Error facilities.

use std::path::PathBuf;

/// Monolithic error type for the shell.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Command was not found.
    #[error("{0}: not found")]
    CommandNotFound(String),

    /// Command was found but could not be executed.
    #[error("{0}: cannot execute")]
    CommandNotExecutable(String),

    /// A reference was made to an unknown shell function.
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// A `%func` path entry named a file that did not define the expected
    /// function.
    #[error("{0} not defined in {1}")]
    FunctionNotDefinedInFile(String, PathBuf),

    /// The requested input or output redirection is invalid.
    #[error("invalid redirection")]
    InvalidRedirection,

    /// An error occurred while redirecting input or output with the given
    /// file.
    #[error("cannot open {0}: {1}")]
    RedirectionFailure(String, #[source] std::io::Error),

    /// Bad file descriptor.
    #[error("bad file descriptor: {0}")]
    BadFileDescriptor(u32),

    /// Invalid parameter expansion syntax.
    #[error("bad substitution: {0}")]
    BadSubstitution(String),

    /// A required parameter was unset or null.
    #[error("{0}: {1}")]
    ParameterNullOrUnset(String, String),

    /// An unset variable was referenced with `-u` in effect.
    #[error("{0}: parameter not set")]
    UnsetVariable(String),

    /// `local` was used outside of a function.
    #[error("local: not in a function")]
    LocalOutsideFunction,

    /// An error occurred evaluating an arithmetic expression.
    #[error("arithmetic: {0}")]
    ArithmeticError(#[from] crate::arithmetic::EvalError),

    /// The given string could not be parsed as an integer.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// The indicated pattern is invalid.
    #[error("invalid pattern: '{0}'")]
    InvalidPattern(String),

    /// A regular expression error occurred.
    #[error("regex error: {0}")]
    RegexError(#[from] fancy_regex::Error),

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),

    /// A system call failed.
    #[error("{0}")]
    SysError(#[from] nix::errno::Errno),

    /// An error occurred while parsing shell input.
    #[error("{0}")]
    ParseError(#[from] swish_parser::ParseError),

    /// An invalid signal was referenced.
    #[error("{0}: invalid signal specification")]
    InvalidSignal(String),

    /// The user interrupted execution.
    #[error("interrupted")]
    Interrupted,

    /// A file run with `exec`-style semantics turned out not to be a binary;
    /// the shell must restart as an interpreter for it. This unwinds every
    /// evaluator frame and is handled only by the driver loops.
    #[error("{0}: is a shell script")]
    RunAsScript(Box<ScriptToRun>),

    /// The requested functionality is not implemented.
    #[error("not supported: {0}")]
    Unimplemented(&'static str),
}

/// Describes a script file the shell should restart as an interpreter for.
#[derive(Debug)]
pub struct ScriptToRun {
    /// Path of the script file.
    pub path: PathBuf,
    /// The name the script was invoked under.
    pub arg0: String,
    /// Positional arguments for the script.
    pub args: Vec<String>,
}

impl std::fmt::Display for ScriptToRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl Error {
    /// Maps the error to the exit status the shell should report for it.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::CommandNotFound(_) | Self::FunctionNotFound(_) => 127,
            Self::CommandNotExecutable(_) => 126,
            Self::Interrupted => 130,
            _ => 2,
        }
    }

    /// Returns whether the error may be caught and converted to an exit
    /// status by an enclosing builtin frame. Interrupts and interpreter
    /// re-entry always unwind to a driver loop.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Interrupted | Self::RunAsScript(_))
    }
}

/// Convenience function for returning an error for unimplemented
/// functionality.
pub fn unimp<T>(msg: &'static str) -> Result<T, Error> {
    Err(Error::Unimplemented(msg))
}
