//! Command-line argument parsing for the `swish` binary.

use clap::Parser;

/// A small POSIX-style shell.
#[derive(Parser)]
#[clap(name = "swish", version, disable_version_flag = true)]
pub(crate) struct CommandLineArgs {
    /// Execute the given command string and exit.
    #[clap(short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// Read commands from standard input.
    #[clap(short = 's')]
    pub read_from_stdin: bool,

    /// Run interactively.
    #[clap(short = 'i')]
    pub interactive: bool,

    /// Exit when a command fails.
    #[clap(short = 'e')]
    pub exit_on_error: bool,

    /// Treat references to unset variables as errors.
    #[clap(short = 'u')]
    pub unset_is_error: bool,

    /// Print commands and their arguments as they execute.
    #[clap(short = 'x')]
    pub print_commands: bool,

    /// Disable pathname globbing.
    #[clap(short = 'f')]
    pub disable_globbing: bool,

    /// Read commands without executing them.
    #[clap(short = 'n')]
    pub no_execute: bool,

    /// Print version information.
    #[clap(long = "version")]
    pub version: bool,

    /// Log filter (e.g. `debug`, `swish_core=trace`); also settable via
    /// `SWISH_LOG`.
    #[clap(long = "log-filter", value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Script path and its arguments (or, with -c, the command name and
    /// arguments).
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub script_args: Vec<String>,
}
