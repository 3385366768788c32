//! The `swish` binary: argument handling, shell construction, profile
//! sourcing, and dispatch into the read–eval loop.

mod args;
mod events;

use std::path::{Path, PathBuf};

use clap::Parser;

use swish_core::{CreateOptions, Error, ExecutionParameters, Shell};

use crate::args::CommandLineArgs;

fn main() {
    let args = CommandLineArgs::parse();

    if args.version {
        println!("swish {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    events::init_tracing(args.log_filter.clone());

    let status = match run(args) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("swish: {e}");
            e.exit_code()
        }
    };

    std::process::exit(i32::from(status));
}

fn run(args: CommandLineArgs) -> Result<u8, Error> {
    let invoked_as = std::env::args().next().unwrap_or_else(|| "swish".to_owned());
    let login_shell = invoked_as.starts_with('-');

    let has_script = args.command.is_none() && !args.read_from_stdin;
    let script_path = if has_script {
        args.script_args.first().cloned()
    } else {
        None
    };

    let stdin_is_terminal = {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    };
    let interactive =
        args.interactive || (args.command.is_none() && script_path.is_none() && stdin_is_terminal);

    let (shell_name, positional_args) = if args.command.is_some() {
        // With -c, a following operand names the command ($0) and the rest
        // become positional parameters.
        match args.script_args.split_first() {
            Some((name, rest)) => (Some(name.clone()), rest.to_vec()),
            None => (Some(invoked_as.clone()), vec![]),
        }
    } else if let Some(path) = &script_path {
        (
            Some(path.clone()),
            args.script_args.iter().skip(1).cloned().collect(),
        )
    } else {
        // Reading stdin (with or without -s): any operands become the
        // positional parameters.
        (Some(invoked_as.clone()), args.script_args.clone())
    };

    let mut shell = Shell::new(CreateOptions {
        interactive,
        shell_name,
        positional_args,
        errexit: args.exit_on_error,
        xtrace: args.print_commands,
        nounset: args.unset_is_error,
        noglob: args.disable_globbing,
        noexec: args.no_execute,
        do_not_inherit_env: false,
    })?;

    if login_shell {
        source_profiles(&mut shell);
    } else if args.command.is_some() || args.read_from_stdin {
        if let Ok(init) = std::env::var("SHINIT") {
            let _ = shell.run_string(&init, &ExecutionParameters::default());
        }
    }

    let outcome = if let Some(command) = &args.command {
        let result = shell.run_string(command, &ExecutionParameters::default());
        result.map(|r| r.exit_code)
    } else if let Some(path) = &script_path {
        run_script(&mut shell, Path::new(path))
    } else {
        shell.input.push_stdin()?;
        shell.command_loop(true)
    };

    let status = settle(&mut shell, outcome);
    shell.run_exit_trap();
    Ok(status)
}

// Converts the outcome of a run into a final exit status, following the
// interpreter re-entry path when an exec fell through to a script.
fn settle(shell: &mut Shell, outcome: Result<u8, Error>) -> u8 {
    match outcome {
        Ok(status) => status,
        Err(Error::RunAsScript(script)) => shell.reenter_as_script(*script),
        Err(Error::Interrupted) => {
            eprintln!();
            130
        }
        Err(e) => {
            shell.report_error(&e);
            e.exit_code()
        }
    }
}

fn run_script(shell: &mut Shell, path: &Path) -> Result<u8, Error> {
    shell.input.push_file(path)?;
    shell.command_loop(false)
}

// Login shells read the system profile and the user's, in that order.
// Missing files are fine; errors in a profile shouldn't keep the shell
// from starting.
fn source_profiles(shell: &mut Shell) {
    let mut profiles = vec![PathBuf::from("/etc/profile")];
    if let Some(home) = std::env::var_os("HOME") {
        profiles.push(PathBuf::from(home).join(".profile"));
    }

    for profile in profiles {
        if profile.is_file() {
            if let Err(e) = shell.source_file(&profile) {
                shell.report_error(&e);
            }
        }
    }
}
