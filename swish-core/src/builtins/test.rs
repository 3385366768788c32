use std::io::Write;
use std::path::Path;

use clap::Parser;

use crate::builtins::{Command, ExitCode};
use crate::commands::ExecutionContext;
use crate::error;

/// Evaluates a conditional expression (`test` and `[`).
#[derive(Parser)]
#[clap(disable_help_flag = true)]
pub(crate) struct TestCommand {
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Command for TestCommand {
    fn execute(
        &self,
        context: &mut ExecutionContext<'_, '_>,
    ) -> Result<ExitCode, error::Error> {
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        if args.last() == Some(&"]") {
            args.pop();
        }

        match eval_expr(&args) {
            Ok(true) => Ok(ExitCode::Success),
            Ok(false) => Ok(ExitCode::Custom(1)),
            Err(message) => {
                let _ = writeln!(context.stderr(), "test: {message}");
                Ok(ExitCode::InvalidUsage)
            }
        }
    }
}

fn eval_expr(args: &[&str]) -> Result<bool, String> {
    // -o binds loosest, then -a; both left-associative enough for the
    // simple expressions this dialect supports.
    if let Some(pos) = args.iter().position(|a| *a == "-o") {
        if pos > 0 && pos < args.len() - 1 {
            return Ok(eval_expr(&args[..pos])? || eval_expr(&args[pos + 1..])?);
        }
    }
    if let Some(pos) = args.iter().position(|a| *a == "-a") {
        if pos > 0 && pos < args.len() - 1 {
            return Ok(eval_expr(&args[..pos])? && eval_expr(&args[pos + 1..])?);
        }
    }

    match args {
        [] => Ok(false),
        [value] => Ok(!value.is_empty()),
        ["!", rest @ ..] => Ok(!eval_expr(rest)?),
        [op, operand] => apply_unary(op, operand),
        [left, op, right] => apply_binary(op, left, right),
        _ => Err(format!("unexpected expression: {}", args.join(" "))),
    }
}

fn apply_unary(op: &str, operand: &str) -> Result<bool, String> {
    let path = Path::new(operand);
    let result = match op {
        "-n" => !operand.is_empty(),
        "-z" => operand.is_empty(),
        "-e" => path.exists(),
        "-f" => path.is_file(),
        "-d" => path.is_dir(),
        "-s" => path.metadata().map(|m| m.len() > 0).unwrap_or(false),
        "-r" => nix::unistd::access(path, nix::unistd::AccessFlags::R_OK).is_ok(),
        "-w" => nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok(),
        "-x" => nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok(),
        "-t" => operand
            .parse::<i32>()
            .map(|fd| nix::unistd::isatty(fd).unwrap_or(false))
            .unwrap_or(false),
        _ => return Err(format!("{op}: unknown operator")),
    };
    Ok(result)
}

fn apply_binary(op: &str, left: &str, right: &str) -> Result<bool, String> {
    match op {
        "=" => return Ok(left == right),
        "!=" => return Ok(left != right),
        _ => (),
    }

    let parse = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| format!("{s}: integer expression expected"))
    };

    let result = match op {
        "-eq" => parse(left)? == parse(right)?,
        "-ne" => parse(left)? != parse(right)?,
        "-gt" => parse(left)? > parse(right)?,
        "-ge" => parse(left)? >= parse(right)?,
        "-lt" => parse(left)? < parse(right)?,
        "-le" => parse(left)? <= parse(right)?,
        _ => return Err(format!("{op}: unknown operator")),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(args: &[&str]) -> bool {
        eval_expr(args).unwrap()
    }

    #[test]
    fn string_tests() {
        assert!(!eval(&[]));
        assert!(eval(&["nonempty"]));
        assert!(!eval(&[""]));
        assert!(eval(&["-n", "x"]));
        assert!(eval(&["-z", ""]));
        assert!(eval(&["a", "=", "a"]));
        assert!(eval(&["a", "!=", "b"]));
        assert!(eval(&["!", "a", "=", "b"]));
    }

    #[test]
    fn numeric_tests() {
        assert!(eval(&["2", "-eq", "2"]));
        assert!(eval(&["1", "-lt", "2"]));
        assert!(eval(&["3", "-ge", "3"]));
        assert!(eval_expr(&["x", "-eq", "1"]).is_err());
    }

    #[test]
    fn connectives() {
        assert!(eval(&["a", "=", "a", "-a", "b", "=", "b"]));
        assert!(!eval(&["a", "=", "a", "-a", "b", "=", "c"]));
        assert!(eval(&["a", "=", "x", "-o", "b", "=", "b"]));
    }

    #[test]
    fn file_tests() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe");
        std::fs::write(&file, "data").unwrap();

        let file_str = file.to_str().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        assert!(eval(&["-e", file_str]));
        assert!(eval(&["-f", file_str]));
        assert!(eval(&["-s", file_str]));
        assert!(eval(&["-d", dir_str]));
        assert!(!eval(&["-f", dir_str]));
        assert!(!eval(&["-e", "/definitely/not/here"]));
    }
}
