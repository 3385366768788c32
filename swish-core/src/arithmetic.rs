//! Integer arithmetic evaluation for `$((...))`.
//!
//! Operates on signed 64-bit integers with C-like operator precedence.
//! Identifiers (with or without a leading `$`) resolve against the shell's
//! variables; unset names evaluate to zero.

use crate::shell::Shell;

/// Errors raised while evaluating an arithmetic expression.
#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    /// The expression could not be parsed.
    #[error("syntax error in expression: {0}")]
    SyntaxError(String),

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivideByZero,
}

/// Evaluates an arithmetic expression within the given shell.
pub fn eval(shell: &Shell, expr: &str) -> Result<i64, EvalError> {
    let mut parser = ExprParser {
        chars: expr.chars().collect(),
        offset: 0,
        shell,
    };
    let value = parser.parse_expr(0)?;
    parser.skip_spaces();
    if parser.offset < parser.chars.len() {
        return Err(EvalError::SyntaxError(expr.to_owned()));
    }
    Ok(value)
}

struct ExprParser<'a> {
    chars: Vec<char>,
    offset: usize,
    shell: &'a Shell,
}

// Binary operators by descending binding power.
const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["==", "!="],
    &["<=", ">=", "<", ">"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

impl ExprParser<'_> {
    fn skip_spaces(&mut self) {
        while self
            .chars
            .get(self.offset)
            .is_some_and(|c| c.is_whitespace())
        {
            self.offset += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn try_consume(&mut self, op: &str) -> bool {
        self.skip_spaces();
        let end = self.offset + op.len();
        if end <= self.chars.len()
            && self.chars[self.offset..end].iter().collect::<String>() == op
        {
            // Don't let `<` swallow the start of `<<` or `<=`.
            if (op == "<" || op == ">" || op == "|" || op == "&" || op == "=")
                && matches!(
                    self.chars.get(end),
                    Some('<') | Some('>') | Some('=') | Some('|') | Some('&')
                )
            {
                return false;
            }
            self.offset = end;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self, level: usize) -> Result<i64, EvalError> {
        if level >= BINARY_LEVELS.len() {
            return self.parse_unary();
        }

        let mut value = self.parse_expr(level + 1)?;
        'outer: loop {
            for op in BINARY_LEVELS[level] {
                if self.try_consume(op) {
                    let rhs = self.parse_expr(level + 1)?;
                    value = apply_binary(op, value, rhs)?;
                    continue 'outer;
                }
            }
            break;
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<i64, EvalError> {
        self.skip_spaces();
        match self.peek() {
            Some('-') => {
                self.offset += 1;
                Ok(self.parse_unary()?.wrapping_neg())
            }
            Some('+') => {
                self.offset += 1;
                self.parse_unary()
            }
            Some('!') => {
                self.offset += 1;
                Ok(i64::from(self.parse_unary()? == 0))
            }
            Some('~') => {
                self.offset += 1;
                Ok(!self.parse_unary()?)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<i64, EvalError> {
        self.skip_spaces();
        match self.peek() {
            Some('(') => {
                self.offset += 1;
                let value = self.parse_expr(0)?;
                self.skip_spaces();
                if self.peek() != Some(')') {
                    return Err(self.syntax_error());
                }
                self.offset += 1;
                Ok(value)
            }
            Some('$') => {
                self.offset += 1;
                if self.peek() == Some('{') {
                    self.offset += 1;
                    let name = self.parse_name()?;
                    if self.peek() != Some('}') {
                        return Err(self.syntax_error());
                    }
                    self.offset += 1;
                    Ok(self.lookup(&name))
                } else {
                    let name = self.parse_name()?;
                    Ok(self.lookup(&name))
                }
            }
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.parse_name()?;
                Ok(self.lookup(&name))
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn parse_name(&mut self) -> Result<String, EvalError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.offset += 1;
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.syntax_error());
        }
        Ok(name)
    }

    fn parse_number(&mut self) -> Result<i64, EvalError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                text.push(c);
                self.offset += 1;
            } else {
                break;
            }
        }

        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
        {
            i64::from_str_radix(hex, 16)
        } else if text.len() > 1 && text.starts_with('0') {
            i64::from_str_radix(&text[1..], 8)
        } else {
            text.parse()
        };

        parsed.map_err(|_| EvalError::SyntaxError(text))
    }

    fn lookup(&self, name: &str) -> i64 {
        self.shell
            .env
            .get_str(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    fn syntax_error(&self) -> EvalError {
        EvalError::SyntaxError(self.chars.iter().collect())
    }
}

fn apply_binary(op: &str, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    let value = match op {
        "||" => i64::from(lhs != 0 || rhs != 0),
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "<=" => i64::from(lhs <= rhs),
        ">=" => i64::from(lhs >= rhs),
        "<" => i64::from(lhs < rhs),
        ">" => i64::from(lhs > rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" => {
            if rhs == 0 {
                return Err(EvalError::DivideByZero);
            }
            lhs.wrapping_div(rhs)
        }
        "%" => {
            if rhs == 0 {
                return Err(EvalError::DivideByZero);
            }
            lhs.wrapping_rem(rhs)
        }
        _ => unreachable!("operator table is closed"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{CreateOptions, Shell};
    use pretty_assertions::assert_eq;

    fn test_shell() -> Shell {
        Shell::new(CreateOptions::default()).unwrap()
    }

    fn eval_str(shell: &Shell, s: &str) -> i64 {
        eval(shell, s).unwrap()
    }

    #[test]
    fn precedence_and_grouping() {
        let shell = test_shell();
        assert_eq!(eval_str(&shell, "1 + 2 * 3"), 7);
        assert_eq!(eval_str(&shell, "(1 + 2) * 3"), 9);
        assert_eq!(eval_str(&shell, "10 - 4 - 3"), 3);
        assert_eq!(eval_str(&shell, "2 << 3"), 16);
    }

    #[test]
    fn comparisons_and_logic() {
        let shell = test_shell();
        assert_eq!(eval_str(&shell, "1 < 2"), 1);
        assert_eq!(eval_str(&shell, "2 <= 1"), 0);
        assert_eq!(eval_str(&shell, "1 && 0"), 0);
        assert_eq!(eval_str(&shell, "1 || 0"), 1);
        assert_eq!(eval_str(&shell, "!5"), 0);
    }

    #[test]
    fn variables_resolve_with_and_without_dollar() {
        let mut shell = test_shell();
        shell.env.set("i", "41", false);
        assert_eq!(eval_str(&shell, "i + 1"), 42);
        assert_eq!(eval_str(&shell, "$i + 1"), 42);
        assert_eq!(eval_str(&shell, "${i} + 1"), 42);
        assert_eq!(eval_str(&shell, "missing + 1"), 1);
    }

    #[test]
    fn number_bases() {
        let shell = test_shell();
        assert_eq!(eval_str(&shell, "0x10"), 16);
        assert_eq!(eval_str(&shell, "010"), 8);
        assert_eq!(eval_str(&shell, "0"), 0);
    }

    #[test]
    fn division_by_zero_is_reported() {
        let shell = test_shell();
        assert!(matches!(eval(&shell, "1 / 0"), Err(EvalError::DivideByZero)));
        assert!(matches!(eval(&shell, "1 % 0"), Err(EvalError::DivideByZero)));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let shell = test_shell();
        assert!(eval(&shell, "1 +").is_err());
        assert!(eval(&shell, "(1").is_err());
        assert!(eval(&shell, "").is_err());
    }
}
