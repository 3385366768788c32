//! Word expansion.
//!
//! Words arrive from the parser with quoting and expansion syntax intact.
//! Expansion interprets that syntax: tilde, parameter and special-parameter
//! expansion, command substitution, arithmetic, quote removal, field
//! splitting, and pathname globbing. Characters that were quoted are
//! tracked so splitting and globbing only apply where they should.

use crate::arithmetic;
use crate::error;
use crate::interp::{self, ExecutionParameters};
use crate::patterns;
use crate::shell::Shell;
use swish_parser::ast;

// A fragment of an expanded word. `quoted` text is immune to field
// splitting and globbing; `splittable` marks expansion results subject to
// splitting; `params_at` marks a quoted `$@`, which produces one field per
// positional parameter.
#[derive(Debug)]
struct Piece {
    text: String,
    quoted: bool,
    splittable: bool,
    params_at: bool,
}

impl Piece {
    fn literal(text: impl Into<String>, quoted: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
            splittable: false,
            params_at: false,
        }
    }

    fn expanded(text: impl Into<String>, quoted: bool) -> Self {
        Self {
            text: text.into(),
            quoted,
            splittable: !quoted,
            params_at: false,
        }
    }
}

/// Expands a word fully: all expansions, quote removal, field splitting,
/// and (unless disabled) pathname globbing. Returns the resulting fields in
/// order.
pub(crate) fn expand_word_fields(
    shell: &mut Shell,
    params: &ExecutionParameters,
    word: &ast::Word,
) -> Result<Vec<String>, error::Error> {
    let pieces = scan_word(shell, params, &word.value)?;
    let ifs = shell
        .env
        .get_str("IFS")
        .unwrap_or(" \t\n")
        .to_owned();

    let split = split_fields(shell, pieces, &ifs);

    if shell.options.disable_filename_globbing {
        return Ok(split.into_iter().map(|f| patterns::unescape(&f)).collect());
    }

    let mut fields = vec![];
    for field in split {
        if patterns::is_pattern(&field) {
            match patterns::expand_glob(&shell.working_dir, &field)? {
                Some(mut matches) => fields.append(&mut matches),
                None => fields.push(patterns::unescape(&field)),
            }
        } else {
            fields.push(patterns::unescape(&field));
        }
    }

    Ok(fields)
}

/// Expands a word to a single string: all expansions and quote removal, but
/// no field splitting or globbing. Used for assignments, redirection
/// targets, and `case` subjects.
pub(crate) fn expand_word_single(
    shell: &mut Shell,
    params: &ExecutionParameters,
    word: &ast::Word,
) -> Result<String, error::Error> {
    let pieces = scan_word(shell, params, &word.value)?;
    let mut result = String::new();
    for piece in pieces {
        if piece.params_at {
            result.push_str(&shell.positional_parameters.join(" "));
        } else {
            result.push_str(&piece.text);
        }
    }
    Ok(result)
}

/// Expands a word for use as a pattern: like [`expand_word_single`], except
/// quoted characters come back escaped so the pattern matcher treats them
/// literally.
pub(crate) fn expand_word_pattern(
    shell: &mut Shell,
    params: &ExecutionParameters,
    word: &ast::Word,
) -> Result<String, error::Error> {
    let pieces = scan_word(shell, params, &word.value)?;
    let mut result = String::new();
    for piece in pieces {
        if piece.params_at {
            result.push_str(&escape_for_pattern(
                &shell.positional_parameters.join(" "),
            ));
        } else if piece.quoted {
            result.push_str(&escape_for_pattern(&piece.text));
        } else {
            result.push_str(&piece.text);
        }
    }
    Ok(result)
}

/// Expands a here-document body: `$`-expansions and backquotes only.
/// Quote characters are ordinary text.
pub(crate) fn expand_heredoc(
    shell: &mut Shell,
    params: &ExecutionParameters,
    text: &str,
) -> Result<String, error::Error> {
    let mut expander = Expander {
        shell,
        params,
        chars: text.chars().collect(),
        offset: 0,
    };

    let mut result = String::new();
    while let Some(c) = expander.next_char() {
        match c {
            '\\' => match expander.peek() {
                Some(next @ ('$' | '`' | '\\')) => {
                    expander.offset += 1;
                    result.push(next);
                }
                _ => result.push('\\'),
            },
            '$' => {
                let mut pieces = vec![];
                expander.parse_dollar(true, &mut pieces)?;
                for piece in pieces {
                    result.push_str(&piece.text);
                }
            }
            '`' => {
                let piece = expander.parse_backquoted(true)?;
                result.push_str(&piece.text);
            }
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn escape_for_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Assembles pieces into fields. Quoted text is escaped so a later glob pass
// treats it literally; every returned field is therefore in "pattern form"
// and needs `patterns::unescape` once globbing is done with it.
fn split_fields(shell: &Shell, pieces: Vec<Piece>, ifs: &str) -> Vec<String> {
    let mut fields: Vec<String> = vec![];
    let mut current = String::new();
    let mut field_active = false;

    for piece in pieces {
        if piece.params_at {
            for (i, param) in shell.positional_parameters.iter().enumerate() {
                if i > 0 {
                    fields.push(std::mem::take(&mut current));
                }
                current.push_str(&escape_for_pattern(param));
                field_active = true;
            }
            continue;
        }

        if piece.quoted {
            current.push_str(&escape_for_pattern(&piece.text));
            field_active = true;
        } else if piece.splittable {
            for c in piece.text.chars() {
                if ifs.contains(c) {
                    if field_active {
                        fields.push(std::mem::take(&mut current));
                        field_active = false;
                    }
                } else {
                    current.push(c);
                    field_active = true;
                }
            }
        } else {
            current.push_str(&piece.text);
            field_active = true;
        }
    }

    if field_active {
        fields.push(current);
    }

    fields
}

fn scan_word(
    shell: &mut Shell,
    params: &ExecutionParameters,
    text: &str,
) -> Result<Vec<Piece>, error::Error> {
    let mut expander = Expander {
        shell,
        params,
        chars: text.chars().collect(),
        offset: 0,
    };
    expander.scan()
}

struct Expander<'a, 'b> {
    shell: &'a mut Shell,
    params: &'b ExecutionParameters,
    chars: Vec<char>,
    offset: usize,
}

impl Expander<'_, '_> {
    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.get(self.offset).copied();
        if c.is_some() {
            self.offset += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn scan(&mut self) -> Result<Vec<Piece>, error::Error> {
        let mut pieces = vec![];

        // Tilde expansion applies only at the very start of the word.
        if self.peek() == Some('~') {
            let rest_starts_path = matches!(self.chars.get(1), None | Some('/'));
            if rest_starts_path {
                if let Some(home) = self.shell.env.get_str("HOME") {
                    let home = home.to_owned();
                    self.offset += 1;
                    pieces.push(Piece::literal(home, false));
                }
            }
        }

        while let Some(c) = self.next_char() {
            match c {
                '\'' => {
                    let mut text = String::new();
                    loop {
                        match self.next_char() {
                            Some('\'') | None => break,
                            Some(inner) => text.push(inner),
                        }
                    }
                    pieces.push(Piece::literal(text, true));
                }
                '"' => self.scan_double_quoted(&mut pieces)?,
                '\\' => match self.next_char() {
                    Some(escaped) => pieces.push(Piece::literal(escaped.to_string(), true)),
                    None => pieces.push(Piece::literal("\\", false)),
                },
                '$' => self.parse_dollar(false, &mut pieces)?,
                '`' => {
                    let piece = self.parse_backquoted(false)?;
                    pieces.push(piece);
                }
                _ => {
                    let mut text = String::new();
                    text.push(c);
                    while let Some(next) = self.peek() {
                        if matches!(next, '\'' | '"' | '\\' | '$' | '`') {
                            break;
                        }
                        text.push(next);
                        self.offset += 1;
                    }
                    pieces.push(Piece::literal(text, false));
                }
            }
        }

        Ok(pieces)
    }

    fn scan_double_quoted(&mut self, pieces: &mut Vec<Piece>) -> Result<(), error::Error> {
        // An empty quoted string still produces a (possibly empty) field.
        if self.peek() == Some('"') {
            self.offset += 1;
            pieces.push(Piece::literal("", true));
            return Ok(());
        }

        loop {
            match self.next_char() {
                Some('"') | None => break,
                Some('\\') => match self.next_char() {
                    Some(next @ ('$' | '`' | '"' | '\\')) => {
                        pieces.push(Piece::literal(next.to_string(), true));
                    }
                    Some(next) => {
                        pieces.push(Piece::literal(format!("\\{next}"), true));
                    }
                    None => pieces.push(Piece::literal("\\", true)),
                },
                Some('$') => self.parse_dollar(true, pieces)?,
                Some('`') => {
                    let piece = self.parse_backquoted(true)?;
                    pieces.push(piece);
                }
                Some(c) => {
                    let mut text = String::new();
                    text.push(c);
                    while let Some(next) = self.peek() {
                        if matches!(next, '"' | '\\' | '$' | '`') {
                            break;
                        }
                        text.push(next);
                        self.offset += 1;
                    }
                    pieces.push(Piece::literal(text, true));
                }
            }
        }

        Ok(())
    }

    fn parse_dollar(
        &mut self,
        in_quotes: bool,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), error::Error> {
        match self.peek() {
            Some('(') => {
                self.offset += 1;
                if self.peek() == Some('(') {
                    self.offset += 1;
                    let expr = self.extract_arithmetic()?;
                    let value = arithmetic::eval(self.shell, &expr)?;
                    pieces.push(Piece::expanded(value.to_string(), in_quotes));
                } else {
                    let cmd = self.extract_balanced_parens()?;
                    let output = self.run_command_substitution(&cmd)?;
                    pieces.push(Piece::expanded(output, in_quotes));
                }
            }
            Some('{') => {
                self.offset += 1;
                let inner = self.extract_braced()?;
                self.expand_braced_parameter(&inner, in_quotes, pieces)?;
            }
            Some('@') => {
                self.offset += 1;
                if in_quotes {
                    pieces.push(Piece {
                        text: String::new(),
                        quoted: true,
                        splittable: false,
                        params_at: true,
                    });
                } else {
                    let joined = self.shell.positional_parameters.join(" ");
                    pieces.push(Piece::expanded(joined, false));
                }
            }
            Some('*') => {
                self.offset += 1;
                let joined = self.shell.positional_parameters.join(" ");
                pieces.push(Piece::expanded(joined, in_quotes));
            }
            Some(c) if c.is_ascii_digit() => {
                self.offset += 1;
                let value = self.positional(c.to_digit(10).unwrap_or(0) as usize);
                pieces.push(Piece::expanded(value, in_quotes));
            }
            Some(c) if is_special_param(c) => {
                self.offset += 1;
                let value = self.special_param(c);
                pieces.push(Piece::expanded(value, in_quotes));
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.extract_name();
                let value = self.lookup_checked(&name)?;
                pieces.push(Piece::expanded(value, in_quotes));
            }
            _ => pieces.push(Piece::literal("$", in_quotes)),
        }

        Ok(())
    }

    fn extract_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.offset += 1;
            } else {
                break;
            }
        }
        name
    }

    fn extract_arithmetic(&mut self) -> Result<String, error::Error> {
        let mut depth = 2u32;
        let mut expr = String::new();
        while let Some(c) = self.next_char() {
            match c {
                '(' => {
                    depth += 1;
                    expr.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        // Trim the inner closing paren captured just before.
                        if expr.ends_with(')') {
                            expr.pop();
                        }
                        return Ok(expr);
                    }
                    expr.push(c);
                }
                _ => expr.push(c),
            }
        }
        Err(error::Error::BadSubstitution(expr))
    }

    fn extract_balanced_parens(&mut self) -> Result<String, error::Error> {
        let mut depth = 1u32;
        let mut text = String::new();
        while let Some(c) = self.next_char() {
            match c {
                '(' => {
                    depth += 1;
                    text.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                    text.push(c);
                }
                _ => text.push(c),
            }
        }
        Err(error::Error::BadSubstitution(text))
    }

    fn extract_braced(&mut self) -> Result<String, error::Error> {
        let mut depth = 1u32;
        let mut text = String::new();
        while let Some(c) = self.next_char() {
            match c {
                '{' => {
                    depth += 1;
                    text.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                    text.push(c);
                }
                _ => text.push(c),
            }
        }
        Err(error::Error::BadSubstitution(text))
    }

    fn parse_backquoted(&mut self, in_quotes: bool) -> Result<Piece, error::Error> {
        let mut cmd = String::new();
        loop {
            match self.next_char() {
                Some('`') | None => break,
                Some('\\') => match self.next_char() {
                    Some(next @ ('$' | '`' | '\\')) => cmd.push(next),
                    Some(next) => {
                        cmd.push('\\');
                        cmd.push(next);
                    }
                    None => cmd.push('\\'),
                },
                Some(c) => cmd.push(c),
            }
        }

        let output = self.run_command_substitution(&cmd)?;
        Ok(Piece::expanded(output, in_quotes))
    }

    fn run_command_substitution(&mut self, cmd: &str) -> Result<String, error::Error> {
        let output = interp::eval_back_cmd(self.shell, self.params, cmd)?;
        let mut text = String::from_utf8_lossy(&output).into_owned();
        while text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }

    // `${name}`, `${#name}`, and the `:-` `-` `:=` `=` `:+` `+` `:?` `?`
    // forms.
    fn expand_braced_parameter(
        &mut self,
        inner: &str,
        in_quotes: bool,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), error::Error> {
        if let Some(name) = inner.strip_prefix('#') {
            // ${#name}: length of value. ${#} alone is the parameter count.
            let value = if name.is_empty() {
                self.shell.positional_parameters.len().to_string()
            } else {
                self.raw_lookup(name).unwrap_or_default().chars().count().to_string()
            };
            pieces.push(Piece::expanded(value, in_quotes));
            return Ok(());
        }

        // Split into name, operator, and word.
        let name_end = inner
            .char_indices()
            .find(|(i, c)| {
                if *i == 0 {
                    !(c.is_ascii_alphanumeric() || *c == '_' || is_special_param(*c) || c.is_ascii_digit())
                } else {
                    !(c.is_ascii_alphanumeric() || *c == '_')
                }
            })
            .map(|(i, _)| i)
            .unwrap_or(inner.len());

        let name = &inner[..name_end];
        let rest = &inner[name_end..];

        if name.is_empty() {
            return Err(error::Error::BadSubstitution(inner.to_owned()));
        }

        if rest.is_empty() {
            let value = self.lookup_checked(name)?;
            pieces.push(Piece::expanded(value, in_quotes));
            return Ok(());
        }

        let (colon, op_rest) = match rest.strip_prefix(':') {
            Some(stripped) => (true, stripped),
            None => (false, rest),
        };
        let Some(op) = op_rest.chars().next() else {
            return Err(error::Error::BadSubstitution(inner.to_owned()));
        };
        if !matches!(op, '-' | '=' | '+' | '?') {
            return Err(error::Error::BadSubstitution(inner.to_owned()));
        }
        let word = &op_rest[op.len_utf8()..];

        let value = self.raw_lookup(name);
        let use_word = match (&value, colon) {
            (None, _) => true,
            (Some(v), true) => v.is_empty(),
            (Some(_), false) => false,
        };

        match op {
            '-' => {
                if use_word {
                    let expanded = self.expand_subword(word)?;
                    pieces.push(Piece::expanded(expanded, in_quotes));
                } else {
                    pieces.push(Piece::expanded(value.unwrap_or_default(), in_quotes));
                }
            }
            '=' => {
                if use_word {
                    let expanded = self.expand_subword(word)?;
                    self.shell.assign_variable(name, &expanded, false);
                    pieces.push(Piece::expanded(expanded, in_quotes));
                } else {
                    pieces.push(Piece::expanded(value.unwrap_or_default(), in_quotes));
                }
            }
            '+' => {
                if use_word {
                    pieces.push(Piece::expanded("", in_quotes));
                } else {
                    let expanded = self.expand_subword(word)?;
                    pieces.push(Piece::expanded(expanded, in_quotes));
                }
            }
            '?' => {
                if use_word {
                    let message = if word.is_empty() {
                        "parameter null or not set".to_owned()
                    } else {
                        self.expand_subword(word)?
                    };
                    return Err(error::Error::ParameterNullOrUnset(
                        name.to_owned(),
                        message,
                    ));
                }
                pieces.push(Piece::expanded(value.unwrap_or_default(), in_quotes));
            }
            _ => unreachable!("operator set is closed"),
        }

        Ok(())
    }

    // Expands the word part of a braced-parameter form to a single string.
    fn expand_subword(&mut self, word: &str) -> Result<String, error::Error> {
        expand_word_single(
            self.shell,
            self.params,
            &ast::Word::new(word),
        )
    }

    fn positional(&self, n: usize) -> String {
        if n == 0 {
            return self.shell.shell_name.clone();
        }
        self.shell
            .positional_parameters
            .get(n - 1)
            .cloned()
            .unwrap_or_default()
    }

    fn special_param(&self, c: char) -> String {
        match c {
            '?' => self.shell.last_exit_status.to_string(),
            '#' => self.shell.positional_parameters.len().to_string(),
            '$' => std::process::id().to_string(),
            '!' => self
                .shell
                .jobs
                .last_async_pid
                .map(|p| p.as_raw().to_string())
                .unwrap_or_default(),
            '-' => self.shell.options.enabled_letters(),
            _ => String::new(),
        }
    }

    fn raw_lookup(&self, name: &str) -> Option<String> {
        if name.len() == 1 {
            let c = name.chars().next().unwrap_or('\0');
            if is_special_param(c) {
                return Some(self.special_param(c));
            }
        }
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = name.parse::<usize>() {
                return Some(self.positional(n));
            }
        }
        self.shell.env.get_str(name).map(str::to_owned)
    }

    fn lookup_checked(&self, name: &str) -> Result<String, error::Error> {
        match self.raw_lookup(name) {
            Some(value) => Ok(value),
            None => {
                if self.shell.options.treat_unset_variables_as_error {
                    Err(error::Error::UnsetVariable(name.to_owned()))
                } else {
                    Ok(String::new())
                }
            }
        }
    }
}

fn is_special_param(c: char) -> bool {
    matches!(c, '?' | '#' | '$' | '!' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{CreateOptions, Shell};
    use pretty_assertions::assert_eq;

    fn test_shell() -> Shell {
        Shell::new(CreateOptions::default()).unwrap()
    }

    fn fields(shell: &mut Shell, text: &str) -> Vec<String> {
        let params = ExecutionParameters::default();
        expand_word_fields(shell, &params, &ast::Word::new(text)).unwrap()
    }

    fn single(shell: &mut Shell, text: &str) -> String {
        let params = ExecutionParameters::default();
        expand_word_single(shell, &params, &ast::Word::new(text)).unwrap()
    }

    #[test]
    fn plain_words_pass_through() {
        let mut shell = test_shell();
        assert_eq!(fields(&mut shell, "hello"), vec!["hello"]);
    }

    #[test]
    fn quote_removal() {
        let mut shell = test_shell();
        assert_eq!(fields(&mut shell, "'a b'"), vec!["a b"]);
        assert_eq!(fields(&mut shell, "\"a b\""), vec!["a b"]);
        assert_eq!(fields(&mut shell, "a\\ b"), vec!["a b"]);
        assert_eq!(fields(&mut shell, "''"), vec![""]);
    }

    #[test]
    fn variable_expansion_and_splitting() {
        let mut shell = test_shell();
        shell.env.set("x", "one two", false);
        assert_eq!(fields(&mut shell, "$x"), vec!["one", "two"]);
        assert_eq!(fields(&mut shell, "\"$x\""), vec!["one two"]);
        assert_eq!(fields(&mut shell, "${x}"), vec!["one", "two"]);
        assert_eq!(single(&mut shell, "$x"), "one two");
    }

    #[test]
    fn unset_variables_expand_empty() {
        let mut shell = test_shell();
        assert_eq!(fields(&mut shell, "a${missing}b"), vec!["ab"]);
        // An unquoted expansion of nothing yields no field at all.
        assert!(fields(&mut shell, "$missing").is_empty());
    }

    #[test]
    fn unset_variables_error_under_nounset() {
        let mut shell = test_shell();
        shell.options.treat_unset_variables_as_error = true;
        let params = ExecutionParameters::default();
        assert!(
            expand_word_fields(&mut shell, &params, &ast::Word::new("$missing")).is_err()
        );
    }

    #[test]
    fn default_value_forms() {
        let mut shell = test_shell();
        shell.env.set("set_var", "value", false);
        shell.env.set("null_var", "", false);

        assert_eq!(fields(&mut shell, "${missing:-fallback}"), vec!["fallback"]);
        assert_eq!(fields(&mut shell, "${null_var:-fallback}"), vec!["fallback"]);
        assert!(fields(&mut shell, "${null_var-fallback}").is_empty());
        assert_eq!(fields(&mut shell, "${set_var:-fallback}"), vec!["value"]);
        assert_eq!(fields(&mut shell, "${set_var:+alternate}"), vec!["alternate"]);

        assert_eq!(fields(&mut shell, "${assigned:=default}"), vec!["default"]);
        assert_eq!(shell.env.get_str("assigned"), Some("default"));

        let params = ExecutionParameters::default();
        assert!(expand_word_fields(
            &mut shell,
            &params,
            &ast::Word::new("${missing:?no such}")
        )
        .is_err());
    }

    #[test]
    fn special_parameters() {
        let mut shell = test_shell();
        shell.last_exit_status = 7;
        shell.positional_parameters = vec!["a".into(), "b c".into()];

        assert_eq!(fields(&mut shell, "$?"), vec!["7"]);
        assert_eq!(fields(&mut shell, "$#"), vec!["2"]);
        assert_eq!(fields(&mut shell, "$1"), vec!["a"]);
        assert_eq!(fields(&mut shell, "$2"), vec!["b", "c"]);
        assert_eq!(fields(&mut shell, "\"$2\""), vec!["b c"]);
        assert_eq!(fields(&mut shell, "${#}"), vec!["2"]);
        assert_eq!(fields(&mut shell, "${#1}"), vec!["1"]);
    }

    #[test]
    fn at_parameter_field_behavior() {
        let mut shell = test_shell();
        shell.positional_parameters = vec!["one".into(), "two words".into()];

        assert_eq!(fields(&mut shell, "\"$@\""), vec!["one", "two words"]);
        assert_eq!(fields(&mut shell, "$@"), vec!["one", "two", "words"]);
        assert_eq!(fields(&mut shell, "$*"), vec!["one", "two", "words"]);
        assert_eq!(fields(&mut shell, "\"$*\""), vec!["one two words"]);
    }

    #[test]
    fn arithmetic_expansion() {
        let mut shell = test_shell();
        shell.env.set("i", "1", false);
        assert_eq!(fields(&mut shell, "$((i+1))"), vec!["2"]);
        assert_eq!(fields(&mut shell, "$((2*21))"), vec!["42"]);
    }

    #[test]
    fn tilde_expansion_at_word_start() {
        let mut shell = test_shell();
        shell.env.set("HOME", "/home/tester", false);
        assert_eq!(fields(&mut shell, "~"), vec!["/home/tester"]);
        assert_eq!(fields(&mut shell, "~/docs"), vec!["/home/tester/docs"]);
        assert_eq!(fields(&mut shell, "a~b"), vec!["a~b"]);
    }

    #[test]
    fn quoted_metacharacters_do_not_glob() {
        let mut shell = test_shell();
        // No matching files, so both stay literal; the quoted one must not
        // even be treated as a pattern.
        assert_eq!(
            fields(&mut shell, "'zz*zz'"),
            vec!["zz*zz"]
        );
        assert_eq!(fields(&mut shell, "zz*zz"), vec!["zz*zz"]);
    }

    #[test]
    fn heredoc_expansion_keeps_quotes_literal() {
        let mut shell = test_shell();
        shell.env.set("x", "val", false);
        let params = ExecutionParameters::default();
        let expanded =
            expand_heredoc(&mut shell, &params, "say \"$x\" 'raw'\n").unwrap();
        assert_eq!(expanded, "say \"val\" 'raw'\n");
    }
}
