//! Hand-written tokenizer for the `sh` command language.
//!
//! Words are emitted with their quoting and expansion syntax intact; the
//! tokenizer only needs to understand quoting well enough to find word
//! boundaries. Here-document bodies are collected when the newline ending
//! their introducing line is reached, and handed to the parser afterwards.

use std::collections::VecDeque;

use crate::error::ParseError;
use crate::source::SourcePosition;
use crate::ByteStream;

/// A token produced by the tokenizer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    /// A word, with quoting and expansion syntax preserved.
    Word {
        /// The raw text of the word.
        text: String,
        /// Whether any part of the word was quoted.
        quoted: bool,
    },
    /// A small decimal number immediately preceding `<` or `>`.
    IoNumber(u32),
    /// An operator.
    Operator(Operator),
    /// An unquoted newline.
    Newline,
    /// End of input.
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word { text, .. } => write!(f, "{text}"),
            Self::IoNumber(n) => write!(f, "{n}"),
            Self::Operator(op) => write!(f, "{op}"),
            Self::Newline => write!(f, "newline"),
            Self::Eof => write!(f, "end of file"),
        }
    }
}

/// The operators recognized by the tokenizer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
    /// `;`
    Semi,
    /// `;;`
    SemiSemi,
    /// `&`
    And,
    /// `&&`
    AndIf,
    /// `|`
    Pipe,
    /// `||`
    OrIf,
    /// `<`
    Less,
    /// `>`
    Great,
    /// `>>`
    DoubleGreat,
    /// `<&`
    LessAnd,
    /// `>&`
    GreatAnd,
    /// `<<`
    DoubleLess,
    /// `<<-`
    DoubleLessDash,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Semi => ";",
            Self::SemiSemi => ";;",
            Self::And => "&",
            Self::AndIf => "&&",
            Self::Pipe => "|",
            Self::OrIf => "||",
            Self::Less => "<",
            Self::Great => ">",
            Self::DoubleGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::DoubleLess => "<<",
            Self::DoubleLessDash => "<<-",
            Self::LParen => "(",
            Self::RParen => ")",
        };
        write!(f, "{s}")
    }
}

struct PendingHereDoc {
    delimiter: String,
    remove_tabs: bool,
}

/// Tokenizes shell input pulled from a [`ByteStream`].
pub struct Tokenizer<'a, S: ByteStream> {
    source: &'a mut S,
    peeked: Option<u8>,
    // Set after `<<`/`<<-`; the next word token is a here-doc delimiter.
    heredoc_delim_next: Option<bool>,
    pending_heredocs: Vec<PendingHereDoc>,
    completed_heredocs: VecDeque<String>,
}

impl<'a, S: ByteStream> Tokenizer<'a, S> {
    /// Returns a new tokenizer reading from the given stream.
    pub fn new(source: &'a mut S) -> Self {
        Self {
            source,
            peeked: None,
            heredoc_delim_next: None,
            pending_heredocs: vec![],
            completed_heredocs: VecDeque::new(),
        }
    }

    /// Returns the current source position.
    pub fn position(&self) -> SourcePosition {
        SourcePosition {
            line: self.source.line_number(),
        }
    }

    /// Removes and returns the here-document bodies collected so far, in the
    /// order their redirections appeared in the input.
    pub fn take_heredoc_bodies(&mut self) -> VecDeque<String> {
        std::mem::take(&mut self.completed_heredocs)
    }

    fn getb(&mut self) -> Result<Option<u8>, ParseError> {
        if let Some(b) = self.peeked.take() {
            return Ok(Some(b));
        }
        Ok(self.source.next_byte()?)
    }

    fn ungetb(&mut self, b: u8) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(b);
    }

    fn unexpected_eof(&self) -> ParseError {
        ParseError::UnexpectedEndOfInput {
            position: self.position(),
        }
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            let b = match self.getb()? {
                Some(b) => b,
                None => return Ok(Token::Eof),
            };

            match b {
                b' ' | b'\t' => continue,
                b'\\' => {
                    // A backslash-newline pair between tokens disappears.
                    match self.getb()? {
                        Some(b'\n') => continue,
                        Some(other) => {
                            self.ungetb(other);
                            return self.scan_word(b'\\');
                        }
                        None => return self.scan_word(b'\\'),
                    }
                }
                b'#' => {
                    // Comment through end of line.
                    loop {
                        match self.getb()? {
                            Some(b'\n') => {
                                self.ungetb(b'\n');
                                break;
                            }
                            Some(_) => continue,
                            None => break,
                        }
                    }
                }
                b'\n' => {
                    self.collect_heredoc_bodies()?;
                    return Ok(Token::Newline);
                }
                b';' => {
                    return Ok(Token::Operator(match self.getb()? {
                        Some(b';') => Operator::SemiSemi,
                        other => {
                            if let Some(other) = other {
                                self.ungetb(other);
                            }
                            Operator::Semi
                        }
                    }));
                }
                b'&' => {
                    return Ok(Token::Operator(match self.getb()? {
                        Some(b'&') => Operator::AndIf,
                        other => {
                            if let Some(other) = other {
                                self.ungetb(other);
                            }
                            Operator::And
                        }
                    }));
                }
                b'|' => {
                    return Ok(Token::Operator(match self.getb()? {
                        Some(b'|') => Operator::OrIf,
                        other => {
                            if let Some(other) = other {
                                self.ungetb(other);
                            }
                            Operator::Pipe
                        }
                    }));
                }
                b'<' => {
                    let op = match self.getb()? {
                        Some(b'<') => match self.getb()? {
                            Some(b'-') => Operator::DoubleLessDash,
                            other => {
                                if let Some(other) = other {
                                    self.ungetb(other);
                                }
                                Operator::DoubleLess
                            }
                        },
                        Some(b'&') => Operator::LessAnd,
                        other => {
                            if let Some(other) = other {
                                self.ungetb(other);
                            }
                            Operator::Less
                        }
                    };

                    if matches!(op, Operator::DoubleLess | Operator::DoubleLessDash) {
                        self.heredoc_delim_next =
                            Some(matches!(op, Operator::DoubleLessDash));
                    }

                    return Ok(Token::Operator(op));
                }
                b'>' => {
                    return Ok(Token::Operator(match self.getb()? {
                        Some(b'>') => Operator::DoubleGreat,
                        Some(b'&') => Operator::GreatAnd,
                        other => {
                            if let Some(other) = other {
                                self.ungetb(other);
                            }
                            Operator::Great
                        }
                    }));
                }
                b'(' => return Ok(Token::Operator(Operator::LParen)),
                b')' => return Ok(Token::Operator(Operator::RParen)),
                _ => return self.scan_word(b),
            }
        }
    }

    fn scan_word(&mut self, first: u8) -> Result<Token, ParseError> {
        let mut text: Vec<u8> = vec![];
        let mut quoted = false;
        let mut b = Some(first);

        loop {
            let c = match b {
                Some(c) => c,
                None => break,
            };

            match c {
                b' ' | b'\t' | b'\n' | b';' | b'&' | b'|' | b'<' | b'>' | b'(' | b')' => {
                    self.ungetb(c);
                    break;
                }
                b'\'' => {
                    quoted = true;
                    text.push(c);
                    self.scan_single_quoted(&mut text)?;
                }
                b'"' => {
                    quoted = true;
                    text.push(c);
                    self.scan_double_quoted(&mut text)?;
                }
                b'\\' => match self.getb()? {
                    Some(b'\n') => (), // line continuation
                    Some(escaped) => {
                        quoted = true;
                        text.push(c);
                        text.push(escaped);
                    }
                    None => text.push(c),
                },
                b'$' => {
                    text.push(c);
                    self.scan_dollar(&mut text)?;
                }
                b'`' => {
                    text.push(c);
                    self.scan_backquoted(&mut text)?;
                }
                _ => text.push(c),
            }

            b = self.getb()?;
        }

        if let Some(remove_tabs) = self.heredoc_delim_next.take() {
            self.pending_heredocs.push(PendingHereDoc {
                delimiter: strip_quotes(std::str::from_utf8(&text).unwrap_or_default()),
                remove_tabs,
            });
        }

        // A bare number immediately preceding a redirection operator is an
        // fd prefix rather than an argument.
        if !quoted && !text.is_empty() && text.iter().all(u8::is_ascii_digit) {
            if let Some(next) = self.getb()? {
                self.ungetb(next);
                if next == b'<' || next == b'>' {
                    if let Ok(n) = std::str::from_utf8(&text).unwrap_or_default().parse() {
                        return Ok(Token::IoNumber(n));
                    }
                }
            }
        }

        Ok(Token::Word {
            text: String::from_utf8_lossy(&text).into_owned(),
            quoted,
        })
    }

    fn scan_single_quoted(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        loop {
            match self.getb()? {
                Some(b'\'') => {
                    out.push(b'\'');
                    return Ok(());
                }
                Some(c) => out.push(c),
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    fn scan_double_quoted(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        loop {
            match self.getb()? {
                Some(b'"') => {
                    out.push(b'"');
                    return Ok(());
                }
                Some(b'\\') => {
                    out.push(b'\\');
                    match self.getb()? {
                        Some(c) => out.push(c),
                        None => return Err(self.unexpected_eof()),
                    }
                }
                Some(b'$') => {
                    out.push(b'$');
                    self.scan_dollar(out)?;
                }
                Some(b'`') => {
                    out.push(b'`');
                    self.scan_backquoted(out)?;
                }
                Some(c) => out.push(c),
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    fn scan_backquoted(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        loop {
            match self.getb()? {
                Some(b'`') => {
                    out.push(b'`');
                    return Ok(());
                }
                Some(b'\\') => {
                    out.push(b'\\');
                    match self.getb()? {
                        Some(c) => out.push(c),
                        None => return Err(self.unexpected_eof()),
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    // Captures the remainder of a `$`-introduced construct. Plain `$name`
    // needs no help; `$(...)`, `$((...))`, and `${...}` are captured through
    // their closing delimiters so embedded operators don't end the word.
    fn scan_dollar(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        match self.getb()? {
            Some(b'(') => {
                out.push(b'(');
                match self.getb()? {
                    Some(b'(') => {
                        out.push(b'(');
                        self.scan_arithmetic(out)
                    }
                    Some(other) => {
                        self.ungetb(other);
                        self.scan_command_substitution(out)
                    }
                    None => Err(self.unexpected_eof()),
                }
            }
            Some(b'{') => {
                out.push(b'{');
                self.scan_braced_parameter(out)
            }
            Some(other) => {
                self.ungetb(other);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn scan_arithmetic(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        let mut depth = 2u32;
        loop {
            match self.getb()? {
                Some(b'(') => {
                    depth += 1;
                    out.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    out.push(b')');
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    fn scan_command_substitution(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        let mut depth = 1u32;
        loop {
            match self.getb()? {
                Some(b'(') => {
                    depth += 1;
                    out.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    out.push(b')');
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(b'\'') => {
                    out.push(b'\'');
                    self.scan_single_quoted(out)?;
                }
                Some(b'"') => {
                    out.push(b'"');
                    self.scan_double_quoted(out)?;
                }
                Some(b'`') => {
                    out.push(b'`');
                    self.scan_backquoted(out)?;
                }
                Some(b'\\') => {
                    out.push(b'\\');
                    match self.getb()? {
                        Some(c) => out.push(c),
                        None => return Err(self.unexpected_eof()),
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    fn scan_braced_parameter(&mut self, out: &mut Vec<u8>) -> Result<(), ParseError> {
        loop {
            match self.getb()? {
                Some(b'}') => {
                    out.push(b'}');
                    return Ok(());
                }
                Some(b'$') => {
                    out.push(b'$');
                    self.scan_dollar(out)?;
                }
                Some(b'\'') => {
                    out.push(b'\'');
                    self.scan_single_quoted(out)?;
                }
                Some(b'"') => {
                    out.push(b'"');
                    self.scan_double_quoted(out)?;
                }
                Some(b'`') => {
                    out.push(b'`');
                    self.scan_backquoted(out)?;
                }
                Some(b'\\') => {
                    out.push(b'\\');
                    match self.getb()? {
                        Some(c) => out.push(c),
                        None => return Err(self.unexpected_eof()),
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.unexpected_eof()),
            }
        }
    }

    // Reads the bodies of all here-documents whose redirections appeared on
    // the line just ended. Bodies run until a line consisting solely of the
    // delimiter (after tab stripping for `<<-`). End of input also ends a
    // body.
    fn collect_heredoc_bodies(&mut self) -> Result<(), ParseError> {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for heredoc in pending {
            let mut body = String::new();
            loop {
                let mut line = match self.read_raw_line()? {
                    Some(line) => line,
                    None => break,
                };

                if heredoc.remove_tabs {
                    while line.starts_with('\t') {
                        line.remove(0);
                    }
                }

                if line == heredoc.delimiter {
                    break;
                }

                body.push_str(&line);
                body.push('\n');
            }
            self.completed_heredocs.push_back(body);
        }
        Ok(())
    }

    // Reads one line of raw input (without the trailing newline). Returns
    // `None` at end of input with nothing read.
    fn read_raw_line(&mut self) -> Result<Option<String>, ParseError> {
        let mut line: Vec<u8> = vec![];
        loop {
            match self.getb()? {
                Some(b'\n') => break,
                Some(c) => line.push(c),
                None => {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

/// Removes shell quoting from a word's raw text, yielding the literal
/// characters it denotes. Expansion syntax is not interpreted.
pub fn strip_quotes(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    result.push(inner);
                }
            }
            '"' => loop {
                match chars.next() {
                    Some('"') | None => break,
                    Some('\\') => {
                        if let Some(escaped) = chars.next() {
                            result.push(escaped);
                        }
                    }
                    Some(inner) => result.push(inner),
                }
            },
            '\\' => {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            }
            _ => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StringStream;
    use pretty_assertions::assert_eq;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut stream = StringStream::new(input);
        let mut tokenizer = Tokenizer::new(&mut stream);
        let mut tokens = vec![];
        loop {
            let token = tokenizer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    fn word(text: &str) -> Token {
        Token::Word {
            text: text.to_owned(),
            quoted: false,
        }
    }

    #[test]
    fn tokenizes_simple_command() {
        assert_eq!(
            tokenize("echo hello world"),
            vec![word("echo"), word("hello"), word("world")]
        );
    }

    #[test]
    fn tokenizes_operators() {
        assert_eq!(
            tokenize("a && b || c | d; e & f"),
            vec![
                word("a"),
                Token::Operator(Operator::AndIf),
                word("b"),
                Token::Operator(Operator::OrIf),
                word("c"),
                Token::Operator(Operator::Pipe),
                word("d"),
                Token::Operator(Operator::Semi),
                word("e"),
                Token::Operator(Operator::And),
                word("f"),
            ]
        );
    }

    #[test]
    fn preserves_quotes_in_words() {
        let tokens = tokenize(r#"echo 'a b' "c d""#);
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[1],
            Token::Word {
                text: "'a b'".to_owned(),
                quoted: true
            }
        );
        assert_eq!(
            tokens[2],
            Token::Word {
                text: "\"c d\"".to_owned(),
                quoted: true
            }
        );
    }

    #[test]
    fn command_substitution_spans_operators() {
        let tokens = tokenize("echo $(ls | wc -l)");
        assert_eq!(tokens, vec![word("echo"), word("$(ls | wc -l)")]);
    }

    #[test]
    fn io_number_before_redirection() {
        assert_eq!(
            tokenize("cmd 2>err"),
            vec![
                word("cmd"),
                Token::IoNumber(2),
                Token::Operator(Operator::Great),
                word("err"),
            ]
        );
        // Not followed by a redirection operator: a plain word.
        assert_eq!(tokenize("echo 2"), vec![word("echo"), word("2")]);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            tokenize("echo hi # trailing\nnext"),
            vec![word("echo"), word("hi"), Token::Newline, word("next")]
        );
    }

    #[test]
    fn heredoc_body_is_captured() {
        let mut stream = StringStream::new("cat <<EOF\nline one\nline two\nEOF\n");
        let mut tokenizer = Tokenizer::new(&mut stream);
        let mut tokens = vec![];
        loop {
            let t = tokenizer.next_token().unwrap();
            let done = t == Token::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }

        let bodies = tokenizer.take_heredoc_bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0], "line one\nline two\n");
    }

    #[test]
    fn heredoc_dash_strips_tabs() {
        let mut stream = StringStream::new("cat <<-EOF\n\tindented\n\tEOF\n");
        let mut tokenizer = Tokenizer::new(&mut stream);
        loop {
            if tokenizer.next_token().unwrap() == Token::Eof {
                break;
            }
        }
        let bodies = tokenizer.take_heredoc_bodies();
        assert_eq!(bodies[0], "indented\n");
    }

    #[test]
    fn line_continuation_joins_words() {
        assert_eq!(tokenize("ab\\\ncd"), vec![word("abcd")]);
    }

    #[test]
    fn strip_quotes_handles_all_forms() {
        assert_eq!(strip_quotes("abc"), "abc");
        assert_eq!(strip_quotes("'a b'"), "a b");
        assert_eq!(strip_quotes("\"a\\\"b\""), "a\"b");
        assert_eq!(strip_quotes("a\\ b"), "a b");
    }
}
