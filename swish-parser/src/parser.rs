//! Recursive-descent parser producing the shell AST.

use std::collections::VecDeque;

use crate::ast::{self, SeparatorOperator};
use crate::error::ParseError;
use crate::source::SourceInfo;
use crate::tokenizer::{strip_quotes, Operator, Token, Tokenizer};
use crate::ByteStream;

const REDIRECT_OPERATORS: &[Operator] = &[
    Operator::Less,
    Operator::Great,
    Operator::DoubleGreat,
    Operator::LessAnd,
    Operator::GreatAnd,
    Operator::DoubleLess,
    Operator::DoubleLessDash,
];

/// Parses shell input into AST nodes, one complete command at a time.
pub struct Parser<'a, S: ByteStream> {
    tokenizer: Tokenizer<'a, S>,
    peeked: VecDeque<Token>,
    source_info: SourceInfo,
}

impl<'a, S: ByteStream> Parser<'a, S> {
    /// Returns a new parser reading from the given stream.
    pub fn new(stream: &'a mut S, source_info: &SourceInfo) -> Self {
        Self {
            tokenizer: Tokenizer::new(stream),
            peeked: VecDeque::new(),
            source_info: source_info.clone(),
        }
    }

    /// Parses the entire input into a program.
    pub fn parse_program(&mut self) -> Result<ast::Program, ParseError> {
        let mut complete_commands = vec![];
        while let Some(command) = self.parse_command()? {
            if !command.0.is_empty() {
                complete_commands.push(command);
            }
        }
        Ok(ast::Program { complete_commands })
    }

    /// Parses one complete command, consuming its terminating newline.
    /// Returns an empty list for a blank line, and `None` at end of input.
    pub fn parse_command(&mut self) -> Result<Option<ast::CompoundList>, ParseError> {
        match self.peek()? {
            Token::Newline => {
                self.advance()?;
                return Ok(Some(ast::CompoundList::default()));
            }
            Token::Eof => return Ok(None),
            _ => (),
        }

        let mut items = vec![];
        loop {
            let ao = self.parse_and_or()?;

            let sep = match self.peek()? {
                Token::Operator(Operator::Semi) => {
                    self.advance()?;
                    SeparatorOperator::Sequence
                }
                Token::Operator(Operator::And) => {
                    self.advance()?;
                    SeparatorOperator::Async
                }
                _ => SeparatorOperator::Sequence,
            };
            items.push(ast::CompoundListItem(ao, sep));

            match self.peek()? {
                Token::Newline => {
                    self.advance()?;
                    break;
                }
                Token::Eof => break,
                _ => (),
            }
        }

        let mut list = ast::CompoundList(items);

        let mut bodies = self.tokenizer.take_heredoc_bodies();
        fill_heredocs_in_list(&mut list, &mut bodies);
        debug_assert!(bodies.is_empty());

        tracing::trace!(target: "parse", "parsed from {}: {list}", self.source_info.source);

        Ok(Some(list))
    }

    fn peek(&mut self) -> Result<Token, ParseError> {
        self.peek_nth(0)
    }

    fn peek_nth(&mut self, n: usize) -> Result<Token, ParseError> {
        while self.peeked.len() <= n {
            let token = self.tokenizer.next_token()?;
            self.peeked.push_back(token);
        }
        Ok(self.peeked[n].clone())
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        if let Some(token) = self.peeked.pop_front() {
            Ok(token)
        } else {
            self.tokenizer.next_token()
        }
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        match token {
            Token::Eof => ParseError::UnexpectedEndOfInput {
                position: self.tokenizer.position(),
            },
            _ => ParseError::UnexpectedToken {
                token: token.to_string(),
                position: self.tokenizer.position(),
            },
        }
    }

    fn at_reserved_word(&mut self, word: &str) -> Result<bool, ParseError> {
        Ok(matches!(
            self.peek()?,
            Token::Word { text, quoted: false } if text == word
        ))
    }

    fn expect_reserved_word(&mut self, word: &str) -> Result<(), ParseError> {
        if self.at_reserved_word(word)? {
            self.advance()?;
            Ok(())
        } else {
            let token = self.peek()?;
            Err(self.unexpected(&token))
        }
    }

    fn expect_operator(&mut self, op: Operator) -> Result<(), ParseError> {
        match self.peek()? {
            Token::Operator(found) if found == op => {
                self.advance()?;
                Ok(())
            }
            token => Err(self.unexpected(&token)),
        }
    }

    fn expect_word(&mut self) -> Result<(String, bool), ParseError> {
        match self.peek()? {
            Token::Word { text, quoted } => {
                self.advance()?;
                Ok((text, quoted))
            }
            token => Err(self.unexpected(&token)),
        }
    }

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        while matches!(self.peek()?, Token::Newline) {
            self.advance()?;
        }
        Ok(())
    }

    // Parses a list terminated by one of the given unquoted reserved words or
    // operators; the terminator itself is not consumed. Newlines between
    // items are accepted.
    fn parse_compound_list(
        &mut self,
        stop_words: &[&str],
        stop_ops: &[Operator],
    ) -> Result<ast::CompoundList, ParseError> {
        let mut items = vec![];

        loop {
            self.skip_newlines()?;

            match self.peek()? {
                Token::Eof => break,
                Token::Operator(op) if stop_ops.contains(&op) => break,
                Token::Word { ref text, quoted: false } if stop_words.contains(&text.as_str()) => {
                    break;
                }
                _ => (),
            }

            let ao = self.parse_and_or()?;
            let mut sep = SeparatorOperator::Sequence;
            match self.peek()? {
                Token::Operator(Operator::Semi) => {
                    self.advance()?;
                }
                Token::Operator(Operator::And) => {
                    self.advance()?;
                    sep = SeparatorOperator::Async;
                }
                Token::Newline => {
                    self.advance()?;
                }
                _ => (),
            }
            items.push(ast::CompoundListItem(ao, sep));
        }

        Ok(ast::CompoundList(items))
    }

    fn parse_and_or(&mut self) -> Result<ast::AndOrList, ParseError> {
        let first = self.parse_pipeline()?;
        let mut additional = vec![];

        loop {
            match self.peek()? {
                Token::Operator(Operator::AndIf) => {
                    self.advance()?;
                    self.skip_newlines()?;
                    additional.push(ast::AndOr::And(self.parse_pipeline()?));
                }
                Token::Operator(Operator::OrIf) => {
                    self.advance()?;
                    self.skip_newlines()?;
                    additional.push(ast::AndOr::Or(self.parse_pipeline()?));
                }
                _ => break,
            }
        }

        Ok(ast::AndOrList { first, additional })
    }

    fn parse_pipeline(&mut self) -> Result<ast::Pipeline, ParseError> {
        let mut bang = false;
        if self.at_reserved_word("!")? {
            self.advance()?;
            bang = true;
        }

        let mut seq = vec![self.parse_command_body()?];
        while matches!(self.peek()?, Token::Operator(Operator::Pipe)) {
            self.advance()?;
            self.skip_newlines()?;
            seq.push(self.parse_command_body()?);
        }

        Ok(ast::Pipeline { bang, seq })
    }

    fn parse_command_body(&mut self) -> Result<ast::Command, ParseError> {
        match self.peek()? {
            Token::Operator(Operator::LParen) => {
                self.advance()?;
                let list = self.parse_compound_list(&[], &[Operator::RParen])?;
                self.expect_operator(Operator::RParen)?;
                let redirects = self.parse_optional_redirect_list()?;
                Ok(ast::Command::Compound(
                    ast::CompoundCommand::Subshell(list),
                    redirects,
                ))
            }
            Token::Word {
                ref text,
                quoted: false,
            } => match text.as_str() {
                "{" => {
                    self.advance()?;
                    let list = self.parse_compound_list(&["}"], &[])?;
                    self.expect_reserved_word("}")?;
                    let redirects = self.parse_optional_redirect_list()?;
                    Ok(ast::Command::Compound(
                        ast::CompoundCommand::BraceGroup(list),
                        redirects,
                    ))
                }
                "if" => self.parse_if_clause(),
                "while" => self.parse_while_or_until_clause(false),
                "until" => self.parse_while_or_until_clause(true),
                "for" => self.parse_for_clause(),
                "case" => self.parse_case_clause(),
                _ => self.parse_function_or_simple(),
            },
            _ => self.parse_simple_command().map(ast::Command::Simple),
        }
    }

    fn parse_function_or_simple(&mut self) -> Result<ast::Command, ParseError> {
        if let (
            Token::Word {
                text,
                quoted: false,
            },
            Token::Operator(Operator::LParen),
        ) = (self.peek()?, self.peek_nth(1)?)
        {
            if is_valid_name(&text) {
                self.advance()?;
                self.advance()?;
                self.expect_operator(Operator::RParen)?;
                self.skip_newlines()?;
                let body = self.parse_command_body()?;
                return Ok(ast::Command::Function(ast::FunctionDefinition {
                    fname: text,
                    body: Box::new(body),
                }));
            }
        }

        self.parse_simple_command().map(ast::Command::Simple)
    }

    fn parse_if_clause(&mut self) -> Result<ast::Command, ParseError> {
        self.expect_reserved_word("if")?;
        let condition = self.parse_compound_list(&["then"], &[])?;
        self.expect_reserved_word("then")?;
        let then = self.parse_compound_list(&["elif", "else", "fi"], &[])?;

        let mut elses = vec![];
        loop {
            if self.at_reserved_word("elif")? {
                self.advance()?;
                let condition = self.parse_compound_list(&["then"], &[])?;
                self.expect_reserved_word("then")?;
                let body = self.parse_compound_list(&["elif", "else", "fi"], &[])?;
                elses.push(ast::ElseClause {
                    condition: Some(condition),
                    body,
                });
            } else if self.at_reserved_word("else")? {
                self.advance()?;
                let body = self.parse_compound_list(&["fi"], &[])?;
                elses.push(ast::ElseClause {
                    condition: None,
                    body,
                });
            } else {
                break;
            }
        }

        self.expect_reserved_word("fi")?;
        let redirects = self.parse_optional_redirect_list()?;

        Ok(ast::Command::Compound(
            ast::CompoundCommand::IfClause(ast::IfClauseCommand {
                condition,
                then,
                elses,
            }),
            redirects,
        ))
    }

    fn parse_while_or_until_clause(&mut self, until: bool) -> Result<ast::Command, ParseError> {
        self.advance()?; // `while` or `until`
        let condition = self.parse_compound_list(&["do"], &[])?;
        self.expect_reserved_word("do")?;
        let body = self.parse_compound_list(&["done"], &[])?;
        self.expect_reserved_word("done")?;
        let redirects = self.parse_optional_redirect_list()?;

        let clause = ast::WhileOrUntilClauseCommand { condition, body };
        let compound = if until {
            ast::CompoundCommand::UntilClause(clause)
        } else {
            ast::CompoundCommand::WhileClause(clause)
        };

        Ok(ast::Command::Compound(compound, redirects))
    }

    fn parse_for_clause(&mut self) -> Result<ast::Command, ParseError> {
        self.expect_reserved_word("for")?;

        let (variable_name, _) = self.expect_word()?;
        if !is_valid_name(&variable_name) {
            return Err(ParseError::InvalidName(variable_name));
        }

        self.skip_newlines()?;

        let values = if self.at_reserved_word("in")? {
            self.advance()?;
            let mut values = vec![];
            while let Token::Word { text, .. } = self.peek()? {
                self.advance()?;
                values.push(ast::Word::new(text));
            }
            Some(values)
        } else {
            None
        };

        if matches!(self.peek()?, Token::Operator(Operator::Semi)) {
            self.advance()?;
        }
        self.skip_newlines()?;

        self.expect_reserved_word("do")?;
        let body = self.parse_compound_list(&["done"], &[])?;
        self.expect_reserved_word("done")?;
        let redirects = self.parse_optional_redirect_list()?;

        Ok(ast::Command::Compound(
            ast::CompoundCommand::ForClause(ast::ForClauseCommand {
                variable_name,
                values,
                body,
            }),
            redirects,
        ))
    }

    fn parse_case_clause(&mut self) -> Result<ast::Command, ParseError> {
        self.expect_reserved_word("case")?;
        let (subject, _) = self.expect_word()?;
        self.skip_newlines()?;
        self.expect_reserved_word("in")?;

        let mut cases = vec![];
        loop {
            self.skip_newlines()?;

            if self.at_reserved_word("esac")? {
                self.advance()?;
                break;
            }

            if matches!(self.peek()?, Token::Operator(Operator::LParen)) {
                self.advance()?;
            }

            let mut patterns = vec![];
            let (first_pattern, _) = self.expect_word()?;
            patterns.push(ast::Word::new(first_pattern));
            while matches!(self.peek()?, Token::Operator(Operator::Pipe)) {
                self.advance()?;
                let (pattern, _) = self.expect_word()?;
                patterns.push(ast::Word::new(pattern));
            }
            self.expect_operator(Operator::RParen)?;

            let body = self.parse_compound_list(&["esac"], &[Operator::SemiSemi])?;
            let cmd = if body.0.is_empty() { None } else { Some(body) };
            cases.push(ast::CaseItem { patterns, cmd });

            if matches!(self.peek()?, Token::Operator(Operator::SemiSemi)) {
                self.advance()?;
            }
        }

        let redirects = self.parse_optional_redirect_list()?;

        Ok(ast::Command::Compound(
            ast::CompoundCommand::CaseClause(ast::CaseClauseCommand {
                value: ast::Word::new(subject),
                cases,
            }),
            redirects,
        ))
    }

    fn parse_simple_command(&mut self) -> Result<ast::SimpleCommand, ParseError> {
        let mut cmd = ast::SimpleCommand::default();

        loop {
            match self.peek()? {
                Token::IoNumber(_) => {
                    if let Some(redirect) = self.try_parse_redirect()? {
                        cmd.redirects.push(redirect);
                    }
                }
                Token::Operator(op) if REDIRECT_OPERATORS.contains(&op) => {
                    if let Some(redirect) = self.try_parse_redirect()? {
                        cmd.redirects.push(redirect);
                    }
                }
                Token::Word { text, .. } => {
                    self.advance()?;
                    cmd.words.push(ast::Word::new(text));
                }
                _ => break,
            }
        }

        if cmd.words.is_empty() && cmd.redirects.is_empty() {
            let token = self.peek()?;
            return Err(self.unexpected(&token));
        }

        Ok(cmd)
    }

    fn parse_optional_redirect_list(
        &mut self,
    ) -> Result<Option<ast::RedirectList>, ParseError> {
        let mut redirects = vec![];
        while let Some(redirect) = self.try_parse_redirect()? {
            redirects.push(redirect);
        }

        if redirects.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ast::RedirectList(redirects)))
        }
    }

    fn try_parse_redirect(&mut self) -> Result<Option<ast::IoRedirect>, ParseError> {
        let fd = match self.peek()? {
            Token::IoNumber(n) => {
                self.advance()?;
                Some(n)
            }
            _ => None,
        };

        let op = match self.peek()? {
            Token::Operator(op) if REDIRECT_OPERATORS.contains(&op) => {
                self.advance()?;
                op
            }
            token => {
                if fd.is_some() {
                    // The tokenizer only emits an IoNumber ahead of `<`/`>`.
                    return Err(self.unexpected(&token));
                }
                return Ok(None);
            }
        };

        if matches!(op, Operator::DoubleLess | Operator::DoubleLessDash) {
            let (text, quoted) = self.expect_word()?;
            return Ok(Some(ast::IoRedirect::HereDocument(
                fd,
                ast::IoHereDocument {
                    remove_tabs: matches!(op, Operator::DoubleLessDash),
                    requires_expansion: !quoted,
                    delimiter: strip_quotes(&text),
                    doc: ast::Word::new(""),
                },
            )));
        }

        let kind = match op {
            Operator::Less => ast::IoFileRedirectKind::Read,
            Operator::Great => ast::IoFileRedirectKind::Write,
            Operator::DoubleGreat => ast::IoFileRedirectKind::Append,
            Operator::LessAnd => ast::IoFileRedirectKind::DuplicateInput,
            Operator::GreatAnd => ast::IoFileRedirectKind::DuplicateOutput,
            _ => unreachable!("redirect operator set is closed"),
        };

        let target = match self.peek()? {
            Token::Word { text, .. } => {
                self.advance()?;
                ast::Word::new(text)
            }
            Token::IoNumber(n) => {
                self.advance()?;
                ast::Word::new(n.to_string())
            }
            token => return Err(self.unexpected(&token)),
        };

        Ok(Some(ast::IoRedirect::File(fd, kind, target)))
    }
}

fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

//
// Here-document bodies are collected by the tokenizer when the newline ending
// their line is reached; the walk below hands them to their redirections in
// source order.
//

fn fill_heredocs_in_list(list: &mut ast::CompoundList, bodies: &mut VecDeque<String>) {
    for ast::CompoundListItem(ao, _) in &mut list.0 {
        fill_heredocs_in_pipeline(&mut ao.first, bodies);
        for next in &mut ao.additional {
            match next {
                ast::AndOr::And(p) | ast::AndOr::Or(p) => {
                    fill_heredocs_in_pipeline(p, bodies);
                }
            }
        }
    }
}

fn fill_heredocs_in_pipeline(pipeline: &mut ast::Pipeline, bodies: &mut VecDeque<String>) {
    for cmd in &mut pipeline.seq {
        fill_heredocs_in_command(cmd, bodies);
    }
}

fn fill_heredocs_in_command(cmd: &mut ast::Command, bodies: &mut VecDeque<String>) {
    match cmd {
        ast::Command::Simple(simple) => {
            for redirect in &mut simple.redirects {
                fill_heredoc_in_redirect(redirect, bodies);
            }
        }
        ast::Command::Compound(compound, redirects) => {
            match compound {
                ast::CompoundCommand::BraceGroup(list)
                | ast::CompoundCommand::Subshell(list) => {
                    fill_heredocs_in_list(list, bodies);
                }
                ast::CompoundCommand::ForClause(f) => fill_heredocs_in_list(&mut f.body, bodies),
                ast::CompoundCommand::CaseClause(c) => {
                    for case in &mut c.cases {
                        if let Some(cmd) = &mut case.cmd {
                            fill_heredocs_in_list(cmd, bodies);
                        }
                    }
                }
                ast::CompoundCommand::IfClause(i) => {
                    fill_heredocs_in_list(&mut i.condition, bodies);
                    fill_heredocs_in_list(&mut i.then, bodies);
                    for e in &mut i.elses {
                        if let Some(condition) = &mut e.condition {
                            fill_heredocs_in_list(condition, bodies);
                        }
                        fill_heredocs_in_list(&mut e.body, bodies);
                    }
                }
                ast::CompoundCommand::WhileClause(w) | ast::CompoundCommand::UntilClause(w) => {
                    fill_heredocs_in_list(&mut w.condition, bodies);
                    fill_heredocs_in_list(&mut w.body, bodies);
                }
            }

            if let Some(redirects) = redirects {
                for redirect in &mut redirects.0 {
                    fill_heredoc_in_redirect(redirect, bodies);
                }
            }
        }
        ast::Command::Function(def) => fill_heredocs_in_command(&mut def.body, bodies),
    }
}

fn fill_heredoc_in_redirect(redirect: &mut ast::IoRedirect, bodies: &mut VecDeque<String>) {
    if let ast::IoRedirect::HereDocument(_, doc) = redirect {
        doc.doc = ast::Word::new(bodies.pop_front().unwrap_or_default());
    }
}
