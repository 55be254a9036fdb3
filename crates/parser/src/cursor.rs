//! Token reader with one- and two-token acceptance over the lazy lexer.

use std::collections::VecDeque;
use std::mem::discriminant;

use glint_common::{ParseError, SyntaxError};

use crate::lexer::{Lexer, Token, TokenKind};

pub(crate) struct Cursor<'a> {
    lexer: Lexer<'a>,
    buffered: VecDeque<Token>,
    file: &'a str,
    source: &'a str,
    /// Position just past the last token read, used for the end token.
    end: (u32, u32),
}

/// Kinds match ignoring literal payloads; keywords must be the same keyword.
fn same_kind(a: &TokenKind, b: &TokenKind) -> bool {
    match (a, b) {
        (TokenKind::Keyword(x), TokenKind::Keyword(y)) => x == y,
        _ => discriminant(a) == discriminant(b),
    }
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(source: &'a str, file: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source, file),
            buffered: VecDeque::new(),
            file,
            source,
            end: (1, 1),
        }
    }

    /// Make sure `count` tokens are buffered, padding with end tokens.
    fn fill(&mut self, count: usize) -> Result<(), ParseError> {
        while self.buffered.len() < count {
            let token = match self.lexer.next() {
                Some(token) => {
                    let token = token?;
                    let width = token.text.chars().count() as u32;
                    self.end = (token.line, token.column + width);
                    token
                }
                None => Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    line: self.end.0,
                    column: self.end.1,
                },
            };
            self.buffered.push_back(token);
        }
        Ok(())
    }

    pub(crate) fn peek(&mut self) -> Result<&Token, ParseError> {
        self.fill(1)?;
        Ok(&self.buffered[0])
    }

    pub(crate) fn peek_second(&mut self) -> Result<&Token, ParseError> {
        self.fill(2)?;
        Ok(&self.buffered[1])
    }

    pub(crate) fn at(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        Ok(same_kind(&self.peek()?.kind, kind))
    }

    pub(crate) fn at_end(&mut self) -> Result<bool, ParseError> {
        self.at(&TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Result<Token, ParseError> {
        self.fill(1)?;
        match self.buffered.pop_front() {
            Some(token) => Ok(token),
            None => Err(self.error_at(self.end.0, self.end.1, SyntaxError::UnexpectedToken {
                expected: "a token".to_string(),
                found: TokenKind::Eof.to_string(),
            })),
        }
    }

    /// Consume the next token if it has the given kind.
    pub(crate) fn accept(&mut self, kind: &TokenKind) -> Result<Option<Token>, ParseError> {
        if self.at(kind)? {
            self.advance().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Consume the next two tokens if they have the given kinds.
    pub(crate) fn accept_two(
        &mut self,
        first: &TokenKind,
        second: &TokenKind,
    ) -> Result<Option<(Token, Token)>, ParseError> {
        self.fill(2)?;
        if same_kind(&self.buffered[0].kind, first) && same_kind(&self.buffered[1].kind, second) {
            let a = self.advance()?;
            let b = self.advance()?;
            Ok(Some((a, b)))
        } else {
            Ok(None)
        }
    }

    /// Consume a token of the given kind or fail with "expected `what`".
    pub(crate) fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        match self.accept(kind)? {
            Some(token) => Ok(token),
            None => Err(self.unexpected(what)?),
        }
    }

    /// An "expected `what`, found <next token>" error at the next token.
    pub(crate) fn unexpected(&mut self, what: &str) -> Result<ParseError, ParseError> {
        let token = self.peek()?.clone();
        Ok(self.error_at(
            token.line,
            token.column,
            SyntaxError::UnexpectedToken {
                expected: what.to_string(),
                found: token.describe(),
            },
        ))
    }

    pub(crate) fn error_at(&self, line: u32, column: u32, kind: SyntaxError) -> ParseError {
        ParseError::new(self.file, self.source, line, column, kind)
    }
}
