//! Tokenizer for Glint source text.
//!
//! [`Lexer`] is a lazy iterator: tokens are produced on demand and the first
//! lexical error ends the sequence.

use std::fmt;

use glint_common::{ParseError, SyntaxError};

/// Reserved words. Matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Def,
    If,
    Elif,
    Else,
    For,
    While,
    Return,
    Try,
    Catch,
    Static,
    Class,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Def => "def",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::While => "while",
            Keyword::Return => "return",
            Keyword::Try => "try",
            Keyword::Catch => "catch",
            Keyword::Static => "static",
            Keyword::Class => "class",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident,
    Number(f64),
    /// String literal with escapes resolved.
    Str(String),
    Keyword(Keyword),
    True,
    False,
    Null,

    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Bang,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,

    /// End of input. Never produced by the lexer itself.
    Eof,
}

impl TokenKind {
    /// Whether a token of this kind can be the last token of an operand.
    /// Decides whether a following `+`/`-` is a sign or an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Number(_) => "number",
            TokenKind::Str(_) => "string",
            TokenKind::Keyword(keyword) => return write!(f, "'{}'", keyword.as_str()),
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::Assign => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Bang => "'!'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semi => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Dot => "'.'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A single token with its source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// How the token is named in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Ident | TokenKind::Number(_) => format!("{} '{}'", self.kind, self.text),
            _ => self.kind.to_string(),
        }
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word.to_ascii_lowercase().as_str() {
        "def" => TokenKind::Keyword(Keyword::Def),
        "if" => TokenKind::Keyword(Keyword::If),
        "elif" => TokenKind::Keyword(Keyword::Elif),
        "else" => TokenKind::Keyword(Keyword::Else),
        "for" => TokenKind::Keyword(Keyword::For),
        "while" => TokenKind::Keyword(Keyword::While),
        "return" => TokenKind::Keyword(Keyword::Return),
        "try" => TokenKind::Keyword(Keyword::Try),
        "catch" => TokenKind::Keyword(Keyword::Catch),
        "static" => TokenKind::Keyword(Keyword::Static),
        "class" => TokenKind::Keyword(Keyword::Class),
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => return None,
    };
    Some(kind)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lazy tokenizer over one source file.
pub struct Lexer<'a> {
    file: &'a str,
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    after_operand: bool,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: &'a str) -> Self {
        Self {
            file,
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            after_operand: false,
            failed: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    /// Consume one character, keeping line/column current. `\r\n` counts as
    /// a single line break.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        match c {
            '\n' => self.newline(),
            '\r' if self.peek() != Some('\n') => self.newline(),
            _ => self.column += 1,
        }
        Some(c)
    }

    fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn error(&self, line: u32, column: u32, kind: SyntaxError) -> ParseError {
        ParseError::new(self.file, self.source, line, column, kind)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n') | Some('\r')) {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(self.error(
                                    line,
                                    column,
                                    SyntaxError::UnterminatedComment,
                                ))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn number(&mut self, start: usize, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        self.digits();
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                self.digits();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if self.peek().is_some_and(is_ident_char) {
            let mut bad = text;
            while let Some(c) = self.peek().filter(|c| is_ident_char(*c)) {
                bad.push(c);
                self.bump();
            }
            return Err(self.error(line, column, SyntaxError::MalformedNumber(bad)));
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error(line, column, SyntaxError::MalformedNumber(text)))
    }

    fn string(&mut self, quote: char, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    return Err(self.error(line, column, SyntaxError::UnterminatedString))
                }
                Some(c) if c == quote => {
                    self.bump();
                    return Ok(TokenKind::Str(value));
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some('n') => value.push('\n'),
                        Some(c @ ('"' | '\'' | '\\')) => value.push(c),
                        Some(c) if c != '\n' && c != '\r' => {
                            value.push('\\');
                            value.push(c);
                        }
                        _ => {
                            return Err(self.error(line, column, SyntaxError::UnterminatedString))
                        }
                    }
                    self.bump();
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    fn operator(&mut self, c: char, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        let next = self.peek_at(1);
        let (kind, width) = match (c, next) {
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('!', _) => (TokenKind::Bang, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semi, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            _ => return Err(self.error(line, column, SyntaxError::UnexpectedCharacter(c))),
        };
        for _ in 0..width {
            self.bump();
        }
        Ok(kind)
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_trivia()?;
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let (start, line, column) = (self.pos, self.line, self.column);
        let signed_number = matches!(c, '+' | '-')
            && !self.after_operand
            && self.peek_at(1).is_some_and(|d| d.is_ascii_digit());

        let kind = if c.is_ascii_digit() || signed_number {
            self.number(start, line, column)?
        } else if is_ident_start(c) {
            while self.peek().is_some_and(is_ident_char) {
                self.bump();
            }
            let word: String = self.chars[start..self.pos].iter().collect();
            keyword(&word).unwrap_or(TokenKind::Ident)
        } else if c == '"' || c == '\'' {
            self.string(c, line, column)?
        } else {
            self.operator(c, line, column)?
        };

        self.after_operand = kind.ends_operand();
        Ok(Some(Token {
            kind,
            text: self.chars[start..self.pos].iter().collect(),
            line,
            column,
        }))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Tokenize a whole source text.
pub fn tokenize(source: &str, file: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source, file).collect()
}
