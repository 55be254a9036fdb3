//! Expression parsing, lowered directly to postfix instruction order.
//!
//! An expression is returned with its last load still pending (see [`Tail`])
//! so that the statement parser can turn it into an assignment target
//! without backtracking.

use glint_common::{BranchKind, CallSite, Instruction, Name, ParseError, Pos, SyntaxError, Value};

use crate::emit::Code;
use crate::lexer::{Token, TokenKind};
use crate::parser::{pos, Parser};

/// What the final step of an expression reads.
#[derive(Debug)]
pub(crate) enum Tail {
    /// Fully emitted; the value is on the stack.
    Done,
    /// A variable load, not yet emitted.
    Variable(Name, Pos),
    /// Receiver emitted; `getMember` not yet emitted.
    Member(Name, Pos),
    /// Receiver and index emitted; `__getitem__` not yet emitted.
    Index(Pos),
}

#[derive(Debug)]
pub(crate) struct Expr {
    pub(crate) code: Code,
    pub(crate) tail: Tail,
}

impl Expr {
    fn done(code: Code) -> Self {
        Self {
            code,
            tail: Tail::Done,
        }
    }

    /// Emit the pending load, leaving the value on the stack.
    pub(crate) fn materialize(self) -> Code {
        let mut code = self.code;
        match self.tail {
            Tail::Done => {}
            Tail::Variable(name, pos) => code.load(&name, pos),
            Tail::Member(name, pos) => {
                code.value(Value::Str(name));
                code.send("getMember", 1, pos);
            }
            Tail::Index(pos) => code.send("__getitem__", 1, pos),
        }
        code
    }
}

const EQUALITY: &[(TokenKind, &str)] = &[
    (TokenKind::EqEq, "__eq__"),
    (TokenKind::NotEq, "__ne__"),
];

const COMPARISON: &[(TokenKind, &str)] = &[
    (TokenKind::Lt, "__lt__"),
    (TokenKind::Gt, "__gt__"),
    (TokenKind::Le, "__le__"),
    (TokenKind::Ge, "__ge__"),
];

const ADDITIVE: &[(TokenKind, &str)] = &[
    (TokenKind::Plus, "__add__"),
    (TokenKind::Minus, "__sub__"),
];

const MULTIPLICATIVE: &[(TokenKind, &str)] = &[
    (TokenKind::Star, "__mul__"),
    (TokenKind::Slash, "__div__"),
    (TokenKind::Percent, "__mod__"),
];

impl<'a> Parser<'a> {
    /// `or [':' or]`, where `:` builds a pair.
    pub(crate) fn expression(&mut self) -> Result<Expr, ParseError> {
        let left = self.or()?;
        match self.cursor.accept(&TokenKind::Colon)? {
            Some(colon) => {
                let mut code = left.materialize();
                code.append(self.or()?.materialize());
                code.call("__pair__", 2, pos(&colon));
                Ok(Expr::done(code))
            }
            None => Ok(left),
        }
    }

    pub(crate) fn value_expression(&mut self) -> Result<Code, ParseError> {
        Ok(self.expression()?.materialize())
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        self.short_circuit(&TokenKind::OrOr, BranchKind::IfTrue, true, Self::and)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        self.short_circuit(&TokenKind::AndAnd, BranchKind::IfFalse, false, Self::equality)
    }

    /// `left op right` where `right` is skipped once `left` decides the
    /// result: `left, BRANCH_IF(decided) short, right, JUMP end,
    /// short: VALUE decided, end:`.
    fn short_circuit(
        &mut self,
        op: &TokenKind,
        kind: BranchKind,
        decided: bool,
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        while self.cursor.accept(op)?.is_some() {
            let mut code = left.materialize();
            let short = code.reserve_branch(kind);
            code.append(next(self)?.materialize());
            let end = code.reserve_branch(BranchKind::Always);
            code.patch_here(short);
            code.value(Value::Bool(decided));
            code.patch_here(end);
            left = Expr::done(code);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary(EQUALITY, Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary(COMPARISON, Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary(ADDITIVE, Self::term)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary(MULTIPLICATIVE, Self::unary)
    }

    /// Left-associative binary operators, each lowered to a one-argument
    /// command on the left operand.
    fn binary(
        &mut self,
        ops: &[(TokenKind, &str)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        'operators: loop {
            for (kind, method) in ops {
                if let Some(op) = self.cursor.accept(kind)? {
                    let mut code = left.materialize();
                    code.append(next(self)?.materialize());
                    code.send(method, 1, pos(&op));
                    left = Expr::done(code);
                    continue 'operators;
                }
            }
            return Ok(left);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let method = if let Some(op) = self.cursor.accept(&TokenKind::Bang)? {
            ("__not__", op)
        } else if let Some(op) = self.cursor.accept(&TokenKind::Minus)? {
            ("__neg__", op)
        } else {
            return self.postfix();
        };
        let mut code = self.unary()?.materialize();
        code.send(method.0, 0, pos(&method.1));
        Ok(Expr::done(code))
    }

    /// Member access, method calls and indexing chained onto a primary.
    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.cursor.accept(&TokenKind::Dot)?.is_some() {
                let member = self.cursor.expect(&TokenKind::Ident, "member name")?;
                let mut code = expr.materialize();
                if self.cursor.accept(&TokenKind::LParen)?.is_some() {
                    let (args, keywords) = self.arguments()?;
                    code.append(args);
                    code.push(Instruction::Command(CallSite::with_keywords(
                        &member.text,
                        keywords,
                        pos(&member),
                    )));
                    expr = Expr::done(code);
                } else {
                    expr = Expr {
                        code,
                        tail: Tail::Member(Name::from(member.text.as_str()), pos(&member)),
                    };
                }
            } else if let Some(bracket) = self.cursor.accept(&TokenKind::LBracket)? {
                let mut code = expr.materialize();
                code.append(self.value_expression()?);
                self.cursor.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr {
                    code,
                    tail: Tail::Index(pos(&bracket)),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.cursor.peek()?.clone();
        let literal = match &token.kind {
            TokenKind::Number(n) => Some(Value::Number(*n)),
            TokenKind::Str(s) => Some(Value::str(s)),
            TokenKind::True => Some(Value::Bool(true)),
            TokenKind::False => Some(Value::Bool(false)),
            TokenKind::Null => Some(Value::None),
            _ => None,
        };
        if let Some(value) = literal {
            self.cursor.advance()?;
            let mut code = Code::new();
            code.value(value);
            return Ok(Expr::done(code));
        }

        match token.kind {
            TokenKind::Ident => {
                self.cursor.advance()?;
                if self.cursor.accept(&TokenKind::LParen)?.is_some() {
                    let (mut code, keywords) = self.arguments()?;
                    code.push(Instruction::Function(CallSite::with_keywords(
                        &token.text,
                        keywords,
                        pos(&token),
                    )));
                    Ok(Expr::done(code))
                } else {
                    Ok(Expr {
                        code: Code::new(),
                        tail: Tail::Variable(Name::from(token.text.as_str()), pos(&token)),
                    })
                }
            }
            TokenKind::LParen => {
                self.cursor.advance()?;
                let code = self.value_expression()?;
                self.cursor.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::done(code))
            }
            TokenKind::LBracket => {
                self.cursor.advance()?;
                self.collection(&token, &TokenKind::RBracket, "']'", "__list__")
            }
            TokenKind::LBrace => {
                self.cursor.advance()?;
                self.collection(&token, &TokenKind::RBrace, "'}'", "__map__")
            }
            _ => Err(self.cursor.unexpected("expression")?),
        }
    }

    /// `[a, b]` and `{k: v}` literals: the elements, then a call to the
    /// internal constructor with one argument per element.
    fn collection(
        &mut self,
        open: &Token,
        close: &TokenKind,
        close_text: &str,
        constructor: &str,
    ) -> Result<Expr, ParseError> {
        let mut code = Code::new();
        let mut count = 0;
        if self.cursor.accept(close)?.is_none() {
            loop {
                code.append(self.value_expression()?);
                count += 1;
                if self.cursor.accept(&TokenKind::Comma)?.is_none() {
                    self.cursor.expect(close, close_text)?;
                    break;
                }
            }
        }
        code.call(constructor, count, pos(open));
        Ok(Expr::done(code))
    }

    /// Call arguments after the opening parenthesis, through the closing
    /// one. Returns the argument code and one keyword tag per argument.
    pub(crate) fn arguments(&mut self) -> Result<(Code, Vec<Option<Name>>), ParseError> {
        let mut code = Code::new();
        let mut keywords = Vec::new();
        if self.cursor.accept(&TokenKind::RParen)?.is_some() {
            return Ok((code, keywords));
        }
        loop {
            match self.cursor.accept_two(&TokenKind::Ident, &TokenKind::Assign)? {
                Some((name, _)) => keywords.push(Some(Name::from(name.text.as_str()))),
                None => keywords.push(None),
            }
            code.append(self.value_expression()?);
            if self.cursor.accept(&TokenKind::Comma)?.is_none() {
                self.cursor.expect(&TokenKind::RParen, "')'")?;
                return Ok((code, keywords));
            }
        }
    }

    /// A literal default value for a parameter.
    pub(crate) fn literal(&mut self, parameter: &str) -> Result<Value, ParseError> {
        let token = self.cursor.advance()?;
        match token.kind {
            TokenKind::Number(n) => Ok(Value::Number(n)),
            TokenKind::Str(s) => Ok(Value::Str(s.into())),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            TokenKind::Null => Ok(Value::None),
            _ => Err(self.cursor.error_at(
                token.line,
                token.column,
                SyntaxError::NonLiteralDefault(parameter.to_string()),
            )),
        }
    }
}
