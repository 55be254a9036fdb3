//! Statement and declaration parsing.
//!
//! Single pass, no backtracking. Each statement is lowered into the
//! instruction list of the procedure being parsed; forward jumps are emitted
//! as pending slots and patched once the block after them is laid out.

use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use glint_common::{
    hidden_name, BranchKind, BreakpointMarker, Class, Instruction, Name, ParseError, Parameter,
    Pos, Procedure, Program, ProgramParts, SyntaxError, Value,
};

use crate::cursor::Cursor;
use crate::emit::Code;
use crate::expr::{Expr, Tail};
use crate::lexer::{Keyword, Token, TokenKind};

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Name used in diagnostics and caller frames.
    pub filename: String,
    /// Emit a breakpoint marker before every statement.
    pub breakpoints: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            filename: "<script>".to_string(),
            breakpoints: true,
        }
    }
}

pub(crate) fn pos(token: &Token) -> Pos {
    Pos::new(token.line, token.column)
}

fn keyword(k: Keyword) -> TokenKind {
    TokenKind::Keyword(k)
}

/// Procedure name of the top-level code.
pub const MODULE_PROCEDURE: &str = "<module>";

pub(crate) struct Parser<'a> {
    pub(crate) cursor: Cursor<'a>,
    options: &'a ParseOptions,
    scope: Weak<Program>,
    members: HashMap<Name, Value>,
    /// Names declared at top level by `def` or assignment.
    top_level: HashSet<String>,
    classes: HashSet<String>,
    class_inits: Vec<Rc<Procedure>>,
    breakpoints: Vec<Rc<BreakpointMarker>>,
    /// Nesting of `def` bodies; 0 while parsing top-level code.
    depth: usize,
    /// Counter for the hidden variables of `for` loops.
    loops: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, options: &'a ParseOptions, scope: Weak<Program>) -> Self {
        Self {
            cursor: Cursor::new(source, &options.filename),
            options,
            scope,
            members: HashMap::new(),
            top_level: HashSet::new(),
            classes: HashSet::new(),
            class_inits: Vec::new(),
            breakpoints: Vec::new(),
            depth: 0,
            loops: 0,
        }
    }

    /// `module := item*`
    pub(crate) fn parse_module(mut self) -> Result<ProgramParts, ParseError> {
        let mut init = Code::new();
        while !self.cursor.at_end()? {
            if let Some(def) = self.cursor.accept(&keyword(Keyword::Def))? {
                let (name, procedure) = self.function(&def, None)?;
                self.declare_top_level(&name, def.line, def.column)?;
                self.members
                    .insert(Name::from(name.as_str()), Value::Procedure(procedure));
            } else if self.cursor.at(&keyword(Keyword::Class))? {
                self.class()?;
            } else {
                self.statement(&mut init)?;
            }
        }
        let end = self.cursor.peek()?.clone();
        let code = self.finish(init, &end)?;
        let init = Procedure::new(MODULE_PROCEDURE, Vec::new(), code, 1, self.scope.clone());

        log::debug!(
            "parsed {}: {} members, {} class initializers, {} breakpoint markers",
            self.options.filename,
            self.members.len(),
            self.class_inits.len(),
            self.breakpoints.len()
        );
        Ok(ProgramParts {
            members: self.members,
            init: Some(Rc::new(init)),
            class_inits: self.class_inits,
            breakpoints: self.breakpoints,
        })
    }

    fn finish(&self, code: Code, at: &Token) -> Result<Vec<Instruction>, ParseError> {
        code.finish()
            .map_err(|kind| self.cursor.error_at(at.line, at.column, kind))
    }

    fn declare_top_level(&mut self, name: &str, line: u32, column: u32) -> Result<(), ParseError> {
        if self.classes.contains(name) {
            return Err(self.cursor.error_at(
                line,
                column,
                SyntaxError::ClassShadowsName(name.to_string()),
            ));
        }
        self.top_level.insert(name.to_string());
        Ok(())
    }

    fn marker(&mut self, code: &mut Code, first_line: u32, last_line: u32) {
        if !self.options.breakpoints {
            return;
        }
        let marker = Rc::new(BreakpointMarker::new(first_line, last_line));
        self.breakpoints.push(marker.clone());
        code.push(Instruction::Breakpoint(marker));
    }

    /// `block := '{' statement* '}'`
    fn block(&mut self, code: &mut Code) -> Result<(), ParseError> {
        self.cursor.expect(&TokenKind::LBrace, "'{'")?;
        while self.cursor.accept(&TokenKind::RBrace)?.is_none() {
            if self.cursor.at_end()? {
                return Err(self.cursor.unexpected("'}'")?);
            }
            self.statement(code)?;
        }
        Ok(())
    }

    fn statement(&mut self, code: &mut Code) -> Result<(), ParseError> {
        let first = self.cursor.peek()?.clone();
        match first.kind {
            TokenKind::Keyword(Keyword::If) => {
                self.marker(code, first.line, first.line);
                self.if_statement(code)
            }
            TokenKind::Keyword(Keyword::While) => {
                self.marker(code, first.line, first.line);
                self.while_statement(code)
            }
            TokenKind::Keyword(Keyword::For) => {
                self.marker(code, first.line, first.line);
                self.for_statement(code)
            }
            TokenKind::Keyword(Keyword::Try) => {
                self.marker(code, first.line, first.line);
                self.try_statement(code)
            }
            TokenKind::Keyword(Keyword::Def) => {
                self.marker(code, first.line, first.line);
                self.cursor.advance()?;
                let (name, procedure) = self.function(&first, None)?;
                code.value(Value::str(&name));
                code.value(Value::Procedure(procedure));
                code.call("set", 2, pos(&first));
                Ok(())
            }
            TokenKind::Keyword(Keyword::Static) => Err(self.cursor.error_at(
                first.line,
                first.column,
                SyntaxError::StaticOutsideClass,
            )),
            _ => self.simple_statement(code, &first),
        }
    }

    /// `return [expr] ';'`, `expr ';'` and `target '=' expr ';'`. The
    /// breakpoint marker spans every line of the statement.
    fn simple_statement(&mut self, code: &mut Code, first: &Token) -> Result<(), ParseError> {
        let mut statement = Code::new();
        if self.cursor.accept(&keyword(Keyword::Return))?.is_some() {
            if self.cursor.at(&TokenKind::Semi)? {
                statement.value(Value::None);
            } else {
                statement.append(self.value_expression()?);
            }
            statement.branch_return();
        } else {
            let target = self.expression()?;
            if let Some(assign) = self.cursor.accept(&TokenKind::Assign)? {
                let value = self.value_expression()?;
                self.assignment(&mut statement, target, value, &assign)?;
            } else {
                statement.append(target.materialize());
                statement.push(Instruction::Discard);
            }
        }
        let semi = self.cursor.expect(&TokenKind::Semi, "';'")?;
        self.marker(code, first.line, semi.line);
        code.append(statement);
        Ok(())
    }

    fn assignment(
        &mut self,
        code: &mut Code,
        target: Expr,
        value: Code,
        assign: &Token,
    ) -> Result<(), ParseError> {
        code.append(target.code);
        match target.tail {
            Tail::Variable(name, at) => {
                if self.depth == 0 {
                    self.declare_top_level(&name, at.line, at.column)?;
                }
                code.assign(&name, value, pos(assign));
            }
            Tail::Member(name, at) => {
                code.value(Value::Str(name));
                code.append(value);
                code.send("setMember", 2, at);
                code.push(Instruction::Discard);
            }
            Tail::Index(at) => {
                code.append(value);
                code.send("__setitem__", 2, at);
                code.push(Instruction::Discard);
            }
            Tail::Done => {
                return Err(self.cursor.error_at(
                    assign.line,
                    assign.column,
                    SyntaxError::InvalidAssignmentTarget,
                ))
            }
        }
        Ok(())
    }

    /// `'(' expr ')'`
    fn condition(&mut self, code: &mut Code) -> Result<(), ParseError> {
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        code.append(self.value_expression()?);
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        Ok(())
    }

    /// `if (c) {..} [elif (c) {..}]* [else {..}]`
    ///
    /// Each arm is `cond, JUMP_IF_FALSE next, block, JUMP end`; the last arm
    /// omits the jump to the end when there is no `else`.
    fn if_statement(&mut self, code: &mut Code) -> Result<(), ParseError> {
        self.cursor.advance()?;
        let mut ends = Vec::new();
        loop {
            self.condition(code)?;
            let next = code.reserve_branch(BranchKind::IfFalse);
            self.block(code)?;

            let more = self.cursor.at(&keyword(Keyword::Elif))?
                || self.cursor.at(&keyword(Keyword::Else))?;
            if more {
                ends.push(code.reserve_branch(BranchKind::Always));
            }
            code.patch_here(next);

            if self.cursor.accept(&keyword(Keyword::Elif))?.is_some() {
                continue;
            }
            if self.cursor.accept(&keyword(Keyword::Else))?.is_some() {
                if self.cursor.accept(&keyword(Keyword::If))?.is_some() {
                    continue;
                }
                self.block(code)?;
            }
            break;
        }
        for end in ends {
            code.patch_here(end);
        }
        Ok(())
    }

    /// `while (c) {..}`: `top: cond, JUMP_IF_FALSE exit, block, JUMP top`.
    fn while_statement(&mut self, code: &mut Code) -> Result<(), ParseError> {
        self.cursor.advance()?;
        let top = code.len();
        self.condition(code)?;
        let exit = code.reserve_branch(BranchKind::IfFalse);
        self.block(code)?;
        code.branch_to(BranchKind::Always, top);
        code.patch_here(exit);
        Ok(())
    }

    /// `for (v : iterable) {..}`, desugared to an index loop over hidden
    /// variables (`iter#n`, `len#n`, `idx#n`). The iterable is evaluated once
    /// and its length is read once before the first iteration.
    fn for_statement(&mut self, code: &mut Code) -> Result<(), ParseError> {
        let for_token = self.cursor.advance()?;
        let at = pos(&for_token);
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        let variable = self.cursor.expect(&TokenKind::Ident, "loop variable")?;
        self.cursor.expect(&TokenKind::Colon, "':'")?;
        let iterable = self.value_expression()?;
        self.cursor.expect(&TokenKind::RParen, "')'")?;

        let n = self.loops;
        self.loops += 1;
        let items = hidden_name("iter", n);
        let length = hidden_name("len", n);
        let index = hidden_name("idx", n);

        code.assign(&items, iterable, at);
        let mut size = Code::new();
        size.load(&items, at);
        size.send("size", 0, at);
        code.assign(&length, size, at);
        let mut zero = Code::new();
        zero.value(Value::Number(0.0));
        code.assign(&index, zero, at);

        code.load(&length, at);
        code.value(Value::Number(0.0));
        code.send("__eq__", 1, at);
        let skip = code.reserve_branch(BranchKind::IfTrue);

        let top = code.len();
        code.load(&index, at);
        code.load(&length, at);
        code.send("__lt__", 1, at);
        let exit = code.reserve_branch(BranchKind::IfFalse);

        let mut item = Code::new();
        item.load(&items, at);
        item.load(&index, at);
        item.send("__index__", 1, at);
        code.assign(&variable.text, item, pos(&variable));

        self.block(code)?;

        let mut step = Code::new();
        step.load(&index, at);
        step.value(Value::Number(1.0));
        step.send("__add__", 1, at);
        code.assign(&index, step, at);
        code.branch_to(BranchKind::Always, top);

        code.patch_here(exit);
        code.patch_here(skip);
        Ok(())
    }

    /// `try {..} catch [: name] {..}`:
    /// `TRY handler, block, END_TRY, JUMP end, handler: CATCH, block, end:`.
    fn try_statement(&mut self, code: &mut Code) -> Result<(), ParseError> {
        self.cursor.advance()?;
        let handler = code.reserve_try();
        self.block(code)?;
        code.push(Instruction::TryExit);
        let end = code.reserve_branch(BranchKind::Always);

        code.patch_here(handler);
        self.cursor.expect(&keyword(Keyword::Catch), "'catch'")?;
        let binding = match self.cursor.accept(&TokenKind::Colon)? {
            Some(_) => {
                let name = self.cursor.expect(&TokenKind::Ident, "variable name")?;
                Some(Name::from(name.text.as_str()))
            }
            None => None,
        };
        code.push(Instruction::Catch { binding });
        self.block(code)?;
        code.patch_here(end);
        Ok(())
    }

    /// `function := IDENT '(' [param (',' param)*] ')' block`, after `def`.
    ///
    /// `owner` qualifies the procedure name for class members.
    fn function(
        &mut self,
        def: &Token,
        owner: Option<&str>,
    ) -> Result<(String, Rc<Procedure>), ParseError> {
        let name = self.cursor.expect(&TokenKind::Ident, "function name")?;
        self.cursor.expect(&TokenKind::LParen, "'('")?;

        let mut params: Vec<Parameter> = Vec::new();
        if self.cursor.accept(&TokenKind::RParen)?.is_none() {
            loop {
                let param = self.cursor.expect(&TokenKind::Ident, "parameter name")?;
                if params.iter().any(|p| p.name.as_ref() == param.text) {
                    return Err(self.cursor.error_at(
                        param.line,
                        param.column,
                        SyntaxError::DuplicateParameter(param.text),
                    ));
                }
                let default = match self.cursor.accept(&TokenKind::Assign)? {
                    Some(_) => Some(self.literal(&param.text)?),
                    None => None,
                };
                params.push(Parameter::new(&param.text, default));
                if self.cursor.accept(&TokenKind::Comma)?.is_none() {
                    self.cursor.expect(&TokenKind::RParen, "')'")?;
                    break;
                }
            }
        }

        self.depth += 1;
        let mut body = Code::new();
        self.block(&mut body)?;
        self.depth -= 1;

        let code = self.finish(body, &name)?;
        let full_name = match owner {
            Some(class) => format!("{class}.{}", name.text),
            None => name.text.clone(),
        };
        let procedure = Procedure::new(&full_name, params, code, def.line, self.scope.clone());
        Ok((name.text, Rc::new(procedure)))
    }

    /// `class Name { member* }`
    ///
    /// `static def` procedures become class statics, plain `def`s become
    /// instance methods, and each `static x = expr;` is compiled into the
    /// class initializer as `VALUE <class>, VALUE "x", expr, SEND setMember/2,
    /// DISCARD` with the class value patched in once the class exists.
    fn class(&mut self) -> Result<(), ParseError> {
        let class_token = self.cursor.advance()?;
        let name = self.cursor.expect(&TokenKind::Ident, "class name")?;
        if self.top_level.contains(&name.text) || self.classes.contains(&name.text) {
            return Err(self.cursor.error_at(
                name.line,
                name.column,
                SyntaxError::ClassShadowsName(name.text),
            ));
        }
        self.cursor.expect(&TokenKind::LBrace, "'{'")?;

        let mut statics: HashMap<Name, Value> = HashMap::new();
        let mut methods: HashMap<Name, Rc<Procedure>> = HashMap::new();
        let mut init = Code::new();
        let mut class_slots = Vec::new();

        while self.cursor.accept(&TokenKind::RBrace)?.is_none() {
            let static_def = self
                .cursor
                .accept_two(&keyword(Keyword::Static), &keyword(Keyword::Def))?;
            if let Some((_, def)) = static_def {
                let (member, procedure) = self.function(&def, Some(&name.text))?;
                statics.insert(Name::from(member.as_str()), Value::Procedure(procedure));
            } else if let Some(static_token) = self.cursor.accept(&keyword(Keyword::Static))? {
                let member = self.cursor.expect(&TokenKind::Ident, "static member name")?;
                self.cursor.expect(&TokenKind::Assign, "'='")?;
                let value = self.value_expression()?;
                let semi = self.cursor.expect(&TokenKind::Semi, "';'")?;

                self.marker(&mut init, static_token.line, semi.line);
                class_slots.push(init.reserve_value());
                init.value(Value::str(&member.text));
                init.append(value);
                init.send("setMember", 2, pos(&member));
                init.push(Instruction::Discard);
            } else if let Some(def) = self.cursor.accept(&keyword(Keyword::Def))? {
                let (member, procedure) = self.function(&def, Some(&name.text))?;
                methods.insert(Name::from(member.as_str()), procedure);
            } else {
                return Err(self.cursor.unexpected("class member")?);
            }
        }

        let class = Rc::new(Class::new(&name.text, statics, methods));
        log::trace!(
            "class {} at line {}: {} static initializers",
            name.text,
            class_token.line,
            class_slots.len()
        );
        class.claim_procedures();
        for slot in class_slots {
            init.patch_value(slot, Value::Class(class.clone()));
        }
        if init.len() > 0 {
            let code = self.finish(init, &name)?;
            let init = Procedure::new(
                &format!("{}.<static>", name.text),
                Vec::new(),
                code,
                class_token.line,
                self.scope.clone(),
            );
            init.set_owner(&class);
            self.class_inits.push(Rc::new(init));
        }

        self.classes.insert(name.text.clone());
        self.members
            .insert(Name::from(name.text.as_str()), Value::Class(class));
        Ok(())
    }
}
