//! A parsed script file.
//!
//! The program owns the global scope (member table) its procedures run
//! against, the modules registered by the host, and the initialization
//! procedures produced by the parser. A program that failed to parse keeps
//! its error and re-raises it on every use.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{ParseError, ScriptError};
use crate::instruction::{BreakpointMarker, Instruction};
use crate::procedure::Procedure;
use crate::value::{Name, Value};

/// Everything the parser produces for a successfully parsed file.
#[derive(Debug, Default)]
pub struct ProgramParts {
    /// Top-level `def`s and classes.
    pub members: HashMap<Name, Value>,
    /// Top-level statements, run once by initialization.
    pub init: Option<Rc<Procedure>>,
    /// One static-initializer procedure per class that has static variables.
    pub class_inits: Vec<Rc<Procedure>>,
    pub breakpoints: Vec<Rc<BreakpointMarker>>,
}

pub struct Program {
    filename: Rc<str>,
    digest: [u8; 32],
    members: RefCell<HashMap<Name, Value>>,
    modules: RefCell<Vec<Value>>,
    init: Option<Rc<Procedure>>,
    class_inits: Vec<Rc<Procedure>>,
    breakpoints: Vec<Rc<BreakpointMarker>>,
    error: Option<ParseError>,
    initialized: Cell<bool>,
}

impl Program {
    pub fn new(filename: &str, digest: [u8; 32], parts: ProgramParts) -> Self {
        Self {
            filename: Rc::from(filename),
            digest,
            members: RefCell::new(parts.members),
            modules: RefCell::new(Vec::new()),
            init: parts.init,
            class_inits: parts.class_inits,
            breakpoints: parts.breakpoints,
            error: None,
            initialized: Cell::new(false),
        }
    }

    /// A program that failed to parse.
    pub fn failed(filename: &str, digest: [u8; 32], error: ParseError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(filename, digest, ProgramParts::default())
        }
    }

    pub fn filename(&self) -> &Rc<str> {
        &self.filename
    }

    /// Raw blake3 digest of the source text.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Hex form of [`Program::digest`].
    pub fn source_digest(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Re-raise the recorded parse error, if any.
    pub fn check(&self) -> Result<(), ScriptError> {
        match &self.error {
            Some(error) => Err(ScriptError::Parse(error.clone())),
            None => Ok(()),
        }
    }

    /// Host read of a top-level variable or function.
    pub fn get_member(&self, name: &str) -> Result<Option<Value>, ScriptError> {
        self.check()?;
        Ok(self.member(name))
    }

    /// Host write of a top-level variable.
    pub fn set_member(&self, name: &str, value: Value) -> Result<(), ScriptError> {
        self.check()?;
        self.define(name, value);
        Ok(())
    }

    pub fn member(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.borrow().contains_key(name)
    }

    pub fn define(&self, name: &str, value: Value) {
        self.members.borrow_mut().insert(Rc::from(name), value);
    }

    /// Member names in sorted order.
    pub fn member_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.members.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of the member table.
    pub fn members_snapshot(&self) -> Vec<(Name, Value)> {
        let members = self.members.borrow();
        let mut entries: Vec<(Name, Value)> = members
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Add a host module. Names not found in the program are looked up in
    /// modules, most recently registered first.
    pub fn register_module(&self, module: Value) {
        self.modules.borrow_mut().push(module);
    }

    pub fn modules(&self) -> Vec<Value> {
        self.modules.borrow().iter().rev().cloned().collect()
    }

    pub fn init(&self) -> Option<&Rc<Procedure>> {
        self.init.as_ref()
    }

    pub fn class_inits(&self) -> &[Rc<Procedure>] {
        &self.class_inits
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn mark_initialized(&self) {
        self.initialized.set(true);
    }

    /// Turn breakpoints on `line` on or off. Returns how many statement
    /// markers cover the line.
    pub fn set_breakpoint(&self, line: u32, on: bool) -> usize {
        let mut count = 0;
        for marker in self.breakpoints.iter().filter(|m| m.covers(line)) {
            marker.set_active(on);
            count += 1;
        }
        count
    }

    pub fn breakpoints(&self) -> &[Rc<BreakpointMarker>] {
        &self.breakpoints
    }

    /// Every procedure reachable from this program: the top-level
    /// initializer first, then class initializers, functions, methods and
    /// nested `def`s ordered by line.
    pub fn procedures(&self) -> Vec<Rc<Procedure>> {
        let mut pending: Vec<Rc<Procedure>> = Vec::new();
        pending.extend(self.init.iter().cloned());
        pending.extend(self.class_inits.iter().cloned());
        for value in self.members.borrow().values() {
            match value {
                Value::Procedure(procedure) => pending.push(procedure.clone()),
                Value::Class(class) => {
                    pending.extend(class.methods().cloned());
                    pending.extend(class.static_procedures());
                }
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        while let Some(procedure) = pending.pop() {
            if !seen.insert(Rc::as_ptr(&procedure)) {
                continue;
            }
            for instruction in &procedure.code {
                if let Instruction::Value(Value::Procedure(nested)) = instruction {
                    pending.push(nested.clone());
                }
            }
            found.push(procedure);
        }

        let is_init = |p: &Rc<Procedure>| self.init.as_ref().is_some_and(|i| Rc::ptr_eq(i, p));
        found.sort_by(|a, b| {
            is_init(b)
                .cmp(&is_init(a))
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.name.cmp(&b.name))
        });
        found
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("filename", &self.filename)
            .field("members", &self.member_names())
            .field("modules", &self.modules.borrow().len())
            .field("error", &self.error)
            .field("initialized", &self.initialized.get())
            .finish()
    }
}
