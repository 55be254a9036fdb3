//! Compiled script procedures.

use std::cell::OnceCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::class::Class;
use crate::instruction::Instruction;
use crate::program::Program;
use crate::value::{Name, Value};

/// A declared parameter. Defaults are always literals.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Name,
    pub default: Option<Value>,
}

impl Parameter {
    pub fn new(name: &str, default: Option<Value>) -> Self {
        Self {
            name: Rc::from(name),
            default,
        }
    }
}

/// A `def` after parsing: its signature and a flat instruction list.
///
/// Holds a weak handle to the program it was declared in, which supplies the
/// global scope while it runs. Methods, static procedures and class
/// initializers also link back to their class, whose statics they see as
/// plain names.
pub struct Procedure {
    pub name: Name,
    pub params: Vec<Parameter>,
    pub code: Vec<Instruction>,
    /// Line of the `def` keyword.
    pub line: u32,
    scope: Weak<Program>,
    owner: OnceCell<Weak<Class>>,
}

impl Procedure {
    pub fn new(
        name: &str,
        params: Vec<Parameter>,
        code: Vec<Instruction>,
        line: u32,
        scope: Weak<Program>,
    ) -> Self {
        Self {
            name: Rc::from(name),
            params,
            code,
            line,
            scope,
            owner: OnceCell::new(),
        }
    }

    /// The declaring program, if it is still alive.
    pub fn scope(&self) -> Option<Rc<Program>> {
        self.scope.upgrade()
    }

    /// Attach the declaring class. Only the first call has an effect.
    pub fn set_owner(&self, class: &Rc<Class>) {
        let _ = self.owner.set(Rc::downgrade(class));
    }

    /// The declaring class, for class-scoped code.
    pub fn owner(&self) -> Option<Rc<Class>> {
        self.owner.get().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.name.as_ref()).collect();
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("params", &params)
            .field("instructions", &self.code.len())
            .field("line", &self.line)
            .finish()
    }
}

/// A method looked up on an instance, carrying the receiver bound as `this`.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub procedure: Rc<Procedure>,
}

impl BoundMethod {
    pub fn new(receiver: Value, procedure: Rc<Procedure>) -> Self {
        Self {
            receiver,
            procedure,
        }
    }
}
