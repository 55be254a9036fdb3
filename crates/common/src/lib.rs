//! Glint common types.
//!
//! This crate holds everything the parser, interpreter and verifier share:
//!
//! - [`Value`]: runtime values, with host types plugged in through [`Object`]
//! - [`Instruction`]: the flat, branch-patched instruction lists
//! - [`Procedure`], [`Class`], [`Instance`]: compiled script definitions
//! - [`Program`]: a parsed file and its global scope
//! - [`ExecutionState`]: per-run call stack and debugging callbacks
//! - [`binder::bind`]: positional/keyword parameter binding
//! - [`ScriptError`] and friends
//!
//! Values are reference counted with `Rc`, so a program and everything
//! reachable from it stays on one thread.

pub mod binder;
pub mod class;
pub mod collections;
pub mod error;
pub mod instruction;
pub mod object;
pub mod procedure;
pub mod program;
pub mod state;
pub mod value;

// Re-export commonly used types at the crate root.
pub use class::{Class, Instance};
pub use collections::{HashKey, ScriptMap, ScriptSet};
pub use error::{LocatedError, ParseError, RuntimeError, ScriptError, SyntaxError};
pub use instruction::{
    hidden_name, is_hidden, BranchKind, BreakpointMarker, CallSite, Instruction, Pos,
    RETURN_OFFSET,
};
pub use object::{Argument, Arguments, NativeFunction, NativeModule, Object};
pub use procedure::{BoundMethod, Parameter, Procedure};
pub use program::{Program, ProgramParts};
pub use state::{BreakpointAction, Caller, ExecutionState, Limits};
pub use value::{Name, Value};
