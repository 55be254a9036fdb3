//! Glint interpreter: runs parsed programs.
//!
//! Each procedure call gets its own operand stack, locals and `try`
//! handlers. Errors unwind frame by frame until a `catch` takes them or
//! they reach the host.
//!
//! # Usage
//!
//! ```
//! use glint_common::{Arguments, ExecutionState, Value};
//! use glint_parser::parse_program;
//!
//! let program = parse_program("def twice(x) { return x * 2; }\nbase = 20;\n", "demo.gl");
//! let mut state = ExecutionState::new();
//! glint_vm::initialize(&mut state, &program).unwrap();
//!
//! let args = Arguments::positional(vec![Value::Number(21.0)]);
//! let result = glint_vm::call_member(&mut state, &program, "twice", args).unwrap();
//! assert_eq!(result, Value::Number(42.0));
//! assert_eq!(program.get_member("base").unwrap(), Some(Value::Number(20.0)));
//! ```

pub mod builtins;
mod execute;
pub mod machine;
mod methods;

pub use machine::{Machine, THIS};

use std::rc::Rc;

use glint_common::{Arguments, ExecutionState, Program, RuntimeError, ScriptError, Value};

/// Run a program's class static initializers and top-level code. Does
/// nothing after the first successful call; a program that failed to parse
/// returns its parse error every time.
///
/// # Errors
///
/// Returns [`ScriptError`] if the program failed to parse or its top-level
/// code raised an uncaught error.
pub fn initialize(state: &mut ExecutionState, program: &Rc<Program>) -> Result<(), ScriptError> {
    Machine::new(state).initialize(program)
}

/// Call a top-level member of a program by name, initializing it first.
///
/// # Errors
///
/// Returns [`ScriptError`] if the member does not exist, is not callable,
/// or the call fails.
pub fn call_member(
    state: &mut ExecutionState,
    program: &Rc<Program>,
    name: &str,
    args: Arguments,
) -> Result<Value, ScriptError> {
    let mut machine = Machine::new(state);
    machine.initialize(program)?;
    let callee = program.get_member(name)?.ok_or_else(|| {
        ScriptError::located(
            program.filename(),
            0,
            0,
            RuntimeError::UnknownFunction(name.to_string()),
        )
    })?;
    machine.invoke(&callee, args)
}

/// Call any callable value (procedure, bound method, class, native or host
/// object) with the given arguments.
///
/// # Errors
///
/// Returns [`ScriptError`] if the value is not callable or the call fails.
pub fn invoke(state: &mut ExecutionState, callee: &Value, args: Arguments) -> Result<Value, ScriptError> {
    Machine::new(state).invoke(callee, args)
}
