//! Per-run execution state: the diagnostic call stack, host debugging
//! callbacks, limits and the output sink used by `print`.

use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::error::{RuntimeError, ScriptError};
use crate::value::{Name, Value};

/// Default maximum number of nested procedure calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Default maximum operand stack depth per call.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 4096;

/// Default maximum number of elements `range` may produce.
pub const DEFAULT_MAX_RANGE_LENGTH: usize = 1 << 20;

/// What a breakpoint handler wants the interpreter to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointAction {
    /// Resume until the next active breakpoint.
    Continue,
    /// Resume, stopping again at the next statement.
    Step,
    /// Stop the run with [`ScriptError::Terminated`].
    Terminate,
}

/// Diagnostic snapshot of one procedure invocation.
///
/// `line` and `locals` are refreshed whenever the stack is handed to a host
/// callback; they are copies, never live references into the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub function: Name,
    pub file: Rc<str>,
    pub line: u32,
    pub locals: Vec<(Name, Value)>,
}

impl Caller {
    pub fn new(function: Name, file: Rc<str>, line: u32) -> Self {
        Self {
            function,
            file,
            line,
            locals: Vec::new(),
        }
    }

    /// The snapshot value of a local, if present.
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .find(|(local, _)| local.as_ref() == name)
            .map(|(_, value)| value)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.function, self.file, self.line)
    }
}

/// Resource limits enforced by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_call_depth: usize,
    pub max_stack_depth: usize,
    pub max_range_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_range_length: DEFAULT_MAX_RANGE_LENGTH,
        }
    }
}

pub type BreakpointHandler = dyn FnMut(&[Caller]) -> BreakpointAction;
pub type ExceptionHandler = dyn FnMut(&ScriptError, &[Caller]);

/// State threaded through every call of one run.
pub struct ExecutionState {
    /// Innermost call last.
    pub call_stack: Vec<Caller>,
    pub limits: Limits,
    /// Stop at every breakpoint marker, active or not.
    pub step_mode: bool,
    breakpoint_handler: Option<Box<BreakpointHandler>>,
    exception_handler: Option<Box<ExceptionHandler>>,
    terminated: bool,
    active_handlers: usize,
    output: Box<dyn Write>,
}

impl ExecutionState {
    /// A state printing to stdout with default limits.
    pub fn new() -> Self {
        Self {
            call_stack: Vec::new(),
            limits: Limits::default(),
            step_mode: false,
            breakpoint_handler: None,
            exception_handler: None,
            terminated: false,
            active_handlers: 0,
            output: Box::new(io::stdout()),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Redirect `print` output.
    pub fn with_output<W: Write + 'static>(mut self, output: W) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn set_breakpoint_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&[Caller]) -> BreakpointAction + 'static,
    {
        self.breakpoint_handler = Some(Box::new(handler));
    }

    pub fn set_exception_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&ScriptError, &[Caller]) + 'static,
    {
        self.exception_handler = Some(Box::new(handler));
    }

    pub fn has_breakpoint_handler(&self) -> bool {
        self.breakpoint_handler.is_some()
    }

    /// Whether host callbacks may look at caller snapshots, so the
    /// interpreter should keep `line`/`locals` current.
    pub fn wants_snapshots(&self) -> bool {
        self.breakpoint_handler.is_some() || self.exception_handler.is_some()
    }

    /// Request that the run stop at the next breakpoint marker.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn clear_termination(&mut self) {
        self.terminated = false;
    }

    /// Write one line of script output.
    pub fn print(&mut self, text: &str) -> Result<(), RuntimeError> {
        writeln!(self.output, "{text}").map_err(|e| RuntimeError::Output(e.to_string()))
    }

    pub fn enter_try(&mut self) {
        self.active_handlers += 1;
    }

    /// Forget `count` try handlers (normal exit or unwinding).
    pub fn exit_try(&mut self, count: usize) {
        self.active_handlers = self.active_handlers.saturating_sub(count);
    }

    /// Whether any `try` region is active anywhere in the run.
    pub fn in_try(&self) -> bool {
        self.active_handlers > 0
    }

    /// Hand the call stack to the breakpoint handler. Without a handler the
    /// run simply continues.
    pub fn fire_breakpoint(&mut self) -> BreakpointAction {
        let Some(handler) = self.breakpoint_handler.as_mut() else {
            return BreakpointAction::Continue;
        };
        let action = handler(&self.call_stack);
        match action {
            BreakpointAction::Continue => self.step_mode = false,
            BreakpointAction::Step => self.step_mode = true,
            BreakpointAction::Terminate => self.terminated = true,
        }
        action
    }

    /// Hand an uncaught error to the exception handler, if one is set.
    /// Returns whether a handler saw it.
    pub fn report_exception(&mut self, error: &ScriptError) -> bool {
        match self.exception_handler.as_mut() {
            Some(handler) => {
                handler(error, &self.call_stack);
                true
            }
            None => false,
        }
    }

    /// Push a frame, enforcing the call-depth limit.
    pub fn push_caller(&mut self, caller: Caller) -> Result<(), RuntimeError> {
        if self.call_stack.len() >= self.limits.max_call_depth {
            return Err(RuntimeError::RecursionLimit {
                limit: self.limits.max_call_depth,
            });
        }
        self.call_stack.push(caller);
        Ok(())
    }

    pub fn pop_caller(&mut self) -> Option<Caller> {
        self.call_stack.pop()
    }

    /// Innermost caller frame.
    pub fn current_caller(&mut self) -> Option<&mut Caller> {
        self.call_stack.last_mut()
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionState")
            .field("call_stack", &self.call_stack)
            .field("limits", &self.limits)
            .field("step_mode", &self.step_mode)
            .field("terminated", &self.terminated)
            .field("active_handlers", &self.active_handlers)
            .finish_non_exhaustive()
    }
}
