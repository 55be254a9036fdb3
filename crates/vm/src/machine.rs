//! Interpreter state for one run: frames, name resolution and calls.

use std::collections::HashMap;
use std::rc::Rc;

use glint_common::class::{CONSTRUCTOR, TYPE_MEMBER};
use glint_common::{
    is_hidden, Argument, Arguments, BoundMethod, CallSite, Caller, Class, ExecutionState,
    Instance, Name, NativeFunction, Pos, Procedure, Program, RuntimeError, ScriptError, Value,
};

use crate::builtins;

/// Local binding for the receiver of a method call.
pub const THIS: &str = "this";

/// Where an error is reported when it has no instruction of its own.
#[derive(Debug, Clone)]
pub(crate) struct Site {
    file: Rc<str>,
    pos: Pos,
}

impl Site {
    /// Calls made directly by the host.
    pub(crate) fn host() -> Self {
        Self {
            file: Rc::from("<host>"),
            pos: Pos::default(),
        }
    }

    pub(crate) fn locate(&self, error: RuntimeError) -> ScriptError {
        ScriptError::located(&self.file, self.pos.line, self.pos.column, error)
    }
}

/// The variables a frame reads and writes.
pub(crate) enum Locals {
    /// A procedure call: a fresh table per call.
    Procedure(HashMap<Name, Value>),
    /// Top-level and class static-init code: the program member table, plus
    /// the frame's own hidden variables.
    Module {
        program: Rc<Program>,
        hidden: HashMap<Name, Value>,
    },
}

impl Locals {
    fn module(program: Rc<Program>) -> Self {
        Locals::Module {
            program,
            hidden: HashMap::new(),
        }
    }

    /// The frame's own variables. Module code owns only its hidden ones;
    /// everything else it sees is a program member.
    fn get(&self, name: &str) -> Option<Value> {
        match self {
            Locals::Procedure(locals) => locals.get(name).cloned(),
            Locals::Module { hidden, .. } => hidden.get(name).cloned(),
        }
    }

    fn snapshot(&self) -> Vec<(Name, Value)> {
        match self {
            Locals::Procedure(locals) => {
                let mut entries: Vec<(Name, Value)> = locals
                    .iter()
                    .filter(|(name, _)| !is_hidden(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                entries
            }
            Locals::Module { program, .. } => program.members_snapshot(),
        }
    }
}

/// An active `try` region of a frame.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Handler {
    /// Index of the `Catch` instruction.
    pub(crate) target: usize,
    /// Operand stack depth when the region was entered.
    pub(crate) depth: usize,
}

/// One procedure invocation.
pub(crate) struct Frame {
    pub(crate) procedure: Rc<Procedure>,
    pub(crate) program: Rc<Program>,
    pub(crate) locals: Locals,
    /// Class whose statics are visible as plain names.
    pub(crate) class: Option<Rc<Class>>,
    pub(crate) stack: Vec<Value>,
    pub(crate) handlers: Vec<Handler>,
    pub(crate) pc: usize,
    /// Position of the last instruction that carried one.
    pub(crate) pos: Pos,
    max_stack: usize,
}

impl Frame {
    pub(crate) fn new(
        procedure: Rc<Procedure>,
        program: Rc<Program>,
        locals: Locals,
        max_stack: usize,
    ) -> Self {
        let pos = Pos::new(procedure.line, 1);
        let class = procedure.owner();
        Self {
            procedure,
            program,
            locals,
            class,
            stack: Vec::new(),
            handlers: Vec::new(),
            pc: 0,
            pos,
            max_stack,
        }
    }

    pub(crate) fn site(&self) -> Site {
        Site {
            file: self.program.filename().clone(),
            pos: self.pos,
        }
    }

    pub(crate) fn locate(&self, error: RuntimeError) -> ScriptError {
        self.site().locate(error)
    }

    pub(crate) fn internal(&self, what: &str) -> ScriptError {
        ScriptError::Internal(format!(
            "{} in {} at instruction {}",
            what, self.procedure.name, self.pc
        ))
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<(), ScriptError> {
        if self.stack.len() >= self.max_stack {
            return Err(self.locate(RuntimeError::StackOverflow {
                limit: self.max_stack,
            }));
        }
        self.stack.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Value, ScriptError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.internal("operand stack underflow")),
        }
    }

    /// Pop the arguments of a call, tagging keyword arguments.
    pub(crate) fn pop_args(&mut self, site: &CallSite) -> Result<Arguments, ScriptError> {
        let argc = site.argc();
        if self.stack.len() < argc {
            return Err(self.internal("operand stack underflow"));
        }
        let values = self.stack.split_off(self.stack.len() - argc);
        let args = values
            .into_iter()
            .zip(site.keywords.iter())
            .map(|(value, name)| Argument {
                name: name.clone(),
                value,
            })
            .collect();
        Ok(Arguments::new(args))
    }

    /// Locals first, then statics of the enclosing class, then the members
    /// of the declaring program.
    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .get(name)
            .or_else(|| self.class.as_ref().and_then(|class| class.get_static(name)))
            .or_else(|| self.program.member(name))
    }

    /// The `set` rule: overwrite an existing local, else an existing static
    /// of the enclosing class, else an existing program member, else create
    /// a new local. Module code has no locals of its own beyond hidden
    /// variables, so its new names become program members.
    pub(crate) fn assign(&mut self, name: Name, value: Value) {
        let static_owner = |class: &Option<Rc<Class>>| {
            class.as_ref().filter(|class| class.has_static(&name)).cloned()
        };
        match &mut self.locals {
            Locals::Module { hidden, .. } if is_hidden(&name) => {
                hidden.insert(name, value);
            }
            Locals::Module { program, .. } => match static_owner(&self.class) {
                Some(class) => class.set_static(&name, value),
                None => program.define(&name, value),
            },
            Locals::Procedure(locals) => {
                if let Some(slot) = locals.get_mut(&name) {
                    *slot = value;
                } else if let Some(class) = static_owner(&self.class) {
                    class.set_static(&name, value);
                } else if self.program.has_member(&name) {
                    self.program.define(&name, value);
                } else {
                    locals.insert(name, value);
                }
            }
        }
    }
}

/// Runs procedures against one [`ExecutionState`].
pub struct Machine<'s> {
    pub(crate) state: &'s mut ExecutionState,
}

impl<'s> Machine<'s> {
    pub fn new(state: &'s mut ExecutionState) -> Self {
        Self { state }
    }

    pub fn state(&mut self) -> &mut ExecutionState {
        &mut *self.state
    }

    /// Run the class static initializers and then the top-level code, once
    /// per program. Later calls only re-check for a parse error.
    pub fn initialize(&mut self, program: &Rc<Program>) -> Result<(), ScriptError> {
        program.check()?;
        if program.is_initialized() {
            return Ok(());
        }
        program.mark_initialized();
        log::debug!(
            "initializing {} ({} class initializers)",
            program.filename(),
            program.class_inits().len()
        );
        for init in program.class_inits() {
            self.run_module_code(program, init)?;
        }
        if let Some(init) = program.init() {
            self.run_module_code(program, init)?;
        }
        Ok(())
    }

    /// Call any callable value from the host.
    pub fn invoke(&mut self, callee: &Value, args: Arguments) -> Result<Value, ScriptError> {
        self.invoke_value(&Site::host(), callee, None, args)
    }

    fn run_module_code(
        &mut self,
        program: &Rc<Program>,
        procedure: &Rc<Procedure>,
    ) -> Result<Value, ScriptError> {
        let frame = Frame::new(
            procedure.clone(),
            program.clone(),
            Locals::module(program.clone()),
            self.state.limits.max_stack_depth,
        );
        self.run_frame(frame)
    }

    /// Push a caller snapshot, execute, and pop it again on every path.
    fn run_frame(&mut self, mut frame: Frame) -> Result<Value, ScriptError> {
        let caller = Caller::new(
            frame.procedure.name.clone(),
            frame.program.filename().clone(),
            frame.procedure.line,
        );
        self.state
            .push_caller(caller)
            .map_err(|e| frame.locate(e))?;
        log::trace!(
            "enter {} (depth {})",
            frame.procedure.name,
            self.state.call_stack.len()
        );

        let result = self.execute(&mut frame);

        self.state.exit_try(frame.handlers.len());
        self.state.pop_caller();
        result
    }

    /// Refresh the innermost caller snapshot from a frame, if a host
    /// callback could look at it.
    pub(crate) fn sync_caller(&mut self, frame: &Frame) {
        if !self.state.wants_snapshots() {
            return;
        }
        if let Some(caller) = self.state.current_caller() {
            caller.line = frame.pos.line;
            caller.locals = frame.locals.snapshot();
        }
    }

    // ---- Calls ----

    /// Dispatch a call to any callable value. `receiver` becomes `this` when
    /// the callee is a procedure.
    pub(crate) fn invoke_value(
        &mut self,
        site: &Site,
        callee: &Value,
        receiver: Option<Value>,
        args: Arguments,
    ) -> Result<Value, ScriptError> {
        match callee {
            Value::Procedure(procedure) => self.run_procedure(site, procedure, receiver, args),
            Value::BoundMethod(method) => self.run_procedure(
                site,
                &method.procedure,
                Some(method.receiver.clone()),
                args,
            ),
            Value::Class(class) => self.instantiate(site, class, args),
            Value::Native(function) => function.call(self.state, args).map_err(|e| site.locate(e)),
            Value::Object(object) => object.call(self.state, args).map_err(|e| site.locate(e)),
            other => Err(site.locate(RuntimeError::NotCallable(
                other.type_name().to_string(),
            ))),
        }
    }

    pub(crate) fn run_procedure(
        &mut self,
        site: &Site,
        procedure: &Rc<Procedure>,
        receiver: Option<Value>,
        args: Arguments,
    ) -> Result<Value, ScriptError> {
        let program = procedure.scope().ok_or_else(|| {
            ScriptError::Internal(format!("procedure {} outlived its program", procedure.name))
        })?;
        let mut locals = args
            .bind(&procedure.name, &procedure.params)
            .map_err(|e| site.locate(e))?;
        if let Some(receiver) = receiver {
            locals.insert(Name::from(THIS), receiver);
        }
        let frame = Frame::new(
            procedure.clone(),
            program,
            Locals::Procedure(locals),
            self.state.limits.max_stack_depth,
        );
        self.run_frame(frame)
    }

    /// Allocate an instance and run `__init__` on it with the call's
    /// arguments.
    fn instantiate(
        &mut self,
        site: &Site,
        class: &Rc<Class>,
        args: Arguments,
    ) -> Result<Value, ScriptError> {
        let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
        match class.method(CONSTRUCTOR) {
            Some(init) => {
                let init = init.clone();
                self.run_procedure(site, &init, Some(instance.clone()), args)?;
            }
            None if !args.is_empty() => {
                return Err(site.locate(RuntimeError::TooManyArguments {
                    function: class.name().to_string(),
                    expected: 0,
                    found: args.len(),
                }));
            }
            None => {}
        }
        Ok(instance)
    }

    /// A call by name without a receiver: locals, program members, host
    /// modules, then built-ins.
    pub(crate) fn call_function(
        &mut self,
        frame: &Frame,
        name: &str,
        args: Arguments,
    ) -> Result<Value, ScriptError> {
        let site = frame.site();
        let callee = match frame.lookup(name) {
            Some(callee) => callee,
            None => match self
                .from_modules(&frame.program, name)
                .map_err(|e| site.locate(e))?
            {
                Some(callee) => callee,
                None => {
                    if let Some(method) = builtins::forwarded(name) {
                        let receiver =
                            builtins::forward_receiver(name, args).map_err(|e| site.locate(e))?;
                        return self.send(&site, receiver, method, Arguments::default());
                    }
                    let builtin = builtins::lookup(name).ok_or_else(|| {
                        site.locate(RuntimeError::UnknownFunction(name.to_string()))
                    })?;
                    return builtin(self.state, args).map_err(|e| site.locate(e));
                }
            },
        };
        self.invoke_value(&site, &callee, None, args)
    }

    /// A call by name on a receiver (`receiver.name(args)` and operators).
    pub(crate) fn send(
        &mut self,
        site: &Site,
        receiver: Value,
        name: &str,
        args: Arguments,
    ) -> Result<Value, ScriptError> {
        match &receiver {
            Value::Instance(instance) => {
                if name != TYPE_MEMBER {
                    if let Some(member) = instance.get(name) {
                        return self.invoke_value(site, &member, Some(receiver.clone()), args);
                    }
                }
                if let Some(method) = instance.class().method(name).cloned() {
                    return self.run_procedure(site, &method, Some(receiver.clone()), args);
                }
            }
            Value::Class(class) => {
                if let Some(member) = class.get_static(name) {
                    return self.invoke_value(site, &member, None, args);
                }
            }
            Value::Object(object) if !crate::methods::is_universal(name) => {
                return object
                    .call_method(self.state, name, args)
                    .map_err(|e| site.locate(e));
            }
            _ => {}
        }
        crate::methods::call_method(&receiver, name, args).map_err(|e| site.locate(e))
    }

    // ---- Members and names ----

    /// Member read. Instance methods come back bound to the instance.
    pub(crate) fn get_member(&mut self, receiver: &Value, name: &str) -> Result<Value, RuntimeError> {
        let found = match receiver {
            Value::Instance(instance) => instance.get(name).or_else(|| {
                instance.class().method(name).map(|method| {
                    Value::BoundMethod(Rc::new(BoundMethod::new(receiver.clone(), method.clone())))
                })
            }),
            Value::Class(class) => class.get_static(name),
            Value::Object(object) => return object.get_member(self.state, name),
            Value::Pair(pair) => match name {
                "first" => Some(pair.0.clone()),
                "second" => Some(pair.1.clone()),
                _ => None,
            },
            _ => None,
        };
        found.ok_or_else(|| RuntimeError::unknown_member(receiver.type_name(), name))
    }

    pub(crate) fn set_member(
        &mut self,
        receiver: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match receiver {
            Value::Instance(instance) => instance.set(name, value),
            Value::Class(class) => class.set_static(name, value),
            Value::Object(object) => object.set_member(self.state, name, value)?,
            other => {
                return Err(RuntimeError::ReadOnlyMember {
                    type_name: other.type_name().to_string(),
                    member: name.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Search the program's host modules for a name. A module without the
    /// member is skipped; any other failure is reported.
    fn from_modules(&mut self, program: &Program, name: &str) -> Result<Option<Value>, RuntimeError> {
        for module in program.modules() {
            match self.get_member(&module, name) {
                Ok(value) => return Ok(Some(value)),
                Err(RuntimeError::UnknownMember { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// A variable read: locals, program members, host modules, then
    /// built-in functions as values.
    pub(crate) fn load(&mut self, frame: &Frame, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = frame.lookup(name) {
            return Ok(value);
        }
        if let Some(value) = self.from_modules(&frame.program, name)? {
            return Ok(value);
        }
        builtins::lookup(name)
            .map(|builtin| NativeFunction::new(name, builtin).into_value())
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))
    }
}
