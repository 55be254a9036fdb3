//! The object protocol host values implement, plus native callables.
//!
//! A host registers engine types (vectors, colors, scene nodes, ...) by
//! implementing [`Object`], and host functions/factories by wrapping closures
//! in [`NativeFunction`]. A [`NativeModule`] bundles both into a value that can
//! be registered on a program.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::binder;
use crate::error::RuntimeError;
use crate::procedure::Parameter;
use crate::state::ExecutionState;
use crate::value::{Name, Value};

/// Capability set every host value implements to be usable from scripts.
///
/// Only [`Object::type_name`] is required. The defaults give identity
/// equality, no hash, no members and no call support.
pub trait Object {
    /// Type tag used in messages and as the default string form.
    fn type_name(&self) -> &str;

    /// Read a member. May return a plain value or a [`Value::Native`] bound to
    /// this object.
    fn get_member(&self, state: &mut ExecutionState, name: &str) -> Result<Value, RuntimeError> {
        let _ = state;
        Err(RuntimeError::unknown_member(self.type_name(), name))
    }

    /// Write a member. Read-only unless overridden.
    fn set_member(
        &self,
        state: &mut ExecutionState,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let _ = (state, value);
        Err(RuntimeError::ReadOnlyMember {
            type_name: self.type_name().to_string(),
            member: name.to_string(),
        })
    }

    /// Call a method, as in `obj.name(args)`. The default looks the member up
    /// and invokes it if it is a native function.
    fn call_method(
        &self,
        state: &mut ExecutionState,
        name: &str,
        args: Arguments,
    ) -> Result<Value, RuntimeError> {
        match self.get_member(state, name)? {
            Value::Native(function) => function.call(state, args),
            other => Err(RuntimeError::NotCallable(format!(
                "{}.{name} ({})",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Invoke the object itself, as in `obj(1, 2)` after `obj` was loaded
    /// into a variable.
    fn call(&self, state: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
        let _ = (state, args);
        Err(RuntimeError::NotCallable(self.type_name().to_string()))
    }

    /// Protocol equality. Identity unless overridden.
    fn equals(&self, other: &dyn Object) -> bool {
        std::ptr::eq(
            self as *const Self as *const (),
            other as *const dyn Object as *const (),
        )
    }

    /// Hash used when the object is a map or set key. `None` means the
    /// object cannot be a key.
    fn hash_key(&self) -> Option<u64> {
        None
    }

    /// String form seen by scripts.
    fn describe(&self) -> String {
        format!("<{}>", self.type_name())
    }
}

/// One call argument, optionally tagged with a keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<Name>,
    pub value: Value,
}

impl Argument {
    pub fn positional(value: Value) -> Self {
        Self { name: None, value }
    }

    pub fn keyword(name: &str, value: Value) -> Self {
        Self {
            name: Some(Rc::from(name)),
            value,
        }
    }
}

/// The arguments of one call, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    items: Vec<Argument>,
}

impl Arguments {
    pub fn new(items: Vec<Argument>) -> Self {
        Self { items }
    }

    /// All-positional arguments.
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            items: values.into_iter().map(Argument::positional).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.items.iter()
    }

    /// Argument values, ignoring keyword tags.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(|arg| &arg.value)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index).map(|arg| &arg.value)
    }

    pub fn into_vec(self) -> Vec<Argument> {
        self.items
    }

    /// Fail unless exactly `count` arguments were given.
    pub fn expect_len(&self, function: &str, count: usize) -> Result<(), RuntimeError> {
        if self.items.len() > count {
            return Err(RuntimeError::TooManyArguments {
                function: function.to_string(),
                expected: count,
                found: self.items.len(),
            });
        }
        if self.items.len() < count {
            return Err(RuntimeError::MissingArgument {
                function: function.to_string(),
                parameter: format!("#{}", self.items.len() + 1),
            });
        }
        Ok(())
    }

    /// The argument at `index`, or a missing-argument error.
    pub fn expect(&self, function: &str, index: usize) -> Result<&Value, RuntimeError> {
        self.get(index).ok_or_else(|| RuntimeError::MissingArgument {
            function: function.to_string(),
            parameter: format!("#{}", index + 1),
        })
    }

    /// The numeric argument at `index`.
    pub fn number(&self, function: &str, index: usize) -> Result<f64, RuntimeError> {
        let value = self.expect(function, index)?;
        value
            .as_number()
            .ok_or_else(|| RuntimeError::type_mismatch(function, "number", value.type_name()))
    }

    /// Bind against a declared parameter list with the script binder rules.
    pub fn bind(
        self,
        function: &str,
        params: &[Parameter],
    ) -> Result<HashMap<Name, Value>, RuntimeError> {
        binder::bind(function, params, self.items)
    }
}

/// Signature of host callables. The interpreter pops the call's arguments,
/// hands them over, and pushes whatever comes back.
pub type NativeFn = dyn Fn(&mut ExecutionState, Arguments) -> Result<Value, RuntimeError>;

/// A named host or built-in callable.
pub struct NativeFunction {
    name: Name,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut ExecutionState, Arguments) -> Result<Value, RuntimeError> + 'static,
    {
        Self {
            name: Rc::from(name),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, state: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
        (self.func)(state, args)
    }

    pub fn into_value(self) -> Value {
        Value::Native(Rc::new(self))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A named bundle of host functions and constants.
///
/// ```
/// use glint_common::{NativeModule, Value};
///
/// let engine = NativeModule::new("engine")
///     .with_value("GRAVITY", Value::Number(9.81))
///     .with_function("twice", |_, args| Ok(Value::Number(args.number("twice", 0)? * 2.0)));
/// let module = engine.into_value();
/// assert_eq!(module.type_name(), "module");
/// ```
pub struct NativeModule {
    name: Name,
    members: RefCell<HashMap<Name, Value>>,
}

impl NativeModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            members: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_value(self, name: &str, value: Value) -> Self {
        self.members.borrow_mut().insert(Rc::from(name), value);
        self
    }

    pub fn with_function<F>(self, name: &str, func: F) -> Self
    where
        F: Fn(&mut ExecutionState, Arguments) -> Result<Value, RuntimeError> + 'static,
    {
        let native = NativeFunction::new(name, func).into_value();
        self.with_value(name, native)
    }

    pub fn into_value(self) -> Value {
        Value::Object(Rc::new(self))
    }
}

impl Object for NativeModule {
    fn type_name(&self) -> &str {
        "module"
    }

    fn get_member(&self, _state: &mut ExecutionState, name: &str) -> Result<Value, RuntimeError> {
        self.members
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_member(&self.name, name))
    }

    fn describe(&self) -> String {
        format!("<module {}>", self.name)
    }
}
