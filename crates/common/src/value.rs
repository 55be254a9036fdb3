//! Runtime value representation.
//!
//! Built-in value kinds form a closed enum; host engine types plug in through
//! [`Value::Object`] and the [`Object`] trait. Immutable kinds (numbers,
//! strings, booleans) are plain values; containers and instances are shared,
//! interior-mutable handles compared by identity.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::class::{Class, Instance};
use crate::collections::{HashKey, ScriptMap, ScriptSet};
use crate::error::RuntimeError;
use crate::object::{NativeFunction, Object};
use crate::procedure::{BoundMethod, Procedure};

/// Interned-ish identifier type used for variable, member and parameter names.
pub type Name = Rc<str>;

/// A script-visible value.
#[derive(Clone)]
pub enum Value {
    /// The singleton absence marker (`null` in source).
    None,
    Bool(bool),
    /// Double-precision number. Integer contexts go through [`Value::as_i32`].
    Number(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<ScriptMap>>),
    Set(Rc<RefCell<ScriptSet>>),
    Pair(Rc<(Value, Value)>),
    Procedure(Rc<Procedure>),
    /// A procedure bound to its receiver (`this`).
    BoundMethod(Rc<BoundMethod>),
    /// A host or built-in callable.
    Native(Rc<NativeFunction>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    /// Any host value implementing the object protocol.
    Object(Rc<dyn Object>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn pair(first: Value, second: Value) -> Self {
        Value::Pair(Rc::new((first, second)))
    }

    /// Build a map from key/value pairs. Fails if a key is not hashable.
    pub fn map(entries: Vec<(Value, Value)>) -> Result<Self, RuntimeError> {
        let mut map = ScriptMap::new();
        for (key, value) in entries {
            map.insert(HashKey::new(key)?, value);
        }
        Ok(Value::Map(Rc::new(RefCell::new(map))))
    }

    /// Build a set from values. Fails if a value is not hashable.
    pub fn set(items: Vec<Value>) -> Result<Self, RuntimeError> {
        let mut set = ScriptSet::new();
        for item in items {
            set.insert(HashKey::new(item)?);
        }
        Ok(Value::Set(Rc::new(RefCell::new(set))))
    }

    /// Short type tag used in error messages and `typeOf`.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Pair(_) => "pair",
            Value::Procedure(_) => "procedure",
            Value::BoundMethod(_) => "method",
            Value::Native(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(instance) => instance.class().name(),
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Whether invoking this value runs code (as opposed to reading it).
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Procedure(_) | Value::BoundMethod(_) | Value::Native(_) | Value::Class(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a 32-bit integer, if it is an integral number in range.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Number(n)
                if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 =>
            {
                Some(*n as i32)
            }
            _ => None,
        }
    }

    /// The value as a 16-bit integer, if it is an integral number in range.
    pub fn as_i16(&self) -> Option<i16> {
        self.as_i32().and_then(|n| i16::try_from(n).ok())
    }

    /// Interpret the value as an index into a container of `length` items.
    pub fn as_index(&self, length: usize) -> Result<usize, RuntimeError> {
        let n = match self {
            Value::Number(n) => *n,
            other => {
                return Err(RuntimeError::type_mismatch(
                    "indexing",
                    "number",
                    other.type_name(),
                ))
            }
        };
        let index = self
            .as_i32()
            .ok_or(RuntimeError::IntegerOutOfRange { value: n, bits: 32 })?;
        if index < 0 || index as usize >= length {
            return Err(RuntimeError::IndexOutOfBounds {
                index: index as i64,
                length,
            });
        }
        Ok(index as usize)
    }

    /// Protocol equality: by value for numbers, strings, booleans, none and
    /// pairs; by identity for everything else unless a host object says
    /// otherwise.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => {
                Rc::ptr_eq(a, b) || (a.0.equals(&b.0) && a.1.equals(&b.1))
            }
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                Rc::ptr_eq(&a.procedure, &b.procedure) && a.receiver.equals(&b.receiver)
            }
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.equals(b.as_ref()),
            _ => false,
        }
    }

    /// Protocol hash, consistent with [`Value::equals`].
    pub fn hash_code(&self) -> Result<u64, RuntimeError> {
        let mut hasher = DefaultHasher::new();
        match self {
            Value::None => 0u8.hash(&mut hasher),
            Value::Bool(b) => (1u8, *b).hash(&mut hasher),
            Value::Number(n) => {
                // 0.0 and -0.0 compare equal, so they must hash equal.
                let n = if *n == 0.0 { 0.0 } else { *n };
                (2u8, n.to_bits()).hash(&mut hasher)
            }
            Value::Str(s) => (3u8, s.as_ref()).hash(&mut hasher),
            Value::Pair(p) => (4u8, p.0.hash_code()?, p.1.hash_code()?).hash(&mut hasher),
            Value::BoundMethod(m) => {
                (5u8, Rc::as_ptr(&m.procedure) as usize, m.receiver.hash_code()?)
                    .hash(&mut hasher)
            }
            Value::List(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Map(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Set(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Procedure(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Native(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Class(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Instance(r) => identity(&mut hasher, Rc::as_ptr(r) as *const ()),
            Value::Object(object) => {
                let key = object
                    .hash_key()
                    .ok_or_else(|| RuntimeError::Unhashable(object.type_name().to_string()))?;
                (7u8, key).hash(&mut hasher)
            }
        }
        Ok(hasher.finish())
    }
}

fn identity(hasher: &mut DefaultHasher, ptr: *const ()) {
    (6u8, ptr as usize).hash(hasher)
}

/// Format a number the way scripts print it: integral values without a
/// fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

/// The string form scripts see (`str(x)`, `print`, string concatenation).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {value}", key.value())?;
                }
                write!(f, "}}")
            }
            Value::Set(set) => {
                write!(f, "{{")?;
                for (i, key) in set.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", key.value())?;
                }
                write!(f, "}}")
            }
            Value::Pair(pair) => write!(f, "({}, {})", pair.0, pair.1),
            Value::Procedure(p) => write!(f, "<procedure {}>", p.name),
            Value::BoundMethod(m) => write!(f, "<method {}>", m.procedure.name),
            Value::Native(n) => write!(f, "<function {}>", n.name()),
            Value::Class(c) => write!(f, "<class {}>", c.name()),
            Value::Instance(i) => write!(f, "<{} instance>", i.class().name()),
            Value::Object(o) => write!(f, "{}", o.describe()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(&items.borrow()).finish(),
            Value::Pair(pair) => f.debug_tuple("Pair").field(&pair.0).field(&pair.1).finish(),
            other => write!(f, "{}({other})", other.type_name()),
        }
    }
}
