//! Map and set storage keyed by protocol equality and hash.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::error::RuntimeError;
use crate::value::Value;

/// A value usable as a map or set key.
///
/// The protocol hash is computed once on construction, so unhashable values
/// are rejected before they reach the table.
#[derive(Debug, Clone)]
pub struct HashKey {
    value: Value,
    hash: u64,
}

impl HashKey {
    pub fn new(value: Value) -> Result<Self, RuntimeError> {
        let hash = value.hash_code()?;
        Ok(Self { value, hash })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.value.equals(&other.value)
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Backing storage of a script map. Iteration order is unspecified.
pub type ScriptMap = HashMap<HashKey, Value>;

/// Backing storage of a script set. Iteration order is unspecified.
pub type ScriptSet = HashSet<HashKey>;
