//! Script-defined classes and their instances.
//!
//! A class is a named bundle of static members and instance methods.
//! Instances hold their own member table; methods are looked up on the class
//! at call time so instances never own procedure handles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::procedure::Procedure;
use crate::value::{Name, Value};

/// Member every instance is created with, holding its class name.
pub const TYPE_MEMBER: &str = "__type__";

/// Name of the constructor method run by instantiation.
pub const CONSTRUCTOR: &str = "__init__";

#[derive(Debug)]
pub struct Class {
    name: Name,
    statics: RefCell<HashMap<Name, Value>>,
    methods: HashMap<Name, Rc<Procedure>>,
}

impl Class {
    /// Build a class. `statics` holds `static def` procedures; static
    /// variables are filled in later by the program's class initializers.
    pub fn new(
        name: &str,
        statics: HashMap<Name, Value>,
        methods: HashMap<Name, Rc<Procedure>>,
    ) -> Self {
        Self {
            name: Rc::from(name),
            statics: RefCell::new(statics),
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self, name: &str) -> Option<&Rc<Procedure>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Rc<Procedure>> {
        self.methods.values()
    }

    /// Link the methods and static procedures back to this class.
    pub fn claim_procedures(self: &Rc<Self>) {
        for method in self.methods.values() {
            method.set_owner(self);
        }
        for procedure in self.static_procedures() {
            procedure.set_owner(self);
        }
    }

    pub fn has_static(&self, name: &str) -> bool {
        self.statics.borrow().contains_key(name)
    }

    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.statics.borrow().get(name).cloned()
    }

    pub fn set_static(&self, name: &str, value: Value) {
        self.statics.borrow_mut().insert(Rc::from(name), value);
    }

    /// Procedures stored as statics (`static def`).
    pub fn static_procedures(&self) -> Vec<Rc<Procedure>> {
        self.statics
            .borrow()
            .values()
            .filter_map(|value| match value {
                Value::Procedure(procedure) => Some(procedure.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    members: RefCell<HashMap<Name, Value>>,
}

impl Instance {
    /// A fresh instance with only `__type__` set.
    pub fn new(class: Rc<Class>) -> Self {
        let mut members = HashMap::new();
        members.insert(Rc::from(TYPE_MEMBER), Value::str(class.name()));
        Self {
            class,
            members: RefCell::new(members),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.members.borrow_mut().insert(Rc::from(name), value);
    }
}
