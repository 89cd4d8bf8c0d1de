use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use objkit_core::value::Value;

use crate::class::{Class, ClassId};
use crate::hold::Claims;
use crate::member::Delegation;
use crate::ObjRef;

/// Where an instance stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Storage exists but nothing is bound yet.
    Allocated,
    /// Variable slots are bound and initialized.
    VariablesBound,
    /// Options carry their defaults.
    OptionsBound,
    /// The constructor chain is running.
    Constructing,
    /// Fully constructed and live.
    Constructed,
    /// Construction failed; storage is being released.
    RollingBack,
    /// The destructor chain is running.
    Destructing,
    /// The destructor chain completed; the handle is gone.
    Destructed,
}

/// Represents one object of a most-derived class.
pub struct Instance {
    /// Creation order, used to destroy oldest-first when a class dies.
    pub id: u64,
    /// The full handle path this object is published under.
    pub name: String,
    /// The object's most-derived class.
    pub class: ObjRef<Class>,
    /// Per-slot variable storage, indexed as the class's variable table
    /// numbers its slots.
    pub data: Vec<Value>,
    /// Current option values, keyed by option name.
    pub option_values: IndexMap<String, Value>,
    /// Component bindings: `None` while the slot is unbound.
    pub components: IndexMap<String, Option<String>>,
    /// Forwarding installed against component bindings, keyed by the
    /// forwarded name; cleared for a component when it is rebound.
    pub forward_memo: HashMap<String, Rc<Delegation>>,
    /// Ancestors whose constructor has already run for this object.
    pub constructed: HashSet<ClassId>,
    /// Ancestors whose destructor has already run for this object.
    pub destructed: HashSet<ClassId>,
    /// The object's lifecycle state.
    pub state: ObjectState,
    /// The object's ownership claims.
    pub claims: Claims,
}

impl Instance {
    /// A freshly allocated object with nothing bound.
    pub fn new(id: u64, name: String, class: ObjRef<Class>) -> Self {
        Self {
            id,
            name,
            class,
            data: Vec::new(),
            option_values: IndexMap::new(),
            components: IndexMap::new(),
            forward_memo: HashMap::new(),
            constructed: HashSet::new(),
            destructed: HashSet::new(),
            state: ObjectState::Allocated,
            claims: Claims::new(),
        }
    }

    /// The handle's name without its enclosing scope.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(self.name.as_str())
    }

    /// Whether the object is mid-teardown (or mid-rollback).
    pub fn is_tearing_down(&self) -> bool {
        matches!(self.state, ObjectState::Destructing | ObjectState::RollingBack)
    }

    /// Read a storage slot.
    pub fn read_slot(&self, slot: usize) -> Value {
        self.data.get(slot).cloned().unwrap_or(Value::Nil)
    }

    /// Write a storage slot. Slots past the current storage may exist when
    /// a member was declared after this object was built; the storage grows
    /// to admit them.
    pub fn write_slot(&mut self, slot: usize, value: Value) {
        if slot >= self.data.len() {
            self.data.resize(slot + 1, Value::Nil);
        }
        self.data[slot] = value;
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("class", &self.class.borrow().name)
            .field("state", &self.state)
            .finish()
    }
}
