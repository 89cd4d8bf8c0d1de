use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use objkit_core::decl::ClassKind;
use objkit_core::value::Value;

use crate::hold::Claims;
use crate::member::{ComponentDef, Delegation, Method, OptionSpec, Variable};
use crate::resolve::{MethodTable, VarTable};
use crate::{ObjRef, ObjWeakRef};

/// A registry-unique class identity, stable across the class's lifetime.
///
/// Heritage sets and per-instance constructed/destructed sets are keyed by
/// this rather than by name, so a re-created class of the same name is a
/// distinct identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u64);

/// Represents a declared class.
pub struct Class {
    /// The class's registry identity.
    pub id: ClassId,
    /// The class's fully scoped name (e.g. `::shapes::Circle`).
    pub name: String,
    /// The class's declared kind.
    pub kind: ClassKind,
    /// The declared base classes, in declaration order.
    pub bases: Vec<ObjRef<Class>>,
    /// Back-references to classes derived from this one.
    pub derived: Vec<ObjWeakRef<Class>>,
    /// The class's data members, in declaration order.
    pub variables: IndexMap<String, Rc<Variable>>,
    /// The class's methods (including constructor/destructor), in declaration order.
    pub methods: IndexMap<String, Rc<Method>>,
    /// The class's declared options, in declaration order.
    pub options: IndexMap<String, Rc<OptionSpec>>,
    /// The class's declared component slots, in declaration order.
    pub components: IndexMap<String, Rc<ComponentDef>>,
    /// Forwarding rules for methods, in declaration order.
    pub delegated_methods: Vec<Rc<Delegation>>,
    /// Forwarding rules for options, in declaration order.
    pub delegated_options: Vec<Rc<Delegation>>,
    /// Storage for class-scoped (`common`) members, keyed by full member name.
    pub common_values: RefCell<IndexMap<String, Value>>,
    /// The cached method resolution table.
    pub method_table: RefCell<Option<MethodTable>>,
    /// The cached variable resolution table.
    pub var_table: RefCell<Option<VarTable>>,
    /// The class's ownership claims.
    pub claims: Claims,
    /// Set once `delete_class` has begun tearing this class down.
    pub deleted: Cell<bool>,
}

impl Class {
    /// A freshly declared class with no bases and no members.
    pub fn new(id: ClassId, name: String, kind: ClassKind) -> Self {
        Self {
            id,
            name,
            kind,
            bases: Vec::new(),
            derived: Vec::new(),
            variables: IndexMap::new(),
            methods: IndexMap::new(),
            options: IndexMap::new(),
            components: IndexMap::new(),
            delegated_methods: Vec::new(),
            delegated_options: Vec::new(),
            common_values: RefCell::new(IndexMap::new()),
            method_table: RefCell::new(None),
            var_table: RefCell::new(None),
            claims: Claims::new(),
            deleted: Cell::new(false),
        }
    }

    /// The class's name without its enclosing scope.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(self.name.as_str())
    }

    /// Whether the given identity is in this class's heritage set
    /// (itself plus the transitive closure of its bases).
    pub fn has_ancestor(&self, id: ClassId) -> bool {
        if self.id == id {
            return true;
        }
        self.bases.iter().any(|base| base.borrow().has_ancestor(id))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bases", &self.bases.iter().map(|b| b.borrow().name.clone()).collect::<Vec<_>>())
            .finish()
    }
}

/// The hierarchy in resolution order: the class itself, then its first
/// base's full hierarchy, then its second base's, and so on, with repeat
/// visits (diamonds) collapsed to their first occurrence.
pub fn lineage(class: &ObjRef<Class>) -> Vec<ObjRef<Class>> {
    fn walk(class: &ObjRef<Class>, seen: &mut HashSet<ClassId>, out: &mut Vec<ObjRef<Class>>) {
        if !seen.insert(class.borrow().id) {
            return;
        }
        out.push(class.clone());
        let bases = class.borrow().bases.clone();
        for base in &bases {
            walk(base, seen, out);
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(class, &mut seen, &mut out);
    out
}
