//!
//! Virtual table construction for the class hierarchy.
//!
//! For a given class, these tables map every spelling a member can be
//! addressed by (bare name, name qualified by its declaring scope, and by
//! each enclosing scope up to the root) to the single most-specific
//! definition, walking the class itself first and then its bases in declared
//! order. The first definition found for a spelling wins; later occurrences
//! never override it.
//!
//! Tables are cached per class and tagged with the universe epoch at build
//! time; any structural change to the hierarchy bumps the epoch, and a table
//! built under an older epoch is rebuilt in full on next use.
//!

use std::collections::HashMap;
use std::rc::Rc;

use crate::class::{self, Class};
use crate::member::{Builtin, Method, Variable};
use crate::ObjRef;

/// The cached method resolution table of one class.
#[derive(Debug)]
pub struct MethodTable {
    /// The universe epoch this table was built under.
    pub epoch: u64,
    /// Every valid spelling, mapped to its most-specific definition.
    pub entries: HashMap<String, Rc<Method>>,
    /// Per member full name, the least-qualified spelling that still
    /// resolves to it (for display).
    pub canonical: HashMap<String, String>,
}

/// The cached variable resolution table of one class.
#[derive(Debug)]
pub struct VarTable {
    /// The universe epoch this table was built under.
    pub epoch: u64,
    /// Every valid spelling, mapped to its most-specific definition.
    pub entries: HashMap<String, Rc<Variable>>,
    /// Per variable full name, its storage slot in an instance of this
    /// class. Class-scoped (`common`) variables have no slot.
    pub slots: HashMap<String, usize>,
    /// The variables backing each storage slot, in slot order.
    pub order: Vec<Rc<Variable>>,
    /// Per member full name, the least-qualified spelling that still
    /// resolves to it.
    pub canonical: HashMap<String, String>,
}

/// Every spelling a fully scoped member name can be addressed by, from the
/// bare name up to the fully qualified one.
///
/// `::shapes::Circle::radius` yields `radius`, `Circle::radius`,
/// `shapes::Circle::radius` and `::shapes::Circle::radius`.
pub fn spellings(full_name: &str) -> Vec<String> {
    let trimmed = full_name.trim_start_matches("::");
    let segments: Vec<&str> = trimmed.split("::").collect();
    let mut out = Vec::with_capacity(segments.len() + 1);
    for start in (0..segments.len()).rev() {
        out.push(segments[start..].join("::"));
    }
    out.push(format!("::{}", trimmed));
    out
}

fn insert_method_names(class: &ObjRef<Class>, entries: &mut HashMap<String, Rc<Method>>) {
    // The walk deliberately revisits diamond ancestors: each inheritance
    // path gets to insert its spellings, first occurrence winning.
    let class = class.borrow();
    for method in class.methods.values() {
        if !method.is_dispatchable() {
            continue;
        }
        for spelling in spellings(&method.full_name) {
            entries.entry(spelling).or_insert_with(|| method.clone());
        }
    }
    for base in &class.bases {
        insert_method_names(base, entries);
    }
}

fn canonical_of<T, F>(entries: &HashMap<String, Rc<T>>, full_name_of: F) -> HashMap<String, String>
where
    F: Fn(&T) -> &str,
{
    let mut canonical = HashMap::new();
    for member in entries.values() {
        let full_name = full_name_of(member);
        if canonical.contains_key(full_name) {
            continue;
        }
        for spelling in spellings(full_name) {
            if let Some(found) = entries.get(&spelling) {
                if Rc::ptr_eq(found, member) {
                    canonical.insert(full_name.to_string(), spelling);
                    break;
                }
            }
        }
    }
    canonical
}

fn build_method_table(class: &ObjRef<Class>, epoch: u64) -> MethodTable {
    let mut entries = HashMap::new();
    insert_method_names(class, &mut entries);
    let canonical = canonical_of(&entries, |m: &Method| m.full_name.as_str());
    MethodTable {
        epoch,
        entries,
        canonical,
    }
}

fn insert_variable_names(class: &ObjRef<Class>, entries: &mut HashMap<String, Rc<Variable>>) {
    let class = class.borrow();
    for variable in class.variables.values() {
        for spelling in spellings(&variable.full_name) {
            entries.entry(spelling).or_insert_with(|| variable.clone());
        }
    }
    for base in &class.bases {
        insert_variable_names(base, entries);
    }
}

fn build_var_table(class: &ObjRef<Class>, epoch: u64) -> VarTable {
    let mut entries = HashMap::new();
    insert_variable_names(class, &mut entries);
    let canonical = canonical_of(&entries, |v: &Variable| v.full_name.as_str());

    // Storage slots are per most-derived class: slot 0 is the resolved
    // self-reference, slot 1 the resolved options bag (when some class in
    // the hierarchy carries one), and every other per-instance variable is
    // numbered in first-discovery order. The lineage walk is deduplicated,
    // so a diamond ancestor contributes its storage exactly once.
    let lineage = class::lineage(class);
    let mut order: Vec<Rc<Variable>> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    let self_ref = lineage.iter().find_map(|c| {
        c.borrow()
            .variables
            .values()
            .find(|v| v.builtin == Some(Builtin::SelfRef))
            .cloned()
    });
    if let Some(variable) = self_ref {
        order.push(variable);
    }
    let options_bag = lineage.iter().find_map(|c| {
        c.borrow()
            .variables
            .values()
            .find(|v| v.builtin == Some(Builtin::OptionsBag))
            .cloned()
    });
    let has_bag = options_bag.is_some();
    if let Some(variable) = options_bag {
        order.push(variable);
    }

    for ancestor in &lineage {
        let ancestor = ancestor.borrow();
        for variable in ancestor.variables.values() {
            match variable.builtin {
                Some(Builtin::SelfRef) => {
                    slots.insert(variable.full_name.clone(), 0);
                    continue;
                }
                Some(Builtin::OptionsBag) => {
                    if has_bag {
                        slots.insert(variable.full_name.clone(), 1);
                    }
                    continue;
                }
                _ => {}
            }
            if variable.common {
                continue;
            }
            if !slots.contains_key(&variable.full_name) {
                slots.insert(variable.full_name.clone(), order.len());
                order.push(variable.clone());
            }
        }
    }

    VarTable {
        epoch,
        entries,
        slots,
        order,
        canonical,
    }
}

/// Rebuild the class's method table if it predates the given epoch.
pub fn ensure_method_table(class: &ObjRef<Class>, epoch: u64) {
    let stale = match &*class.borrow().method_table.borrow() {
        Some(table) => table.epoch != epoch,
        None => true,
    };
    if stale {
        let table = build_method_table(class, epoch);
        *class.borrow().method_table.borrow_mut() = Some(table);
    }
}

/// Rebuild the class's variable table if it predates the given epoch.
pub fn ensure_var_table(class: &ObjRef<Class>, epoch: u64) {
    let stale = match &*class.borrow().var_table.borrow() {
        Some(table) => table.epoch != epoch,
        None => true,
    };
    if stale {
        let table = build_var_table(class, epoch);
        *class.borrow().var_table.borrow_mut() = Some(table);
    }
}

/// Resolve a method spelling against the class's hierarchy.
pub fn lookup_method(class: &ObjRef<Class>, name: &str, epoch: u64) -> Option<Rc<Method>> {
    ensure_method_table(class, epoch);
    let class = class.borrow();
    let table = class.method_table.borrow();
    table.as_ref().and_then(|t| t.entries.get(name).cloned())
}

/// Resolve a variable spelling against the class's hierarchy, yielding the
/// member and its storage slot (`None` for class-scoped variables).
pub fn lookup_variable(
    class: &ObjRef<Class>,
    name: &str,
    epoch: u64,
) -> Option<(Rc<Variable>, Option<usize>)> {
    ensure_var_table(class, epoch);
    let class = class.borrow();
    let table = class.var_table.borrow();
    let table = table.as_ref()?;
    let variable = table.entries.get(name)?.clone();
    let slot = table.slots.get(&variable.full_name).copied();
    Some((variable, slot))
}

/// The variables backing each storage slot of an instance of this class.
pub fn slot_order(class: &ObjRef<Class>, epoch: u64) -> Vec<Rc<Variable>> {
    ensure_var_table(class, epoch);
    let class = class.borrow();
    let table = class.var_table.borrow();
    table.as_ref().map(|t| t.order.clone()).unwrap_or_default()
}

/// The least-qualified spelling that still resolves to the member the given
/// spelling resolves to, for display.
pub fn canonical_method_name(class: &ObjRef<Class>, name: &str, epoch: u64) -> Option<String> {
    ensure_method_table(class, epoch);
    let class = class.borrow();
    let table = class.method_table.borrow();
    let table = table.as_ref()?;
    let method = table.entries.get(name)?;
    table.canonical.get(&method.full_name).cloned()
}

/// The least-qualified spelling for a variable, for display.
pub fn canonical_variable_name(class: &ObjRef<Class>, name: &str, epoch: u64) -> Option<String> {
    ensure_var_table(class, epoch);
    let class = class.borrow();
    let table = class.var_table.borrow();
    let table = table.as_ref()?;
    let variable = table.entries.get(name)?;
    table.canonical.get(&variable.full_name).cloned()
}
