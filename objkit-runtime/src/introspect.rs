//! Read-only views over the registries and resolution tables.

use std::collections::HashSet;

use objkit_core::error::{ObjError, Result};

use crate::class;
use crate::resolve;
use crate::universe::Universe;

/// Shell-style glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    fn matches(pattern: &[char], name: &[char]) -> bool {
        match pattern.first() {
            None => name.is_empty(),
            Some(&'*') => (0..=name.len()).any(|skip| matches(&pattern[1..], &name[skip..])),
            Some(&'?') => !name.is_empty() && matches(&pattern[1..], &name[1..]),
            Some(ch) => name.first() == Some(ch) && matches(&pattern[1..], &name[1..]),
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    matches(&pattern, &name)
}

impl Universe {
    /// Registered class paths matching the pattern, in creation order.
    pub fn info_classes(&self, pattern: &str) -> Vec<String> {
        self.classes
            .keys()
            .filter(|name| glob_match(pattern, name))
            .cloned()
            .collect()
    }

    /// Published object handles matching the pattern, in creation order.
    pub fn info_objects(&self, pattern: &str) -> Vec<String> {
        self.objects
            .keys()
            .filter(|name| glob_match(pattern, name))
            .cloned()
            .collect()
    }

    /// The class's full hierarchy, nearest first, the class itself
    /// included.
    pub fn info_heritage(&self, class_name: &str) -> Result<Vec<String>> {
        let class = self.find_class(class_name)?;
        Ok(class::lineage(&class)
            .iter()
            .map(|c| c.borrow().name.clone())
            .collect())
    }

    /// Full names of the data members visible to the class, hierarchy
    /// order, bare names matched against the pattern.
    pub fn info_variables(&self, class_name: &str, pattern: &str) -> Result<Vec<String>> {
        let class = self.find_class(class_name)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ancestor in class::lineage(&class) {
            let ancestor = ancestor.borrow();
            for variable in ancestor.variables.values() {
                if glob_match(pattern, &variable.name) && seen.insert(variable.full_name.clone()) {
                    out.push(variable.full_name.clone());
                }
            }
        }
        Ok(out)
    }

    /// Full names of the dispatchable methods visible to the class,
    /// hierarchy order, bare names matched against the pattern.
    pub fn info_methods(&self, class_name: &str, pattern: &str) -> Result<Vec<String>> {
        let class = self.find_class(class_name)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ancestor in class::lineage(&class) {
            let ancestor = ancestor.borrow();
            for method in ancestor.methods.values() {
                if method.is_dispatchable()
                    && glob_match(pattern, &method.name)
                    && seen.insert(method.full_name.clone())
                {
                    out.push(method.full_name.clone());
                }
            }
        }
        Ok(out)
    }

    /// Names of the options the class's instances hold locally, hierarchy
    /// order, matched against the pattern.
    pub fn info_options(&self, class_name: &str, pattern: &str) -> Result<Vec<String>> {
        let class = self.find_class(class_name)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ancestor in class::lineage(&class) {
            let ancestor = ancestor.borrow();
            for name in ancestor.options.keys() {
                if glob_match(pattern, name) && seen.insert(name.clone()) {
                    out.push(name.clone());
                }
            }
        }
        Ok(out)
    }

    /// Names of the component slots the class's instances carry, hierarchy
    /// order, matched against the pattern.
    pub fn info_components(&self, class_name: &str, pattern: &str) -> Result<Vec<String>> {
        let class = self.find_class(class_name)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for ancestor in class::lineage(&class) {
            let ancestor = ancestor.borrow();
            for name in ancestor.components.keys() {
                if glob_match(pattern, name) && seen.insert(name.clone()) {
                    out.push(name.clone());
                }
            }
        }
        Ok(out)
    }

    /// Per-instance component bindings, declaration order. Unbound slots
    /// report `None`.
    pub fn component_bindings(&self, handle: &str) -> Result<Vec<(String, Option<String>)>> {
        let object = self.find_object(handle)?;
        let object = object.borrow();
        Ok(object
            .components
            .iter()
            .map(|(name, target)| (name.clone(), target.clone()))
            .collect())
    }

    /// The least-qualified spelling that still resolves to whatever the
    /// given member spelling resolves to, methods first.
    pub fn canonical_name(&self, class_name: &str, member: &str) -> Result<String> {
        let class = self.find_class(class_name)?;
        resolve::canonical_method_name(&class, member, self.epoch())
            .or_else(|| resolve::canonical_variable_name(&class, member, self.epoch()))
            .ok_or_else(|| ObjError::NoSuchMember {
                name: member.to_string(),
            })
    }

    /// The most-derived class of a published object.
    pub fn object_class(&self, handle: &str) -> Result<String> {
        let object = self.find_object(handle)?;
        let class = object.borrow().class.clone();
        let name = class.borrow().name.clone();
        Ok(name)
    }

    /// Whether the object's class is, or derives from, the named class.
    pub fn is_a(&self, handle: &str, class_name: &str) -> Result<bool> {
        let object = self.find_object(handle)?;
        let class = self.find_class(class_name)?;
        let id = class.borrow().id;
        let object_class = object.borrow().class.clone();
        let answer = object_class.borrow().has_ancestor(id);
        Ok(answer)
    }
}
