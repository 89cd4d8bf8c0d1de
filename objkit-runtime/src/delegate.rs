//! Forwarding of unresolved methods and options to component targets.

use std::rc::Rc;

use objkit_core::decl::{DelegateKind, Protection};
use objkit_core::error::{ObjError, Result};
use objkit_core::template::Expansion;
use objkit_core::value::Value;

use crate::class::{self, Class};
use crate::host::CallContext;
use crate::instance::Instance;
use crate::member::Delegation;
use crate::resolve;
use crate::universe::Universe;
use crate::ObjRef;

/// Components bound to each other chase forwards indefinitely; the depth
/// cap turns that into an error.
const FORWARD_DEPTH_LIMIT: usize = 64;

/// Walk the hierarchy for the first rule that takes the name: within each
/// class an explicit rule beats a wildcard, and a nearer class beats a
/// farther one.
fn find_rule(class: &ObjRef<Class>, kind: DelegateKind, name: &str) -> Option<Rc<Delegation>> {
    for ancestor in class::lineage(class) {
        let ancestor = ancestor.borrow();
        let rules = match kind {
            DelegateKind::Method => &ancestor.delegated_methods,
            DelegateKind::Option => &ancestor.delegated_options,
        };
        if let Some(rule) = rules.iter().find(|rule| rule.claims(name)) {
            return Some(rule.clone());
        }
        if let Some(rule) = rules.iter().find(|rule| rule.admits(name)) {
            return Some(rule.clone());
        }
    }
    None
}

impl Universe {
    /// Re-issue a forwarded send, counting how deep the delegation chase
    /// already is.
    fn chase_forward<T>(
        &mut self,
        name: &str,
        send: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.forward_depth >= FORWARD_DEPTH_LIMIT {
            return Err(ObjError::DelegationLoop {
                name: name.to_string(),
            });
        }
        self.forward_depth += 1;
        let result = send(self);
        self.forward_depth -= 1;
        result
    }

    /// Forward a name no declared method resolved, per the object's
    /// delegation rules. The matched rule is memoized on the instance; the
    /// component binding is re-read on every send.
    pub(crate) fn forward_method(
        &mut self,
        object: &ObjRef<Instance>,
        name: &str,
        args: &[Value],
    ) -> Result<Value> {
        let memo = object.borrow().forward_memo.get(name).cloned();
        let rule = match memo {
            Some(rule) => rule,
            None => {
                let class = object.borrow().class.clone();
                let rule = find_rule(&class, DelegateKind::Method, name).ok_or_else(|| {
                    ObjError::NoSuchMember {
                        name: name.to_string(),
                    }
                })?;
                object
                    .borrow_mut()
                    .forward_memo
                    .insert(name.to_string(), rule.clone());
                rule
            }
        };

        let bound = object
            .borrow()
            .components
            .get(&rule.component)
            .cloned()
            .flatten()
            .ok_or_else(|| ObjError::UnboundComponent {
                component: rule.component.clone(),
            })?;

        // The template's first word names the method sent to the target;
        // the rest lead the argument list, the original args trail.
        let (message, mut outgoing) = match &rule.template {
            Some(template) => {
                let obj = object.borrow();
                let obj_class = obj.class.borrow();
                let bindings = Expansion {
                    component: &bound,
                    message: rule.outgoing_name(name),
                    self_name: obj.simple_name(),
                    self_path: &obj.name,
                    class_name: obj_class.simple_name(),
                };
                let mut words = template.expand(&bindings).into_iter();
                let message = words
                    .next()
                    .unwrap_or_else(|| rule.outgoing_name(name).to_string());
                (message, words.map(Value::string).collect::<Vec<_>>())
            }
            None => (rule.outgoing_name(name).to_string(), Vec::new()),
        };
        outgoing.extend(args.iter().cloned());
        self.chase_forward(name, |universe| {
            universe.invoke(&bound, &message, &outgoing)
        })
    }

    /// Bind (or unbind, with `None`) a component slot of a published
    /// object, mirroring the binding into the slot's owning variable and
    /// invalidating forwarding installed against the old binding.
    pub fn bind_component(
        &mut self,
        handle: &str,
        component: &str,
        target: Option<&str>,
    ) -> Result<()> {
        let object = self.find_object(handle)?;
        let class = object.borrow().class.clone();
        let def = class::lineage(&class)
            .iter()
            .find_map(|c| c.borrow().components.get(component).cloned())
            .ok_or_else(|| ObjError::NoSuchMember {
                name: component.to_string(),
            })?;

        // Non-inherit slots may only be rebound from the declaring class's
        // own bodies.
        if !def.inherit {
            let holder = def.holder.upgrade().ok_or_else(|| ObjError::NoSuchMember {
                name: component.to_string(),
            })?;
            let scope = self.current_scope();
            let allowed = scope
                .as_ref()
                .map(|scope| Rc::ptr_eq(scope, &holder))
                .unwrap_or(false);
            if !allowed {
                return Err(self.denied(&def.full_name, Protection::Protected, scope));
            }
        }

        let target = match target {
            Some(path) => {
                let path = Self::qualify(path);
                if !self.objects.contains_key(&path) {
                    return Err(ObjError::NoSuchObject { name: path });
                }
                Some(path)
            }
            None => None,
        };
        {
            let mut obj = object.borrow_mut();
            obj.components
                .insert(component.to_string(), target.clone());
            obj.forward_memo.retain(|_, rule| rule.component != component);
        }
        if let Some((_, Some(slot))) = resolve::lookup_variable(&class, &def.full_name, self.epoch())
        {
            let value = target.map(Value::string).unwrap_or(Value::Nil);
            object.borrow_mut().write_slot(slot, value);
        }
        Ok(())
    }

    /// Read an option's current value, chasing delegation when the object
    /// declares no such option itself.
    pub fn cget(&mut self, handle: &str, option: &str) -> Result<Value> {
        let object = self.find_object(handle)?;
        {
            let obj = object.borrow();
            if let Some(value) = obj.option_values.get(option) {
                return Ok(value.clone());
            }
        }
        let class = object.borrow().class.clone();
        let rule = find_rule(&class, DelegateKind::Option, option).ok_or_else(|| {
            ObjError::NoSuchMember {
                name: option.to_string(),
            }
        })?;
        let bound = object
            .borrow()
            .components
            .get(&rule.component)
            .cloned()
            .flatten()
            .ok_or_else(|| ObjError::UnboundComponent {
                component: rule.component.clone(),
            })?;
        self.chase_forward(option, |universe| {
            universe.cget(&bound, rule.outgoing_name(option))
        })
    }

    /// Write an option: the validate hook may veto the value, the store
    /// happens next, and the configure hook reacts to the stored value.
    /// Unknown local options chase delegation like `cget`.
    pub fn configure(&mut self, handle: &str, option: &str, value: Value) -> Result<()> {
        let object = self.find_object(handle)?;
        if object.borrow().is_tearing_down() {
            return Err(ObjError::DestructionInProgress {
                object: object.borrow().name.clone(),
            });
        }
        if object.borrow().option_values.contains_key(option) {
            let class = object.borrow().class.clone();
            let spec = class::lineage(&class)
                .iter()
                .find_map(|c| c.borrow().options.get(option).cloned());
            let spec = match spec {
                Some(spec) => spec,
                None => {
                    // Default survived a structure change its spec did not.
                    object
                        .borrow_mut()
                        .option_values
                        .insert(option.to_string(), value);
                    return Ok(());
                }
            };
            let holder = spec.holder.upgrade().ok_or_else(|| ObjError::NoSuchMember {
                name: option.to_string(),
            })?;
            let ctx = CallContext {
                class: holder,
                object: Some(object.clone()),
                member: spec.full_name.clone(),
            };
            let host = self.host();
            let args = [value.clone()];
            if let Some(validate) = spec.validate_hook.clone() {
                self.with_frame(ctx.clone(), |universe| {
                    host.eval(universe, &validate, &ctx, &args)
                })?;
            }
            object
                .borrow_mut()
                .option_values
                .insert(option.to_string(), value);
            if let Some(config) = spec.config_hook.clone() {
                self.with_frame(ctx.clone(), |universe| {
                    host.eval(universe, &config, &ctx, &args)
                })?;
            }
            return Ok(());
        }

        let class = object.borrow().class.clone();
        let rule = find_rule(&class, DelegateKind::Option, option).ok_or_else(|| {
            ObjError::NoSuchMember {
                name: option.to_string(),
            }
        })?;
        let bound = object
            .borrow()
            .components
            .get(&rule.component)
            .cloned()
            .flatten()
            .ok_or_else(|| ObjError::UnboundComponent {
                component: rule.component.clone(),
            })?;
        self.chase_forward(option, |universe| {
            universe.configure(&bound, rule.outgoing_name(option), value)
        })
    }

    /// Every locally held option of the object, in declaration order, with
    /// its current value.
    pub fn configure_report(&self, handle: &str) -> Result<Vec<(String, Value)>> {
        let object = self.find_object(handle)?;
        let obj = object.borrow();
        Ok(obj
            .option_values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }
}
