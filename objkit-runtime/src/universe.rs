use std::rc::Rc;

use indexmap::IndexMap;

use objkit_core::decl::{
    ClassKind, ComponentDecl, DelegateKind, DelegationDecl, MethodDecl, OptionDecl, Protection,
    VarDecl,
};
use objkit_core::error::{ObjError, Result};
use objkit_core::template::ForwardTemplate;
use objkit_core::value::Value;

use crate::access;
use crate::class::{self, Class, ClassId};
use crate::host::{CallContext, Host, NullHost};
use crate::instance::{Instance, ObjectState};
use crate::member::{Builtin, ComponentDef, Delegation, Method, OptionSpec, Variable};
use crate::resolve;
use crate::ObjRef;

/// The central data structure of the runtime.
///
/// It owns every known class definition and every published object handle,
/// the call-frame stack used for visibility checks, and the epoch counter
/// that invalidates cached resolution tables.
pub struct Universe {
    /// Every registered class, keyed by full path, in creation order.
    pub classes: IndexMap<String, ObjRef<Class>>,
    /// Every published object, keyed by full handle path, in creation order.
    pub objects: IndexMap<String, ObjRef<Instance>>,
    host: Rc<dyn Host>,
    epoch: u64,
    next_class_id: u64,
    pub(crate) next_object_id: u64,
    frames: Vec<CallContext>,
    pub(crate) forward_depth: usize,
}

impl Universe {
    /// An empty universe driven by the given host.
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            classes: IndexMap::new(),
            objects: IndexMap::new(),
            host,
            epoch: 0,
            next_class_id: 0,
            next_object_id: 0,
            frames: Vec::new(),
            forward_depth: 0,
        }
    }

    /// An empty universe whose host executes every body as a no-op.
    pub fn with_null_host() -> Self {
        Self::new(Rc::new(NullHost))
    }

    /// The current structural epoch. Cached resolution tables built under an
    /// older epoch are rebuilt on next use.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    pub(crate) fn host(&self) -> Rc<dyn Host> {
        self.host.clone()
    }

    /// Absolutize a name against the global scope.
    pub fn qualify(name: &str) -> String {
        if name.starts_with("::") {
            name.to_string()
        } else {
            format!("::{}", name)
        }
    }

    pub(crate) fn validate_path(path: &str) -> Result<()> {
        let tail = &path[path.rfind("::").map(|at| at + 2).unwrap_or(0)..];
        if tail.is_empty() || tail.contains(':') || tail.chars().any(char::is_whitespace) {
            return Err(ObjError::InvalidName {
                name: path.to_string(),
            });
        }
        Ok(())
    }

    fn validate_member_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains(':') || name.chars().any(char::is_whitespace) {
            return Err(ObjError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Class registry operations.
impl Universe {
    /// Register a new class under `path`.
    ///
    /// Built-in members are declared up front: every class gets the
    /// protected self-reference `this` (storage slot 0); option-bearing
    /// kinds also get the options bag `options` (slot 1) and the protected
    /// `hull` identity.
    pub fn create_class(&mut self, path: &str, kind: ClassKind) -> Result<ObjRef<Class>> {
        let path = Self::qualify(path);
        Self::validate_path(&path)?;
        if self.classes.contains_key(&path) || self.objects.contains_key(&path) {
            return Err(ObjError::NameCollision { name: path });
        }

        let id = ClassId(self.next_class_id);
        self.next_class_id += 1;
        let class = Rc::new(std::cell::RefCell::new(Class::new(id, path.clone(), kind)));
        let holder = Rc::downgrade(&class);

        let builtin_var = |name: &str, builtin: Builtin| {
            Rc::new(Variable {
                name: name.to_string(),
                full_name: format!("{}::{}", path, name),
                protection: Protection::Protected,
                common: false,
                init: None,
                update_hook: None,
                builtin: Some(builtin),
                holder: holder.clone(),
            })
        };
        {
            let mut class = class.borrow_mut();
            class
                .variables
                .insert("this".to_string(), builtin_var("this", Builtin::SelfRef));
            if kind.has_options() {
                class
                    .variables
                    .insert("options".to_string(), builtin_var("options", Builtin::OptionsBag));
                class
                    .variables
                    .insert("hull".to_string(), builtin_var("hull", Builtin::Hull));
            }
        }

        class.borrow().claims.preserve(); // the registry's claim
        self.classes.insert(path, class.clone());
        self.bump_epoch();
        Ok(class)
    }

    /// Look up a class by (possibly relative) path.
    pub fn find_class(&self, name: &str) -> Result<ObjRef<Class>> {
        let path = Self::qualify(name);
        self.classes
            .get(&path)
            .cloned()
            .ok_or(ObjError::NoSuchClass { name: path })
    }

    /// Look up a published object by (possibly relative) handle path.
    pub fn find_object(&self, name: &str) -> Result<ObjRef<Instance>> {
        let path = Self::qualify(name);
        self.objects
            .get(&path)
            .cloned()
            .ok_or(ObjError::NoSuchObject { name: path })
    }

    /// Append `base` to the class's base list (and the class to the base's
    /// derived list), each side holding a claim on the other.
    pub fn add_base(&mut self, class: &ObjRef<Class>, base: &ObjRef<Class>) -> Result<()> {
        if Rc::ptr_eq(class, base) || base.borrow().has_ancestor(class.borrow().id) {
            return Err(ObjError::CycleDetected {
                class: class.borrow().name.clone(),
                base: base.borrow().name.clone(),
            });
        }
        if class.borrow().bases.iter().any(|b| Rc::ptr_eq(b, base)) {
            return Err(ObjError::NameCollision {
                name: base.borrow().name.clone(),
            });
        }
        base.borrow().claims.preserve();
        class.borrow().claims.preserve();
        class.borrow_mut().bases.push(base.clone());
        base.borrow_mut().derived.push(Rc::downgrade(class));
        self.bump_epoch();
        Ok(())
    }

    /// Delete a class by path. Success if it is already gone.
    pub fn delete_class_named(&mut self, name: &str) -> Result<()> {
        let class = match self.find_class(name) {
            Ok(class) => class,
            Err(ObjError::NoSuchClass { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };
        self.delete_class(&class)
    }

    /// Delete a class: derived classes first, then every live instance
    /// (oldest first), then the member scope and the registry entry.
    /// Idempotent.
    pub fn delete_class(&mut self, class: &ObjRef<Class>) -> Result<()> {
        if class.borrow().deleted.get() {
            return Ok(());
        }
        class.borrow().deleted.set(true);
        class.borrow().claims.preserve(); // guard across re-entrant teardown

        // Derived classes go first. Deleting one can mutate the derived
        // list, so take one candidate at a time and re-scan. A derived
        // class already released through the ownership kernel is skipped.
        loop {
            let next = {
                let class = class.borrow();
                class
                    .derived
                    .iter()
                    .filter_map(|weak| weak.upgrade())
                    .find(|d| !d.borrow().deleted.get() && !d.borrow().claims.is_disposed())
            };
            match next {
                Some(derived) => self.delete_class(&derived)?,
                None => break,
            }
        }

        // Destroy live instances oldest-first. A destructor can create or
        // destroy other instances, so re-scan after every teardown instead
        // of advancing a cursor. Destructor failures are swallowed here:
        // a deleted class must end up with no live instances.
        let class_id = class.borrow().id;
        loop {
            let victim = self
                .objects
                .values()
                .filter(|obj| {
                    let obj = obj.borrow();
                    !obj.is_tearing_down()
                        && obj.state != ObjectState::Destructed
                        && obj.class.borrow().has_ancestor(class_id)
                })
                .min_by_key(|obj| obj.borrow().id)
                .cloned();
            match victim {
                Some(object) => {
                    let _ = self.destroy(&object, true);
                }
                None => break,
            }
        }

        // Unlink from bases, undoing the claims taken by add_base.
        let bases: Vec<_> = class.borrow_mut().bases.drain(..).collect();
        for base in bases {
            {
                let mut base = base.borrow_mut();
                base.derived.retain(|weak| match weak.upgrade() {
                    Some(derived) => !Rc::ptr_eq(&derived, class),
                    None => false,
                });
            }
            self.release_class_claim(&base);
            self.release_class_claim(class);
        }

        // Tear down the member scope.
        {
            let mut class = class.borrow_mut();
            class.variables.clear();
            class.methods.clear();
            class.options.clear();
            class.components.clear();
            class.delegated_methods.clear();
            class.delegated_options.clear();
            class.common_values.borrow_mut().clear();
            *class.method_table.borrow_mut() = None;
            *class.var_table.borrow_mut() = None;
            class.derived.clear();
        }

        let name = class.borrow().name.clone();
        if self.classes.shift_remove(&name).is_some() {
            self.release_class_claim(class); // the registry's claim
        }
        self.bump_epoch();
        let _ = class.borrow().claims.mark_eventually_free();
        self.release_class_claim(class); // the teardown guard
        Ok(())
    }

    pub(crate) fn release_class_claim(&mut self, class: &ObjRef<Class>) {
        if class.borrow().claims.release() {
            // Final claim on a doomed class: make sure its registry entry
            // is gone; memory unwinds with the last Rc.
            let name = class.borrow().name.clone();
            self.classes.shift_remove(&name);
        }
    }

    pub(crate) fn release_object_claim(&mut self, object: &ObjRef<Instance>) {
        if object.borrow().claims.release() {
            self.unpublish_object(object);
        }
    }
}

/// Member declaration operations.
impl Universe {
    /// Declare a data member on the class.
    pub fn define_variable(&mut self, class: &ObjRef<Class>, decl: VarDecl) -> Result<Rc<Variable>> {
        let VarDecl {
            name,
            protection,
            common,
            init,
            update_hook,
        } = decl;
        Self::validate_member_name(&name)?;
        if class.borrow().variables.contains_key(&name) {
            return Err(ObjError::MemberAlreadyDefined {
                class: class.borrow().name.clone(),
                member: name,
            });
        }
        let full_name = format!("{}::{}", class.borrow().name, name);
        let variable = Rc::new(Variable {
            name: name.clone(),
            full_name: full_name.clone(),
            protection,
            common,
            init: init.clone(),
            update_hook,
            builtin: None,
            holder: Rc::downgrade(class),
        });
        class.borrow_mut().variables.insert(name, variable.clone());
        if common {
            class
                .borrow()
                .common_values
                .borrow_mut()
                .insert(full_name, init.unwrap_or(Value::Nil));
        }
        self.bump_epoch();
        Ok(variable)
    }

    /// Declare a method (or constructor/destructor) on the class.
    pub fn define_method(&mut self, class: &ObjRef<Class>, decl: MethodDecl) -> Result<Rc<Method>> {
        let MethodDecl {
            name,
            protection,
            common,
            flavor,
            body,
            pre,
            post,
        } = decl;
        Self::validate_member_name(&name)?;
        if class.borrow().methods.contains_key(&name) {
            return Err(ObjError::MemberAlreadyDefined {
                class: class.borrow().name.clone(),
                member: name,
            });
        }
        let full_name = format!("{}::{}", class.borrow().name, name);
        let method = Rc::new(Method {
            name: name.clone(),
            full_name,
            protection,
            common,
            flavor,
            body,
            pre,
            post,
            holder: Rc::downgrade(class),
        });
        class.borrow_mut().methods.insert(name, method.clone());
        self.bump_epoch();
        Ok(method)
    }

    /// Declare a configuration option on the class.
    pub fn define_option(
        &mut self,
        class: &ObjRef<Class>,
        decl: OptionDecl,
    ) -> Result<Rc<OptionSpec>> {
        if !class.borrow().kind.has_options() {
            return Err(ObjError::OptionsUnsupported {
                class: class.borrow().name.clone(),
            });
        }
        let OptionDecl {
            name,
            default,
            config_hook,
            validate_hook,
        } = decl;
        Self::validate_member_name(&name)?;
        if class.borrow().options.contains_key(&name) {
            return Err(ObjError::MemberAlreadyDefined {
                class: class.borrow().name.clone(),
                member: name,
            });
        }
        let full_name = format!("{}::{}", class.borrow().name, name);
        let option = Rc::new(OptionSpec {
            name: name.clone(),
            full_name,
            default,
            config_hook,
            validate_hook,
            holder: Rc::downgrade(class),
        });
        class.borrow_mut().options.insert(name, option.clone());
        self.bump_epoch();
        Ok(option)
    }

    /// Declare a component slot on the class, together with the protected
    /// variable that owns the slot's binding.
    pub fn define_component(
        &mut self,
        class: &ObjRef<Class>,
        decl: ComponentDecl,
    ) -> Result<Rc<ComponentDef>> {
        let ComponentDecl { name, inherit } = decl;
        Self::validate_member_name(&name)?;
        if class.borrow().components.contains_key(&name)
            || class.borrow().variables.contains_key(&name)
        {
            return Err(ObjError::MemberAlreadyDefined {
                class: class.borrow().name.clone(),
                member: name,
            });
        }
        let full_name = format!("{}::{}", class.borrow().name, name);
        let component = Rc::new(ComponentDef {
            name: name.clone(),
            full_name: full_name.clone(),
            inherit,
            holder: Rc::downgrade(class),
        });
        let owning_variable = Rc::new(Variable {
            name: name.clone(),
            full_name,
            protection: Protection::Protected,
            common: false,
            init: None,
            update_hook: None,
            builtin: None,
            holder: Rc::downgrade(class),
        });
        {
            let mut class = class.borrow_mut();
            class.components.insert(name.clone(), component.clone());
            class.variables.insert(name, owning_variable);
        }
        self.bump_epoch();
        Ok(component)
    }

    /// Declare a forwarding rule on the class. The named component must be
    /// declared somewhere in the class's hierarchy; the rewrite template is
    /// parsed now so a bad template fails at declaration time.
    pub fn define_delegation(&mut self, class: &ObjRef<Class>, decl: DelegationDecl) -> Result<()> {
        let DelegationDecl {
            kind,
            pattern,
            component,
            to_name,
            template,
            exceptions,
        } = decl;
        let template = match template {
            Some(source) => Some(ForwardTemplate::parse(&source)?),
            None => None,
        };
        let declared = class::lineage(class)
            .iter()
            .any(|c| c.borrow().components.contains_key(&component));
        if !declared {
            return Err(ObjError::NoSuchMember { name: component });
        }
        let rule = Rc::new(Delegation {
            kind,
            pattern,
            component,
            to_name,
            template,
            exceptions,
            holder: Rc::downgrade(class),
        });
        match kind {
            DelegateKind::Method => class.borrow_mut().delegated_methods.push(rule),
            DelegateKind::Option => class.borrow_mut().delegated_options.push(rule),
        }
        self.bump_epoch();
        Ok(())
    }
}

/// Call frames and dispatch.
impl Universe {
    pub(crate) fn with_frame<T>(
        &mut self,
        ctx: CallContext,
        run: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.frames.push(ctx);
        let out = run(self);
        self.frames.pop();
        out
    }

    /// The class scope the innermost executing body belongs to, if any.
    pub fn current_scope(&self) -> Option<ObjRef<Class>> {
        self.frames.last().map(|ctx| ctx.class.clone())
    }

    /// The object the innermost executing body runs against, if any.
    pub fn current_object(&self) -> Option<ObjRef<Instance>> {
        self.frames.last().and_then(|ctx| ctx.object.clone())
    }

    /// Invoke a method (or forwarded name) on a published object.
    pub fn invoke(&mut self, handle: &str, name: &str, args: &[Value]) -> Result<Value> {
        let object = self.find_object(handle)?;
        if object.borrow().is_tearing_down() {
            return Err(ObjError::DestructionInProgress {
                object: object.borrow().name.clone(),
            });
        }
        self.dispatch(&object, name, args)
    }

    /// Invoke a class-scoped (`common`) method with no object context.
    pub fn invoke_common(&mut self, class_name: &str, name: &str, args: &[Value]) -> Result<Value> {
        let class = self.find_class(class_name)?;
        let method = resolve::lookup_method(&class, name, self.epoch).ok_or_else(|| {
            ObjError::NoSuchMember {
                name: name.to_string(),
            }
        })?;
        let scope = self.current_scope();
        if !access::can_access_method(&method, scope.as_ref()) {
            return Err(self.denied(&method.full_name, method.protection, scope));
        }
        if !method.common {
            return Err(ObjError::MissingObjectContext {
                name: method.full_name.clone(),
            });
        }
        self.run_method(None, &method, args)
    }

    pub(crate) fn dispatch(
        &mut self,
        object: &ObjRef<Instance>,
        name: &str,
        args: &[Value],
    ) -> Result<Value> {
        let class = object.borrow().class.clone();
        object.borrow().claims.preserve();
        class.borrow().claims.preserve();
        let result = self.dispatch_inner(object, &class, name, args);
        self.release_class_claim(&class);
        self.release_object_claim(object);
        result
    }

    fn dispatch_inner(
        &mut self,
        object: &ObjRef<Instance>,
        class: &ObjRef<Class>,
        name: &str,
        args: &[Value],
    ) -> Result<Value> {
        // A declared local member always wins over any delegation.
        if let Some(method) = resolve::lookup_method(class, name, self.epoch) {
            let scope = self.current_scope();
            if !access::can_access_method(&method, scope.as_ref()) {
                return Err(self.denied(&method.full_name, method.protection, scope));
            }
            return self.run_method(Some(object.clone()), &method, args);
        }
        self.forward_method(object, name, args)
    }

    pub(crate) fn denied(
        &self,
        member: &str,
        protection: Protection,
        scope: Option<ObjRef<Class>>,
    ) -> ObjError {
        ObjError::AccessDenied {
            member: member.to_string(),
            protection: protection.to_string(),
            scope: scope
                .map(|scope| scope.borrow().name.clone())
                .unwrap_or_else(|| "::".to_string()),
        }
    }

    /// Run a resolved method: pre hook, body, post hook, all in a frame
    /// scoped to the declaring class.
    pub(crate) fn run_method(
        &mut self,
        object: Option<ObjRef<Instance>>,
        method: &Rc<Method>,
        args: &[Value],
    ) -> Result<Value> {
        if !method.common && object.is_none() {
            return Err(ObjError::MissingObjectContext {
                name: method.full_name.clone(),
            });
        }
        let holder = method.holder.upgrade().ok_or_else(|| ObjError::NoSuchClass {
            name: method.full_name.clone(),
        })?;
        let ctx = CallContext {
            class: holder,
            object: if method.common { None } else { object },
            member: method.full_name.clone(),
        };
        let host = self.host();
        self.with_frame(ctx.clone(), |universe| {
            if let Some(pre) = &method.pre {
                host.eval(universe, pre, &ctx, args)?;
            }
            let out = match &method.body {
                Some(body) => host.eval(universe, body, &ctx, args)?,
                None => {
                    return Err(ObjError::Eval(format!(
                        "unimplemented method: {}",
                        method.full_name
                    )))
                }
            };
            if let Some(post) = &method.post {
                host.eval(universe, post, &ctx, args)?;
            }
            Ok(out)
        })
    }
}

/// Variable access.
impl Universe {
    fn resolve_variable(
        &self,
        object: &ObjRef<Instance>,
        name: &str,
    ) -> Result<(Rc<Variable>, Option<usize>)> {
        let class = object.borrow().class.clone();
        let (variable, slot) =
            resolve::lookup_variable(&class, name, self.epoch).ok_or_else(|| {
                ObjError::NoSuchMember {
                    name: name.to_string(),
                }
            })?;
        let holder = variable.holder.upgrade().ok_or_else(|| ObjError::NoSuchMember {
            name: name.to_string(),
        })?;
        let scope = self.current_scope();
        if !access::can_access(variable.protection, &holder, scope.as_ref()) {
            return Err(self.denied(&variable.full_name, variable.protection, scope));
        }
        Ok((variable, slot))
    }

    /// Read a data member of a published object.
    ///
    /// Reads stay legal while the object's destructor chain runs: a
    /// destructor body that still references the object must never observe
    /// freed storage.
    pub fn get_variable(&self, handle: &str, name: &str) -> Result<Value> {
        let object = self.find_object(handle)?;
        let (variable, slot) = self.resolve_variable(&object, name)?;
        match slot {
            Some(slot) => Ok(object.borrow().read_slot(slot)),
            None => Ok(self.read_common(&variable)),
        }
    }

    /// Write a data member of a published object, firing its update hook.
    pub fn set_variable(&mut self, handle: &str, name: &str, value: Value) -> Result<()> {
        let object = self.find_object(handle)?;
        let (variable, slot) = self.resolve_variable(&object, name)?;
        match slot {
            Some(slot) => object.borrow_mut().write_slot(slot, value.clone()),
            None => self.write_common(&variable, value.clone()),
        }
        if let Some(hook) = variable.update_hook.clone() {
            let holder = variable.holder.upgrade().ok_or_else(|| ObjError::NoSuchMember {
                name: name.to_string(),
            })?;
            let ctx = CallContext {
                class: holder,
                object: Some(object),
                member: variable.full_name.clone(),
            };
            let host = self.host();
            let args = [value];
            return self
                .with_frame(ctx.clone(), |universe| {
                    host.eval(universe, &hook, &ctx, &args)
                })
                .map(|_| ());
        }
        Ok(())
    }

    /// Read a class-scoped (`common`) data member with no object context.
    pub fn get_class_variable(&self, class_name: &str, name: &str) -> Result<Value> {
        let class = self.find_class(class_name)?;
        let (variable, slot) =
            resolve::lookup_variable(&class, name, self.epoch).ok_or_else(|| {
                ObjError::NoSuchMember {
                    name: name.to_string(),
                }
            })?;
        if slot.is_some() {
            return Err(ObjError::MissingObjectContext {
                name: variable.full_name.clone(),
            });
        }
        let holder = variable.holder.upgrade().ok_or_else(|| ObjError::NoSuchMember {
            name: name.to_string(),
        })?;
        let scope = self.current_scope();
        if !access::can_access(variable.protection, &holder, scope.as_ref()) {
            return Err(self.denied(&variable.full_name, variable.protection, scope));
        }
        Ok(self.read_common(&variable))
    }

    /// Write a class-scoped (`common`) data member with no object context.
    pub fn set_class_variable(&mut self, class_name: &str, name: &str, value: Value) -> Result<()> {
        let class = self.find_class(class_name)?;
        let (variable, slot) =
            resolve::lookup_variable(&class, name, self.epoch).ok_or_else(|| {
                ObjError::NoSuchMember {
                    name: name.to_string(),
                }
            })?;
        if slot.is_some() {
            return Err(ObjError::MissingObjectContext {
                name: variable.full_name.clone(),
            });
        }
        let holder = variable.holder.upgrade().ok_or_else(|| ObjError::NoSuchMember {
            name: name.to_string(),
        })?;
        let scope = self.current_scope();
        if !access::can_access(variable.protection, &holder, scope.as_ref()) {
            return Err(self.denied(&variable.full_name, variable.protection, scope));
        }
        self.write_common(&variable, value);
        Ok(())
    }

    fn read_common(&self, variable: &Rc<Variable>) -> Value {
        variable
            .holder
            .upgrade()
            .and_then(|holder| {
                let holder = holder.borrow();
                let values = holder.common_values.borrow();
                values.get(&variable.full_name).cloned()
            })
            .unwrap_or(Value::Nil)
    }

    fn write_common(&self, variable: &Rc<Variable>, value: Value) {
        if let Some(holder) = variable.holder.upgrade() {
            let holder = holder.borrow();
            holder
                .common_values
                .borrow_mut()
                .insert(variable.full_name.clone(), value);
        }
    }
}
