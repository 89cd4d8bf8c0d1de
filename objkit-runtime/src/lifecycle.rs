//! Object construction, destruction, rollback and handle management.

use std::cell::RefCell;
use std::rc::Rc;

use objkit_core::error::{ObjError, Result};
use objkit_core::value::Value;

use crate::class::{self, Class};
use crate::instance::{Instance, ObjectState};
use crate::member::Builtin;
use crate::resolve;
use crate::universe::Universe;
use crate::ObjRef;

impl Universe {
    /// Create, publish and construct an instance of `class_name` at
    /// `handle`, passing `args` to the most-derived constructor.
    ///
    /// The handle goes live before the constructor chain runs, so
    /// constructor bodies can already reach the object through it. If any
    /// constructor fails, the half-built object is rolled back without
    /// running destructors and the failure propagates.
    pub fn instantiate(
        &mut self,
        class_name: &str,
        handle: &str,
        args: &[Value],
    ) -> Result<ObjRef<Instance>> {
        let class = self.find_class(class_name)?;
        let path = Self::qualify(handle);
        Self::validate_path(&path)?;
        if self.objects.contains_key(&path) || self.classes.contains_key(&path) {
            return Err(ObjError::NameCollision { name: path });
        }

        let id = self.next_object_id;
        self.next_object_id += 1;
        let object = Rc::new(RefCell::new(Instance::new(id, path.clone(), class.clone())));

        let order = resolve::slot_order(&class, self.epoch());
        {
            let mut obj = object.borrow_mut();
            obj.data = order
                .iter()
                .map(|variable| match variable.builtin {
                    Some(Builtin::SelfRef) | Some(Builtin::Hull) => Value::string(path.clone()),
                    Some(Builtin::OptionsBag) => Value::Nil,
                    None => variable.init.clone().unwrap_or(Value::Nil),
                })
                .collect();
            obj.state = ObjectState::VariablesBound;

            // Option defaults, the outermost declaration winning.
            for ancestor in class::lineage(&class) {
                let ancestor = ancestor.borrow();
                for (name, spec) in ancestor.options.iter() {
                    obj.option_values
                        .entry(name.clone())
                        .or_insert_with(|| spec.default.clone().unwrap_or(Value::Nil));
                }
                for name in ancestor.components.keys() {
                    obj.components.entry(name.clone()).or_insert(None);
                }
            }
            obj.state = ObjectState::OptionsBound;
        }

        object.borrow().claims.preserve(); // the registry's claim
        self.objects.insert(path.clone(), object.clone());
        object.borrow_mut().state = ObjectState::Constructing;

        match self.construct(&object, &class, args) {
            Ok(()) => {
                // A constructor body may have destroyed its own object. The
                // state is the authority here: the handle path may legally
                // have changed if the body renamed the object.
                if object.borrow().state == ObjectState::Destructed {
                    return Err(ObjError::ConstructionFailed {
                        class: class.borrow().name.clone(),
                        source: Box::new(ObjError::Eval(
                            "object deleted during its own construction".to_string(),
                        )),
                    });
                }
                object.borrow_mut().state = ObjectState::Constructed;
                Ok(object)
            }
            Err(err) => {
                self.roll_back(&object);
                Err(err)
            }
        }
    }

    /// Run the constructor chain for `class`: bases first (with no
    /// arguments), then the class's own constructor with `args`. The
    /// per-object constructed set collapses diamond ancestors to one run.
    fn construct(
        &mut self,
        object: &ObjRef<Instance>,
        class: &ObjRef<Class>,
        args: &[Value],
    ) -> Result<()> {
        let id = class.borrow().id;
        if object.borrow().constructed.contains(&id) {
            return Ok(());
        }
        object.borrow_mut().constructed.insert(id);

        let bases: Vec<_> = class.borrow().bases.clone();
        for base in &bases {
            self.construct(object, base, &[]).map_err(|err| match err {
                wrapped @ ObjError::ConstructionFailed { .. } => wrapped,
                err => ObjError::ConstructionFailed {
                    class: base.borrow().name.clone(),
                    source: Box::new(err),
                },
            })?;
        }

        let ctor = class
            .borrow()
            .methods
            .values()
            .find(|m| m.is_constructor())
            .cloned();
        if let Some(ctor) = ctor {
            self.run_method(Some(object.clone()), &ctor, args)
                .map_err(|err| ObjError::ConstructionFailed {
                    class: class.borrow().name.clone(),
                    source: Box::new(err),
                })?;
        }
        Ok(())
    }

    /// Retire a half-built object after a constructor failure. Destructors
    /// never run for an object that was not fully constructed.
    fn roll_back(&mut self, object: &ObjRef<Instance>) {
        object.borrow_mut().state = ObjectState::RollingBack;
        self.unpublish_object(object);
        {
            let mut obj = object.borrow_mut();
            obj.data.clear();
            obj.option_values.clear();
            obj.components.clear();
            obj.forward_memo.clear();
            obj.state = ObjectState::Destructed;
        }
        let _ = object.borrow().claims.mark_eventually_free();
    }

    /// Run the destructor chain and retire the handle.
    ///
    /// A nested destroy of an object already mid-teardown is a no-op.
    /// `forced` teardown (class deletion and other cascades) swallows
    /// destructor errors so the cascade always finishes; an explicit
    /// destroy surfaces the first error and leaves the object constructed,
    /// with its already-run destructor markers intact, so a retry resumes
    /// where it stopped.
    pub fn destroy(&mut self, object: &ObjRef<Instance>, forced: bool) -> Result<()> {
        {
            let obj = object.borrow();
            if obj.is_tearing_down() || obj.state == ObjectState::Destructed {
                return Ok(());
            }
        }
        object.borrow().claims.preserve(); // guard across destructor bodies
        object.borrow_mut().state = ObjectState::Destructing;
        let class = object.borrow().class.clone();

        match self.destruct_chain(object, &class, forced) {
            Ok(()) => {
                {
                    let mut obj = object.borrow_mut();
                    obj.state = ObjectState::Destructed;
                    obj.data.clear();
                    obj.option_values.clear();
                    obj.components.clear();
                    obj.forward_memo.clear();
                }
                self.unpublish_object(object);
                let _ = object.borrow().claims.mark_eventually_free();
                self.release_object_claim(object);
                Ok(())
            }
            Err(err) => {
                object.borrow_mut().state = ObjectState::Constructed;
                self.release_object_claim(object);
                Err(err)
            }
        }
    }

    /// Most-derived destructor first, then bases; the per-object destructed
    /// set keeps a diamond ancestor's destructor to one run. The marker is
    /// set only after the body succeeds.
    fn destruct_chain(
        &mut self,
        object: &ObjRef<Instance>,
        class: &ObjRef<Class>,
        forced: bool,
    ) -> Result<()> {
        let id = class.borrow().id;
        if object.borrow().destructed.contains(&id) {
            return Ok(());
        }
        let dtor = class
            .borrow()
            .methods
            .values()
            .find(|m| m.is_destructor())
            .cloned();
        if let Some(dtor) = dtor {
            match self.run_method(Some(object.clone()), &dtor, &[]) {
                Ok(_) => {}
                Err(_) if forced => {}
                Err(err) => return Err(err),
            }
        }
        object.borrow_mut().destructed.insert(id);

        let bases: Vec<_> = class.borrow().bases.clone();
        for base in &bases {
            self.destruct_chain(object, base, forced)?;
        }
        Ok(())
    }

    /// Explicitly destroy the object published at `name`. Destructor
    /// failures surface to the caller.
    pub fn delete_object(&mut self, name: &str) -> Result<()> {
        let object = self.find_object(name)?;
        self.destroy(&object, false)
    }

    /// Re-publish an object under a new handle path, fixing up its
    /// self-reference and notifying the host.
    pub fn rename_object(&mut self, old: &str, new: &str) -> Result<()> {
        let object = self.find_object(old)?;
        if object.borrow().is_tearing_down() {
            return Err(ObjError::DestructionInProgress {
                object: object.borrow().name.clone(),
            });
        }
        let new_path = Self::qualify(new);
        Self::validate_path(&new_path)?;
        if self.objects.contains_key(&new_path) || self.classes.contains_key(&new_path) {
            return Err(ObjError::NameCollision { name: new_path });
        }
        let old_path = object.borrow().name.clone();
        self.objects.shift_remove(&old_path);
        self.objects.insert(new_path.clone(), object.clone());
        {
            let mut obj = object.borrow_mut();
            obj.name = new_path.clone();
            obj.write_slot(0, Value::string(new_path.clone()));
        }
        self.host().handle_renamed(&old_path, &new_path);
        Ok(())
    }

    /// Drop the handle-to-object mapping, releasing the registry's claim.
    /// Safe to call when the handle is already gone.
    pub(crate) fn unpublish_object(&mut self, object: &ObjRef<Instance>) {
        let name = object.borrow().name.clone();
        if self.objects.shift_remove(&name).is_some() {
            self.host().handle_removed(&name);
            let _ = object.borrow().claims.release(); // the registry's claim
        }
    }
}
