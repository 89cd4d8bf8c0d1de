use objkit_core::decl::{MethodFlavor, Protection};

use crate::class::Class;
use crate::member::Method;
use crate::ObjRef;

/// Whether a member with the given protection, declared in `holder`, may be
/// touched from `scope` (`None` meaning outside any class).
///
/// `protected` is checked symmetrically: access is granted when either
/// class's heritage set contains the other, so a base can reach protected
/// members it hands down and a subclass can reach inherited ones.
pub fn can_access(
    protection: Protection,
    holder: &ObjRef<Class>,
    scope: Option<&ObjRef<Class>>,
) -> bool {
    match protection {
        Protection::Public => true,
        Protection::Private => match scope {
            Some(scope) => scope.borrow().id == holder.borrow().id,
            None => false,
        },
        Protection::Protected => match scope {
            Some(scope) => {
                let holder_id = holder.borrow().id;
                let scope_id = scope.borrow().id;
                scope.borrow().has_ancestor(holder_id) || holder.borrow().has_ancestor(scope_id)
            }
            None => false,
        },
    }
}

/// Method access adds one rule on top of [`can_access`]: a protected method
/// is also reachable from an ancestor scope of its declaring class when that
/// scope independently declares a same-named, non-common, non-private method.
/// This lets a base class's generic dispatch reach a subclass override
/// without widening the general visibility rules.
pub fn can_access_method(method: &Method, scope: Option<&ObjRef<Class>>) -> bool {
    let holder = match method.holder.upgrade() {
        Some(holder) => holder,
        None => return false,
    };
    if can_access(method.protection, &holder, scope) {
        return true;
    }
    if method.protection != Protection::Protected {
        return false;
    }
    let scope = match scope {
        Some(scope) => scope,
        None => return false,
    };
    if !holder.borrow().has_ancestor(scope.borrow().id) {
        return false;
    }
    let scope = scope.borrow();
    match scope.methods.get(&method.name) {
        Some(own) => {
            own.flavor == MethodFlavor::Normal
                && !own.common
                && own.protection != Protection::Private
        }
        None => false,
    }
}
