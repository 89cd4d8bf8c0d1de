//!
//! The ownership kernel.
//!
//! Every registry-owned entity embeds a [`Claims`] counter. A live call frame
//! or table entry that needs the entity to survive a re-entrant operation
//! takes a claim with [`Claims::preserve`] and gives it back with
//! [`Claims::release`]. The entity may only be torn down once it has been
//! marked for eventual teardown *and* the last claim is gone; `release`
//! reports that moment to its caller, which performs the actual disposal
//! (unpublishing the registry entry — memory itself is reclaimed by `Rc`).
//!
//! Releasing more claims than were taken is a programming error and panics
//! rather than corrupting the teardown protocol.
//!

use std::cell::Cell;

/// A claim counter governing when an entity may be torn down.
#[derive(Debug, Default)]
pub struct Claims {
    count: Cell<usize>,
    eventually_free: Cell<bool>,
    disposed: Cell<bool>,
}

impl Claims {
    /// A fresh counter with no claims and no teardown mark.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a claim on the entity, keeping it alive across re-entrant calls.
    pub fn preserve(&self) {
        self.count.set(self.count.get() + 1);
    }

    /// Give back one claim.
    ///
    /// Returns `true` exactly once: when the last claim is gone and the
    /// entity was marked for eventual teardown. The caller must then dispose
    /// of the entity.
    ///
    /// # Panics
    ///
    /// Panics if called more times than [`Claims::preserve`].
    pub fn release(&self) -> bool {
        let count = self.count.get();
        assert!(count > 0, "released an entity with no outstanding claims");
        self.count.set(count - 1);
        if count == 1 && self.eventually_free.get() && !self.disposed.get() {
            self.disposed.set(true);
            return true;
        }
        false
    }

    /// Mark the entity for teardown once all claims are gone. Idempotent,
    /// and meaningful even before the first claim is taken.
    ///
    /// Returns `true` if no claims are outstanding, in which case the caller
    /// must dispose of the entity immediately.
    pub fn mark_eventually_free(&self) -> bool {
        self.eventually_free.set(true);
        if self.count.get() == 0 && !self.disposed.get() {
            self.disposed.set(true);
            return true;
        }
        false
    }

    /// How many claims are currently outstanding.
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Whether the entity has been marked for eventual teardown.
    pub fn is_doomed(&self) -> bool {
        self.eventually_free.get()
    }

    /// Whether the final disposal has already been triggered.
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}
