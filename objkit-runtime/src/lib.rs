//!
//! This is the class/object runtime of objkit: classes, multiple inheritance,
//! instance lifecycles, components and delegation, layered on top of a
//! command-based scripting host.
//!

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Visibility checks for members.
pub mod access;
/// Facilities for manipulating class definitions.
pub mod class;
/// Component binding and call forwarding.
pub mod delegate;
/// The claim-counting ownership kernel.
pub mod hold;
/// The seam towards the embedding script host.
pub mod host;
/// Member enumeration and name reporting.
pub mod introspect;
/// Facilities for manipulating class instances.
pub mod instance;
/// Instance construction and destruction chains.
pub mod lifecycle;
/// Facilities for manipulating class members.
pub mod member;
/// Virtual method/variable table construction.
pub mod resolve;
/// The collection of all known classes and objects.
pub mod universe;

/// A strong and owning reference to an entity.
pub type ObjRef<T> = Rc<RefCell<T>>;
/// A weak reference to an entity.
pub type ObjWeakRef<T> = Weak<RefCell<T>>;
