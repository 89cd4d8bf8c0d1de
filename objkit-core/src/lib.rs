//!
//! This crate contains the types shared between a command-based scripting host
//! and the objkit object runtime: values, declaration descriptors, the
//! delegation-template language and the error type.
//!

/// Declaration descriptors for classes and their members.
pub mod decl;
/// The runtime's error type.
pub mod error;
/// The argument-rewrite template language used by delegation rules.
pub mod template;
/// Facilities for manipulating values.
pub mod value;
