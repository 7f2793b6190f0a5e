//! # Sable Meta
//!
//! The meta-object layer of the Sable runtime: the authoritative, mutable,
//! versioned description of every class's callable surface.
//!
//! ## Components
//!
//! - [`hierarchy`]: class/interface registry with assignability and
//!   supertype-distance queries
//! - [`method`]: immutable reflected-method descriptors with a total
//!   signature order enabling binary search
//! - [`members`]: the reflected-member cache — wraps raw registrations into
//!   descriptors exactly once per member
//! - [`metadata`]: per-class versioned method tables with atomic
//!   snapshot/publish semantics
//! - [`resolve`]: overload resolution over a metadata snapshot
//!
//! ## Versioning contract
//!
//! Every structural mutation of a class's method table goes through
//! [`metadata::MetaRegistry::mutate`], which installs a new immutable table
//! snapshot and bumps the class's version counter inside one critical
//! section. A dispatch decision cached against `(class, version)` is valid
//! iff the live version still matches.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod hierarchy;
pub mod members;
pub mod metadata;
pub mod method;
pub mod resolve;

pub use hierarchy::{ClassDef, Hierarchy};
pub use members::MemberCache;
pub use metadata::{ClassMetadata, MetaRegistry, MethodTable, Mutation};
pub use method::{Modifiers, NativeFn, ParamType, RawMethod, ReflectedMethod};
pub use resolve::Resolver;
