//! # Sable Dispatch
//!
//! Dynamic method dispatch with polymorphic inline call-site caching.
//!
//! Compiled code references one [`CallSiteArray`] per unit; each cell is a
//! self-specializing [`CallSite`] that remembers its last dispatch decision
//! under a `(receiver class, metadata version)` guard and converges to a
//! resolver-free monomorphic fast path. Structural class mutations bump the
//! metadata version, so stale decisions fail their guard and re-resolve
//! transparently; sites that see too many receiver shapes disable their
//! cache and fall back to plain resolved dispatch.
//!
//! ## Layers
//!
//! - [`engine`]: facade owning hierarchy, metadata and resolver, plus the
//!   missing-method hook
//! - [`site_array`] / [`site`]: per-unit cell arrays and the inline-cache
//!   state machine
//! - [`invoke`]: arity checking, int-to-float coercion and the native call

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod invoke;
pub mod site;
pub mod site_array;

pub use engine::{DispatchEngine, MissingMethodHook};
pub use site::{CachedTarget, CallSite, SiteState, SiteStats, MEGAMORPHIC_THRESHOLD};
pub use site_array::{CallSiteArray, SiteDescriptor};
