//! # Sable Core
//!
//! Core types shared across the Sable dynamic-dispatch runtime:
//!
//! - **Value System**: tagged representation of runtime values with cheap
//!   runtime-type extraction
//! - **Interning**: symbol interning for O(1) method-name equality checks
//! - **Error Handling**: the unified dispatch error taxonomy and result alias

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod intern;
pub mod value;

pub use error::{DispatchError, DispatchResult};
pub use intern::{Symbol, SymbolInterner};
pub use value::{ClassId, Instance, ObjectRef, TypeKey, Value};

/// Sable runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
