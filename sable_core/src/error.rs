//! Error types and result definitions for dynamic dispatch.
//!
//! The taxonomy separates four failure families that callers must treat
//! differently:
//!
//! - resolution failures (`NoSuchMethod`, `AmbiguousMethod`) — recoverable by
//!   the missing-method hook or surfaced with full signature detail
//! - access failures (`AccessDenied`) — never treated as "try next overload"
//! - plumbing failures (`InvocationFailure`, `Internal`) — dispatch bugs
//! - application exceptions (`Raised`) — thrown by the callee body and
//!   propagated to the caller unchanged

use crate::value::Value;
use thiserror::Error;

/// The unified result type used throughout the dispatch engine.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Comprehensive error type covering all dispatch failure conditions.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// No method matches the name, arity, and argument types.
    #[error(
        "NoSuchMethodError: no signature of method {receiver_type}.{name}() \
         is applicable for argument types: ({arg_types})"
    )]
    NoSuchMethod {
        /// Attempted method name.
        name: String,
        /// Runtime type name of the receiver.
        receiver_type: String,
        /// Comma-separated argument type names tried.
        arg_types: String,
    },

    /// Two or more equally good candidates with no legitimate tie-break.
    #[error(
        "AmbiguousMethodError: ambiguous call {receiver_type}.{name}({arg_types}); \
         candidates declared on: {candidates}"
    )]
    AmbiguousMethod {
        /// Attempted method name.
        name: String,
        /// Runtime type name of the receiver.
        receiver_type: String,
        /// Comma-separated argument type names tried.
        arg_types: String,
        /// Declaring classes of the tied candidates.
        candidates: String,
    },

    /// Member exists but is not accessible from dispatch.
    #[error("AccessDeniedError: cannot access method {class_name}.{name}()")]
    AccessDenied {
        /// Method name.
        name: String,
        /// Declaring class name.
        class_name: String,
    },

    /// Two registrations on one class share an identical signature.
    #[error("DuplicateMethodError: duplicate signature for {class_name}.{name}()")]
    DuplicateMethod {
        /// Method name.
        name: String,
        /// Declaring class name.
        class_name: String,
    },

    /// Invocation mechanics failed: the selected target could not be called
    /// with the given argument shapes. Indicates a dispatch bug, not a user
    /// error.
    #[error("InvocationError: {message}")]
    InvocationFailure {
        /// Description of the plumbing failure.
        message: String,
    },

    /// An exception raised by the invoked method body itself. Must reach the
    /// caller unwrapped.
    #[error("UnhandledException: {value}")]
    Raised {
        /// The raised payload.
        value: Value,
    },

    /// Internal invariant violation (should never occur).
    #[error("InternalError: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl DispatchError {
    /// Create a "no such method" error.
    #[must_use]
    pub fn no_such_method(
        name: impl Into<String>,
        receiver_type: impl Into<String>,
        arg_types: impl Into<String>,
    ) -> Self {
        Self::NoSuchMethod {
            name: name.into(),
            receiver_type: receiver_type.into(),
            arg_types: arg_types.into(),
        }
    }

    /// Create an ambiguity error.
    #[must_use]
    pub fn ambiguous(
        name: impl Into<String>,
        receiver_type: impl Into<String>,
        arg_types: impl Into<String>,
        candidates: impl Into<String>,
    ) -> Self {
        Self::AmbiguousMethod {
            name: name.into(),
            receiver_type: receiver_type.into(),
            arg_types: arg_types.into(),
            candidates: candidates.into(),
        }
    }

    /// Create an access-denied error.
    #[must_use]
    pub fn access_denied(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self::AccessDenied {
            name: name.into(),
            class_name: class_name.into(),
        }
    }

    /// Create a duplicate-registration error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self::DuplicateMethod {
            name: name.into(),
            class_name: class_name.into(),
        }
    }

    /// Create an invocation plumbing failure.
    #[must_use]
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::InvocationFailure {
            message: message.into(),
        }
    }

    /// Create an application exception carrying a payload value.
    #[must_use]
    pub fn raised(value: Value) -> Self {
        Self::Raised { value }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error may be recovered by the missing-method hook.
    #[inline]
    #[must_use]
    pub fn is_resolution_miss(&self) -> bool {
        matches!(self, Self::NoSuchMethod { .. })
    }

    /// Whether this is an application exception that must propagate
    /// unchanged.
    #[inline]
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Raised { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_method_message() {
        let err = DispatchError::no_such_method("speak", "Dog", "int, String");
        let msg = err.to_string();
        assert!(msg.contains("Dog.speak()"));
        assert!(msg.contains("int, String"));
        assert!(err.is_resolution_miss());
    }

    #[test]
    fn test_ambiguous_message() {
        let err = DispatchError::ambiguous("f", "Thing", "String", "A, B");
        let msg = err.to_string();
        assert!(msg.contains("ambiguous"));
        assert!(msg.contains("A, B"));
        assert!(!err.is_resolution_miss());
    }

    #[test]
    fn test_access_denied_message() {
        let err = DispatchError::access_denied("hidden", "Safe");
        assert!(err.to_string().contains("Safe.hidden()"));
    }

    #[test]
    fn test_raised_propagation_flag() {
        let err = DispatchError::raised(Value::str("boom"));
        assert!(err.is_application());
        assert!(err.to_string().contains("boom"));

        let plumbing = DispatchError::invocation("argument count mismatch");
        assert!(!plumbing.is_application());
    }

    #[test]
    fn test_internal_message() {
        let err = DispatchError::internal("signature collision survived sort");
        assert!(err.to_string().starts_with("InternalError"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = DispatchError::duplicate("m", "C");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
