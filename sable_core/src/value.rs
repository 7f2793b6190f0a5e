//! Runtime value representation.
//!
//! Sable values form a small tagged union: primitives are stored inline,
//! strings are interned symbols, and class instances are reference-counted.
//! Every value can report its runtime type as a [`TypeKey`] in O(1), which
//! the dispatch resolver and call-site guards rely on.

use crate::intern::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Class Identity
// =============================================================================

/// Compact class identifier for fast identity checks.
///
/// Uses a `u32` to avoid pointer chasing in guard checks. Well-known classes
/// have fixed IDs; user-defined classes get IDs from a counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Root of the class hierarchy.
    pub const OBJECT: Self = Self(0);
    /// Pseudo-class that a null receiver dispatches against.
    pub const NULL: Self = Self(1);
    /// String class.
    pub const STRING: Self = Self(2);
    /// Boxed integer class.
    pub const INT: Self = Self(3);
    /// Boxed float class.
    pub const FLOAT: Self = Self(4);
    /// Boxed boolean class.
    pub const BOOL: Self = Self(5);

    /// First ID available for user-defined classes.
    pub const FIRST_USER: u32 = 8;

    /// Get the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a built-in class.
    #[inline]
    #[must_use]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

// =============================================================================
// Runtime Type Key
// =============================================================================

/// The runtime type of a value, as seen by overload resolution.
///
/// Primitives keep their own keys (a primitive argument is not the same as
/// its boxed class for distance purposes); object values carry their class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeKey {
    /// The null value.
    Null,
    /// Primitive boolean.
    Bool,
    /// Primitive 64-bit integer.
    Int,
    /// Primitive 64-bit float.
    Float,
    /// Interned string.
    Str,
    /// Instance of a class.
    Object(ClassId),
}

impl TypeKey {
    /// The class a value of this type dispatches against.
    ///
    /// Null maps to the dedicated null pseudo-class rather than failing, so
    /// null-safe call semantics can still resolve an overload.
    #[inline]
    #[must_use]
    pub const fn runtime_class(self) -> ClassId {
        match self {
            TypeKey::Null => ClassId::NULL,
            TypeKey::Bool => ClassId::BOOL,
            TypeKey::Int => ClassId::INT,
            TypeKey::Float => ClassId::FLOAT,
            TypeKey::Str => ClassId::STRING,
            TypeKey::Object(c) => c,
        }
    }
}

// =============================================================================
// Instances
// =============================================================================

/// A heap-allocated class instance.
///
/// Instances carry their class identity (used by call-site guards) and a
/// small dynamic field map.
#[derive(Debug)]
pub struct Instance {
    class: ClassId,
    fields: RwLock<FxHashMap<Symbol, Value>>,
}

impl Instance {
    /// Create a new instance of the given class with no fields.
    #[must_use]
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            fields: RwLock::new(FxHashMap::default()),
        }
    }

    /// The instance's class identity.
    #[inline]
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Read a field, if present.
    #[must_use]
    pub fn get_field(&self, name: &Symbol) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    /// Write a field.
    pub fn set_field(&self, name: Symbol, value: Value) {
        self.fields.write().insert(name, value);
    }
}

/// Shared reference to an instance.
pub type ObjectRef = Arc<Instance>;

// =============================================================================
// Values
// =============================================================================

/// A Sable runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    /// The null value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Interned string.
    Str(Symbol),
    /// Class instance.
    Object(ObjectRef),
}

impl Value {
    /// Build a string value from the global interner.
    #[inline]
    #[must_use]
    pub fn str(s: &str) -> Self {
        Value::Str(crate::intern::intern(s))
    }

    /// Build an object value.
    #[inline]
    #[must_use]
    pub fn object(instance: Instance) -> Self {
        Value::Object(Arc::new(instance))
    }

    /// The runtime type of this value.
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Null => TypeKey::Null,
            Value::Bool(_) => TypeKey::Bool,
            Value::Int(_) => TypeKey::Int,
            Value::Float(_) => TypeKey::Float,
            Value::Str(_) => TypeKey::Str,
            Value::Object(o) => TypeKey::Object(o.class()),
        }
    }

    /// The class this value dispatches against.
    #[inline]
    #[must_use]
    pub fn runtime_class(&self) -> ClassId {
        self.type_key().runtime_class()
    }

    /// Check for null.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract an integer, if this is one.
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a float, if this is one.
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract a string symbol, if this is one.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&Symbol> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extract an object reference, if this is one.
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s.as_str()),
            Value::Object(o) => write!(f, "<object class={}>", o.class().raw()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_builtins_are_distinct() {
        let ids = [
            ClassId::OBJECT,
            ClassId::NULL,
            ClassId::STRING,
            ClassId::INT,
            ClassId::FLOAT,
            ClassId::BOOL,
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
            assert!(a.is_builtin());
        }
        assert!(!ClassId(ClassId::FIRST_USER).is_builtin());
    }

    #[test]
    fn test_type_key_runtime_class() {
        assert_eq!(TypeKey::Null.runtime_class(), ClassId::NULL);
        assert_eq!(TypeKey::Int.runtime_class(), ClassId::INT);
        assert_eq!(TypeKey::Str.runtime_class(), ClassId::STRING);
        assert_eq!(
            TypeKey::Object(ClassId(42)).runtime_class(),
            ClassId(42)
        );
    }

    #[test]
    fn test_value_type_keys() {
        assert_eq!(Value::Null.type_key(), TypeKey::Null);
        assert_eq!(Value::Bool(true).type_key(), TypeKey::Bool);
        assert_eq!(Value::Int(1).type_key(), TypeKey::Int);
        assert_eq!(Value::Float(1.5).type_key(), TypeKey::Float);
        assert_eq!(Value::str("x").type_key(), TypeKey::Str);

        let obj = Value::object(Instance::new(ClassId(99)));
        assert_eq!(obj.type_key(), TypeKey::Object(ClassId(99)));
        assert_eq!(obj.runtime_class(), ClassId(99));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Float(2.0).as_float(), Some(2.0));
        assert!(Value::Int(7).as_float().is_none());
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(false).is_null());
    }

    #[test]
    fn test_str_values_compare_by_content() {
        // Same content goes through the global interner, so equality holds
        // across independently constructed values.
        assert_eq!(Value::str("Woof"), Value::str("Woof"));
        assert_ne!(Value::str("Woof"), Value::str("Meow"));
    }

    #[test]
    fn test_object_equality_is_identity() {
        let a = Value::object(Instance::new(ClassId(9)));
        let b = Value::object(Instance::new(ClassId(9)));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_instance_fields() {
        let inst = Instance::new(ClassId(10));
        let name = crate::intern::intern("x");
        assert!(inst.get_field(&name).is_none());

        inst.set_field(name.clone(), Value::Int(3));
        assert_eq!(inst.get_field(&name), Some(Value::Int(3)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::str("hi").to_string(), "hi");
    }
}
