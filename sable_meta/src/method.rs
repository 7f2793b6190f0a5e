//! Reflected-method descriptors.
//!
//! A [`RawMethod`] is what a user registers: a name, a declared signature and
//! a native body. A [`ReflectedMethod`] is the immutable wrapped form that
//! the rest of the runtime works with. Wrapping precomputes the interned
//! signature components so descriptors carry a total order that needs no
//! registry lookups, which is what lets method tables binary-search.

use std::cmp::Ordering;
use std::sync::Arc;

use sable_core::error::DispatchResult;
use sable_core::intern::{intern, Symbol};
use sable_core::value::{ClassId, Value};
use smallvec::SmallVec;

use crate::hierarchy::Hierarchy;

// ============================================================================
// Signatures
// ============================================================================

/// Declared type of a single parameter (or return).
///
/// Primitives are distinct from their boxed reference classes: an `Int`
/// parameter only accepts integer values, while `Ref(ClassId::INT)` also
/// participates in reference conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// 64-bit integer primitive.
    Int,
    /// 64-bit float primitive.
    Float,
    /// Boolean primitive.
    Bool,
    /// Any reference type, identified by class.
    Ref(ClassId),
}

impl ParamType {
    /// The `Object` reference type.
    pub const OBJECT: ParamType = ParamType::Ref(ClassId::OBJECT);
    /// The `String` reference type.
    pub const STRING: ParamType = ParamType::Ref(ClassId::STRING);

    /// Interned display name. Reference types resolve through the hierarchy.
    #[must_use]
    pub fn display_name(self, hierarchy: &Hierarchy) -> Symbol {
        match self {
            ParamType::Int => intern("int"),
            ParamType::Float => intern("float"),
            ParamType::Bool => intern("bool"),
            ParamType::Ref(class) => hierarchy.name_of(class),
        }
    }
}

// ============================================================================
// Modifiers
// ============================================================================

/// Method modifier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    /// No flags: a public instance method.
    pub const PUBLIC: Modifiers = Modifiers(0);
    /// Not callable through dynamic dispatch.
    pub const PRIVATE: Modifiers = Modifiers(1);
    /// Dispatched on a class rather than an instance.
    pub const STATIC: Modifiers = Modifiers(1 << 1);
    /// Trailing parameter collects surplus arguments.
    pub const VARARGS: Modifiers = Modifiers(1 << 2);

    /// Combine two flag sets.
    #[must_use]
    pub const fn with(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    /// Whether the private flag is absent.
    #[must_use]
    pub const fn is_public(self) -> bool {
        self.0 & Modifiers::PRIVATE.0 == 0
    }

    /// Whether the private flag is set.
    #[must_use]
    pub const fn is_private(self) -> bool {
        !self.is_public()
    }

    /// Whether the static flag is set.
    #[must_use]
    pub const fn is_static(self) -> bool {
        self.0 & Modifiers::STATIC.0 != 0
    }

    /// Whether the varargs flag is set.
    #[must_use]
    pub const fn is_varargs(self) -> bool {
        self.0 & Modifiers::VARARGS.0 != 0
    }
}

// ============================================================================
// Raw methods
// ============================================================================

/// Native implementation of a method body.
///
/// Receives the receiver value and the (already coerced) argument slice.
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> DispatchResult<Value> + Send + Sync>;

/// An as-registered method definition, before reflection wrapping.
#[derive(Clone)]
pub struct RawMethod {
    /// Method name.
    pub name: Symbol,
    /// Declared parameter types. For varargs methods the last entry is the
    /// element type of the collecting parameter.
    pub params: SmallVec<[ParamType; 4]>,
    /// Declared return type.
    pub ret: ParamType,
    /// Class that declares this method.
    pub declaring: ClassId,
    /// Modifier flags.
    pub modifiers: Modifiers,
    /// Native body.
    pub body: NativeFn,
}

impl std::fmt::Debug for RawMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .field("declaring", &self.declaring)
            .field("modifiers", &self.modifiers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reflected methods
// ============================================================================

/// Immutable reflected form of a registered method.
///
/// Carries interned signature names captured at wrap time, so ordering and
/// equality are self-contained string comparisons. The `id` is a process-wide
/// unique registration number used only as the final ordering tiebreak.
#[derive(Clone)]
pub struct ReflectedMethod {
    raw: Arc<RawMethod>,
    id: u32,
    param_names: SmallVec<[Symbol; 4]>,
    return_name: Symbol,
}

impl ReflectedMethod {
    /// Wrap a raw registration, resolving signature names through the
    /// hierarchy.
    #[must_use]
    pub fn wrap(raw: Arc<RawMethod>, id: u32, hierarchy: &Hierarchy) -> Self {
        let param_names = raw
            .params
            .iter()
            .map(|p| p.display_name(hierarchy))
            .collect();
        let return_name = raw.ret.display_name(hierarchy);
        Self {
            raw,
            id,
            param_names,
            return_name,
        }
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &Symbol {
        &self.raw.name
    }

    /// Declared parameter types.
    #[must_use]
    pub fn params(&self) -> &[ParamType] {
        &self.raw.params
    }

    /// Interned parameter type names.
    #[must_use]
    pub fn param_names(&self) -> &[Symbol] {
        &self.param_names
    }

    /// Declared return type.
    #[must_use]
    pub fn ret(&self) -> ParamType {
        self.raw.ret
    }

    /// Declaring class.
    #[must_use]
    pub fn declaring(&self) -> ClassId {
        self.raw.declaring
    }

    /// Modifier flags.
    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        self.raw.modifiers
    }

    /// Whether this method collects surplus arguments.
    #[must_use]
    pub fn is_varargs(&self) -> bool {
        self.raw.modifiers.is_varargs()
    }

    /// Registration id (unique per process).
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Invoke the native body. Arguments must already be coerced to the
    /// declared signature.
    pub fn call(&self, receiver: &Value, args: &[Value]) -> DispatchResult<Value> {
        (self.raw.body)(receiver, args)
    }

    /// Whether two descriptors declare the same signature (name plus
    /// parameter types), regardless of body, declaring class or return type.
    #[must_use]
    pub fn same_signature(&self, other: &ReflectedMethod) -> bool {
        self.raw.name == other.raw.name && self.param_names == other.param_names
    }

    /// Human-readable `name(T1, T2)` form for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        let params: Vec<&str> = self.param_names.iter().map(|s| s.as_str()).collect();
        format!("{}({})", self.raw.name.as_str(), params.join(", "))
    }
}

impl std::fmt::Debug for ReflectedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectedMethod")
            .field("signature", &self.describe())
            .field("declaring", &self.raw.declaring)
            .field("id", &self.id)
            .finish()
    }
}

impl PartialEq for ReflectedMethod {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReflectedMethod {}

impl PartialOrd for ReflectedMethod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReflectedMethod {
    /// Total signature order: name, return type name, arity, parameter type
    /// names, then registration id. Tables sorted by this order support
    /// binary search on the name prefix.
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw
            .name
            .as_str()
            .cmp(other.raw.name.as_str())
            .then_with(|| self.return_name.as_str().cmp(other.return_name.as_str()))
            .then_with(|| self.param_names.len().cmp(&other.param_names.len()))
            .then_with(|| {
                for (a, b) in self.param_names.iter().zip(other.param_names.iter()) {
                    let ord = a.as_str().cmp(b.as_str());
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn raw(name: &str, params: SmallVec<[ParamType; 4]>, declaring: ClassId) -> Arc<RawMethod> {
        Arc::new(RawMethod {
            name: intern(name),
            params,
            ret: ParamType::OBJECT,
            declaring,
            modifiers: Modifiers::PUBLIC,
            body: Arc::new(|_, _| Ok(Value::Null)),
        })
    }

    #[test]
    fn test_wrap_captures_signature_names() {
        let h = Hierarchy::new();
        let m = ReflectedMethod::wrap(
            raw("greet", smallvec![ParamType::Int, ParamType::STRING], ClassId::OBJECT),
            0,
            &h,
        );
        assert_eq!(m.param_names()[0].as_str(), "int");
        assert_eq!(m.param_names()[1].as_str(), "String");
        assert_eq!(m.describe(), "greet(int, String)");
    }

    #[test]
    fn test_order_is_name_first() {
        let h = Hierarchy::new();
        let a = ReflectedMethod::wrap(raw("alpha", smallvec![], ClassId::OBJECT), 5, &h);
        let b = ReflectedMethod::wrap(raw("beta", smallvec![], ClassId::OBJECT), 1, &h);
        assert!(a < b);
    }

    #[test]
    fn test_order_arity_before_param_names() {
        let h = Hierarchy::new();
        let one = ReflectedMethod::wrap(raw("f", smallvec![ParamType::STRING], ClassId::OBJECT), 0, &h);
        let two = ReflectedMethod::wrap(
            raw("f", smallvec![ParamType::Int, ParamType::Int], ClassId::OBJECT),
            1,
            &h,
        );
        assert!(one < two);
    }

    #[test]
    fn test_same_signature_ignores_declaring() {
        let h = Hierarchy::new();
        let sub = h.register("Sub", None);
        let a = ReflectedMethod::wrap(raw("f", smallvec![ParamType::Int], ClassId::OBJECT), 0, &h);
        let b = ReflectedMethod::wrap(raw("f", smallvec![ParamType::Int], sub), 1, &h);
        assert!(a.same_signature(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_modifier_flags() {
        let m = Modifiers::PRIVATE.with(Modifiers::VARARGS);
        assert!(m.is_private());
        assert!(m.is_varargs());
        assert!(!m.is_static());
        assert!(Modifiers::PUBLIC.is_public());
    }
}
