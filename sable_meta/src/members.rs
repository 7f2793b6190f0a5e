//! Reflected-member cache.
//!
//! Registration hands over a [`RawMethod`]; the cache wraps it into a
//! [`ReflectedMethod`] exactly once, assigns it a process-unique id and keeps
//! the wrapped descriptor for every later table build. Wrapping interns the
//! signature names, so doing it once per member keeps table rebuilds cheap.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sable_core::error::{DispatchError, DispatchResult};
use sable_core::intern::Symbol;
use sable_core::value::ClassId;

use crate::hierarchy::Hierarchy;
use crate::method::{RawMethod, ReflectedMethod};

/// Per-class store of wrapped method descriptors.
///
/// Holds only members declared directly on each class; inherited members are
/// assembled by the metadata layer when it builds a class's method table.
pub struct MemberCache {
    next_id: AtomicU32,
    declared: RwLock<FxHashMap<ClassId, Vec<ReflectedMethod>>>,
}

impl MemberCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(0),
            declared: RwLock::new(FxHashMap::default()),
        }
    }

    /// Wrap and store a raw registration.
    ///
    /// Rejects a second registration with the same signature on the same
    /// class. The returned descriptor is the one every future table build
    /// will reuse.
    pub fn register(
        &self,
        hierarchy: &Hierarchy,
        raw: RawMethod,
    ) -> DispatchResult<ReflectedMethod> {
        let class = raw.declaring;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped = ReflectedMethod::wrap(Arc::new(raw), id, hierarchy);

        let mut declared = self.declared.write();
        let slot = declared.entry(class).or_default();
        if slot.iter().any(|m| m.same_signature(&wrapped)) {
            return Err(DispatchError::duplicate(
                wrapped.name().as_str(),
                hierarchy.display_name(class),
            ));
        }
        slot.push(wrapped.clone());
        Ok(wrapped)
    }

    /// Remove every declared member named `name` on `class`. Returns the
    /// number removed.
    pub fn remove(&self, class: ClassId, name: &Symbol) -> usize {
        let mut declared = self.declared.write();
        let Some(slot) = declared.get_mut(&class) else {
            return 0;
        };
        let before = slot.len();
        slot.retain(|m| m.name() != name);
        before - slot.len()
    }

    /// Members declared directly on `class`, in registration order.
    #[must_use]
    pub fn declared_on(&self, class: ClassId) -> Vec<ReflectedMethod> {
        let declared = self.declared.read();
        declared.get(&class).cloned().unwrap_or_default()
    }

    /// Total wrapped descriptors across all classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.declared.read().values().map(Vec::len).sum()
    }

    /// Whether the cache holds no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemberCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberCache")
            .field("members", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{Modifiers, ParamType};
    use sable_core::intern::intern;
    use sable_core::value::Value;
    use smallvec::{smallvec, SmallVec};

    fn raw(name: &str, params: SmallVec<[ParamType; 4]>, declaring: ClassId) -> RawMethod {
        RawMethod {
            name: intern(name),
            params,
            ret: ParamType::OBJECT,
            declaring,
            modifiers: Modifiers::PUBLIC,
            body: Arc::new(|_, _| Ok(Value::Null)),
        }
    }

    #[test]
    fn test_register_assigns_increasing_ids() {
        let h = Hierarchy::new();
        let cache = MemberCache::new();
        let a = cache.register(&h, raw("a", smallvec![], ClassId::OBJECT)).unwrap();
        let b = cache.register(&h, raw("b", smallvec![], ClassId::OBJECT)).unwrap();
        assert!(a.id() < b.id());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let h = Hierarchy::new();
        let cache = MemberCache::new();
        cache
            .register(&h, raw("f", smallvec![ParamType::Int], ClassId::OBJECT))
            .unwrap();
        let err = cache
            .register(&h, raw("f", smallvec![ParamType::Int], ClassId::OBJECT))
            .unwrap_err();
        assert!(matches!(err, DispatchError::DuplicateMethod { .. }));
    }

    #[test]
    fn test_same_signature_on_different_classes_allowed() {
        let h = Hierarchy::new();
        let sub = h.register("Sub", None);
        let cache = MemberCache::new();
        cache
            .register(&h, raw("f", smallvec![], ClassId::OBJECT))
            .unwrap();
        cache.register(&h, raw("f", smallvec![], sub)).unwrap();
        assert_eq!(cache.declared_on(sub).len(), 1);
    }

    #[test]
    fn test_remove_by_name() {
        let h = Hierarchy::new();
        let cache = MemberCache::new();
        cache.register(&h, raw("f", smallvec![], ClassId::OBJECT)).unwrap();
        cache
            .register(&h, raw("f", smallvec![ParamType::Int], ClassId::OBJECT))
            .unwrap();
        cache.register(&h, raw("g", smallvec![], ClassId::OBJECT)).unwrap();

        assert_eq!(cache.remove(ClassId::OBJECT, &intern("f")), 2);
        assert_eq!(cache.declared_on(ClassId::OBJECT).len(), 1);
        assert_eq!(cache.remove(ClassId::OBJECT, &intern("missing")), 0);
    }
}
