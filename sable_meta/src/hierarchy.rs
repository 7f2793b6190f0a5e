//! Class and interface registry.
//!
//! Classes form a single-inheritance tree rooted at `Object`, with
//! marker interfaces providing additional assignability edges. The registry
//! answers the two questions overload resolution needs: "is assignable" and
//! "how far up".

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sable_core::intern::{intern, Symbol};
use sable_core::value::ClassId;
use smallvec::SmallVec;

/// Definition of one registered class or interface.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Class name.
    pub name: Symbol,
    /// Superclass; `None` only for `Object` and interfaces.
    pub superclass: Option<ClassId>,
    /// Implemented (or extended, for interfaces) interfaces.
    pub interfaces: SmallVec<[ClassId; 2]>,
    /// Whether this entry is an interface.
    pub is_interface: bool,
}

struct Inner {
    defs: Vec<ClassDef>,
    by_name: FxHashMap<Symbol, ClassId>,
}

/// Thread-safe class hierarchy registry.
///
/// Built-in classes occupy fixed low IDs (see [`ClassId`]); user classes are
/// appended. Registration is append-only: classes are never removed, so a
/// `ClassId` stays valid for the process lifetime.
pub struct Hierarchy {
    inner: RwLock<Inner>,
}

impl Hierarchy {
    /// Create a hierarchy pre-populated with the built-in classes.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = Inner {
            defs: Vec::with_capacity(16),
            by_name: FxHashMap::default(),
        };

        fn builtin(inner: &mut Inner, name: &str, superclass: Option<ClassId>) -> ClassId {
            let id = ClassId(inner.defs.len() as u32);
            let sym = intern(name);
            inner.defs.push(ClassDef {
                name: sym.clone(),
                superclass,
                interfaces: SmallVec::new(),
                is_interface: false,
            });
            inner.by_name.insert(sym, id);
            id
        }

        let object = builtin(&mut inner, "Object", None);
        let null = builtin(&mut inner, "Null", Some(object));
        let string = builtin(&mut inner, "String", Some(object));
        let int = builtin(&mut inner, "Integer", Some(object));
        let float = builtin(&mut inner, "Float", Some(object));
        let boolean = builtin(&mut inner, "Boolean", Some(object));
        debug_assert_eq!(object, ClassId::OBJECT);
        debug_assert_eq!(null, ClassId::NULL);
        debug_assert_eq!(string, ClassId::STRING);
        debug_assert_eq!(int, ClassId::INT);
        debug_assert_eq!(float, ClassId::FLOAT);
        debug_assert_eq!(boolean, ClassId::BOOL);

        // Reserved slots so user IDs start at FIRST_USER.
        while inner.defs.len() < ClassId::FIRST_USER as usize {
            let name = format!("<reserved-{}>", inner.defs.len());
            builtin(&mut inner, &name, Some(object));
        }

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Register a class extending `superclass` (or `Object` if `None`).
    pub fn register(&self, name: &str, superclass: Option<ClassId>) -> ClassId {
        self.register_with(name, superclass, &[])
    }

    /// Register a class with explicit interfaces.
    pub fn register_with(
        &self,
        name: &str,
        superclass: Option<ClassId>,
        interfaces: &[ClassId],
    ) -> ClassId {
        self.insert(name, Some(superclass.unwrap_or(ClassId::OBJECT)), interfaces, false)
    }

    /// Register an interface, optionally extending other interfaces.
    pub fn register_interface(&self, name: &str, extends: &[ClassId]) -> ClassId {
        self.insert(name, None, extends, true)
    }

    fn insert(
        &self,
        name: &str,
        superclass: Option<ClassId>,
        interfaces: &[ClassId],
        is_interface: bool,
    ) -> ClassId {
        let sym = intern(name);
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_name.get(&sym) {
            let existing = *existing;
            // Re-registration is idempotent only for an identical definition.
            let def = &inner.defs[existing.raw() as usize];
            debug_assert!(
                def.superclass == superclass
                    && def.interfaces.as_slice() == interfaces
                    && def.is_interface == is_interface,
                "conflicting redefinition of class {name}"
            );
            return existing;
        }
        let id = ClassId(inner.defs.len() as u32);
        inner.defs.push(ClassDef {
            name: sym.clone(),
            superclass,
            interfaces: interfaces.iter().copied().collect(),
            is_interface,
        });
        inner.by_name.insert(sym, id);
        id
    }

    /// Name of a class.
    #[must_use]
    pub fn name_of(&self, class: ClassId) -> Symbol {
        let inner = self.inner.read();
        inner
            .defs
            .get(class.raw() as usize)
            .map_or_else(|| intern("<unknown>"), |d| d.name.clone())
    }

    /// Display name as an owned string (for error messages).
    #[must_use]
    pub fn display_name(&self, class: ClassId) -> String {
        self.name_of(class).as_str().to_owned()
    }

    /// Look up a class by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        let sym = intern(name);
        self.inner.read().by_name.get(&sym).copied()
    }

    /// Direct superclass of a class.
    #[must_use]
    pub fn superclass(&self, class: ClassId) -> Option<ClassId> {
        let inner = self.inner.read();
        inner.defs.get(class.raw() as usize).and_then(|d| d.superclass)
    }

    /// Whether a value of class `source` can be used where `target` is
    /// declared.
    #[must_use]
    pub fn is_assignable(&self, target: ClassId, source: ClassId) -> bool {
        self.supertype_distance(source, target).is_some()
    }

    /// Hierarchy distance from `source` up to `target`.
    ///
    /// `Some(0)` for identity; each superclass step and each interface hop
    /// adds one. Interface paths use the longest route, so a type reachable
    /// both directly and through an intermediate interface counts the deeper
    /// path. Returns `None` when `target` is not a supertype.
    #[must_use]
    pub fn supertype_distance(&self, source: ClassId, target: ClassId) -> Option<u32> {
        let inner = self.inner.read();
        Self::distance_rec(&inner, source, target)
    }

    fn distance_rec(inner: &Inner, source: ClassId, target: ClassId) -> Option<u32> {
        if source == target {
            return Some(0);
        }
        let def = inner.defs.get(source.raw() as usize)?;

        let mut result: Option<u32> = None;
        for &itf in &def.interfaces {
            if let Some(d) = Self::distance_rec(inner, itf, target) {
                let d = d + 1;
                result = Some(result.map_or(d, |r| r.max(d)));
            }
        }
        if let Some(sup) = def.superclass {
            if let Some(d) = Self::distance_rec(inner, sup, target) {
                let d = d + 1;
                result = Some(result.map_or(d, |r| r.max(d)));
            }
        }
        result
    }

    /// Number of registered classes (including built-ins).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().defs.len()
    }

    /// Always false; the built-ins are registered at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("classes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let h = Hierarchy::new();
        assert_eq!(h.by_name("Object"), Some(ClassId::OBJECT));
        assert_eq!(h.by_name("String"), Some(ClassId::STRING));
        assert_eq!(h.by_name("Null"), Some(ClassId::NULL));
        assert_eq!(h.superclass(ClassId::STRING), Some(ClassId::OBJECT));
        assert_eq!(h.superclass(ClassId::OBJECT), None);
    }

    #[test]
    fn test_user_ids_start_after_reserved() {
        let h = Hierarchy::new();
        let c = h.register("Dog", None);
        assert!(c.raw() >= ClassId::FIRST_USER);
        assert_eq!(h.display_name(c), "Dog");
    }

    #[test]
    fn test_register_is_idempotent_by_name() {
        let h = Hierarchy::new();
        let a = h.register("Animal", None);
        let b = h.register("Animal", None);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "conflicting redefinition")]
    fn test_conflicting_redefinition_is_rejected() {
        let h = Hierarchy::new();
        let animal = h.register("Animal", None);
        h.register("Dog", Some(animal));
        h.register("Dog", None);
    }

    #[test]
    fn test_assignability_chain() {
        let h = Hierarchy::new();
        let animal = h.register("Animal", None);
        let dog = h.register("Dog", Some(animal));

        assert!(h.is_assignable(animal, dog));
        assert!(h.is_assignable(ClassId::OBJECT, dog));
        assert!(!h.is_assignable(dog, animal));
    }

    #[test]
    fn test_supertype_distance_steps() {
        let h = Hierarchy::new();
        let animal = h.register("Animal", None);
        let dog = h.register("Dog", Some(animal));

        assert_eq!(h.supertype_distance(dog, dog), Some(0));
        assert_eq!(h.supertype_distance(dog, animal), Some(1));
        assert_eq!(h.supertype_distance(dog, ClassId::OBJECT), Some(2));
        assert_eq!(h.supertype_distance(animal, dog), None);
    }

    #[test]
    fn test_interface_distance_uses_longest_path() {
        let h = Hierarchy::new();
        let base = h.register_interface("Base", &[]);
        let mid = h.register_interface("Mid", &[base]);
        // Implements Base both directly and through Mid; the longer path wins.
        let c = h.register_with("Impl", None, &[base, mid]);

        assert_eq!(h.supertype_distance(c, base), Some(2));
        assert_eq!(h.supertype_distance(c, mid), Some(1));
    }

    #[test]
    fn test_interface_assignability() {
        let h = Hierarchy::new();
        let walks = h.register_interface("Walks", &[]);
        let animal = h.register_with("Animal", None, &[walks]);
        let dog = h.register("Dog", Some(animal));

        assert!(h.is_assignable(walks, dog));
        assert_eq!(h.supertype_distance(dog, walks), Some(2));
    }
}
