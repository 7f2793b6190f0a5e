//! Symbol interning for O(1) name equality and reduced memory usage.
//!
//! Method and class names are compared on every dispatch, so they are stored
//! as interned symbols: unique copies with lightweight handles that compare
//! by pointer. Two `Symbol`s interned through the same interner are equal if
//! and only if their contents are equal.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A handle to an interned name.
///
/// `Symbol` is a thin wrapper around an `Arc<str>` providing O(1) equality
/// via pointer comparison. Hashing is pointer-based for consistency with
/// equality, which makes symbols cheap hash-map keys on the dispatch path.
#[derive(Clone)]
pub struct Symbol {
    inner: Arc<str>,
}

impl Symbol {
    #[inline]
    fn new(s: Arc<str>) -> Self {
        Self { inner: s }
    }

    /// Get the name content.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Get the length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the symbol is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Stable address of the interned data, usable as a compact cache key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> usize {
        self.inner.as_ptr() as usize
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.as_ptr().hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Symbol {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for Symbol {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Thread-safe symbol interner.
///
/// Interning the same string multiple times returns the same handle.
pub struct SymbolInterner {
    map: RwLock<FxHashMap<Arc<str>, Symbol>>,
}

impl SymbolInterner {
    /// Create a new, empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
        }
    }

    /// Intern a name, returning a handle.
    ///
    /// If the name has been interned before, the same handle is returned.
    pub fn intern(&self, s: &str) -> Symbol {
        // Fast path: already interned, read lock only
        {
            let map = self.map.read();
            if let Some(sym) = map.get(s) {
                return sym.clone();
            }
        }

        let mut map = self.map.write();

        // Double-check after acquiring write lock
        if let Some(sym) = map.get(s) {
            return sym.clone();
        }

        let arc: Arc<str> = s.into();
        let sym = Symbol::new(arc.clone());
        map.insert(arc, sym.clone());
        sym
    }

    /// Get an already-interned symbol without creating a new one.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.map.read().get(s).cloned()
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Check if the interner is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolInterner")
            .field("count", &self.map.read().len())
            .finish()
    }
}

/// Global interner for method and class names.
pub static GLOBAL_INTERNER: std::sync::LazyLock<SymbolInterner> =
    std::sync::LazyLock::new(SymbolInterner::new);

/// Intern a name using the global interner.
#[inline]
pub fn intern(s: &str) -> Symbol {
    GLOBAL_INTERNER.intern(s)
}
