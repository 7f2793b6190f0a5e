//! Versioned per-class method tables.
//!
//! Each materialized class owns a [`ClassMetadata`]: an immutable
//! [`MethodTable`] snapshot plus a monotonically increasing version counter.
//! Structural mutations go through [`MetaRegistry::mutate`], which installs a
//! freshly built table and bumps the version inside one critical section on
//! the mutated class and every materialized subclass. A dispatch decision
//! cached against `(class, version)` is valid iff the live version still
//! matches, which is the whole guard a call site needs.
//!
//! # Design
//!
//! Readers never block writers for long: [`ClassMetadata::snapshot`] takes a
//! read lock only to copy out `(version, Arc<MethodTable>)`, and the hot
//! guard check [`MetaRegistry::version_of`] is a single atomic load behind a
//! map read lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sable_core::error::DispatchResult;
use sable_core::intern::Symbol;
use sable_core::value::ClassId;

use crate::hierarchy::Hierarchy;
use crate::members::MemberCache;
use crate::method::{RawMethod, ReflectedMethod};

// ============================================================================
// Method tables
// ============================================================================

/// Immutable, sorted table of every method callable on one class.
///
/// Includes inherited members; a subclass declaration with the same signature
/// shadows its superclass counterpart. Entries are sorted by the descriptor's
/// total signature order, so all overloads of a name form one contiguous run
/// found by binary search.
#[derive(Debug)]
pub struct MethodTable {
    methods: Vec<ReflectedMethod>,
}

impl MethodTable {
    /// Build the table for `class` from currently declared members.
    #[must_use]
    pub fn build(class: ClassId, hierarchy: &Hierarchy, members: &MemberCache) -> Self {
        let mut collected: Vec<ReflectedMethod> = Vec::new();

        // Most-derived first; shadowed superclass signatures are skipped.
        let mut cursor = Some(class);
        while let Some(current) = cursor {
            for m in members.declared_on(current) {
                if !collected.iter().any(|seen| seen.same_signature(&m)) {
                    collected.push(m);
                }
            }
            cursor = hierarchy.superclass(current);
        }

        collected.sort_unstable();
        Self { methods: collected }
    }

    /// All overloads named `name`, as one contiguous slice.
    #[must_use]
    pub fn methods_named(&self, name: &Symbol) -> &[ReflectedMethod] {
        let target = name.as_str();
        let start = self
            .methods
            .partition_point(|m| m.name().as_str() < target);
        let end = self
            .methods
            .partition_point(|m| m.name().as_str() <= target);
        &self.methods[start..end]
    }

    /// Every entry in signature order.
    #[must_use]
    pub fn all(&self) -> &[ReflectedMethod] {
        &self.methods
    }

    /// Number of callable methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the class has no callable methods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// ============================================================================
// Class metadata
// ============================================================================

/// The live metadata cell for one materialized class.
pub struct ClassMetadata {
    class: ClassId,
    version: AtomicU64,
    table: RwLock<Arc<MethodTable>>,
}

impl ClassMetadata {
    fn new(class: ClassId, table: MethodTable, version: u64) -> Self {
        Self {
            class,
            version: AtomicU64::new(version),
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// The class this metadata describes.
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Current version.
    ///
    /// Versions are drawn from a registry-wide monotonic counter, so a
    /// class's version strictly increases on every table install and a
    /// number observed for a class is never issued for it again, not even
    /// across eviction and re-materialization.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Consistent `(version, table)` pair.
    ///
    /// Taken under the table's read lock so a concurrent install can never
    /// produce a version paired with the wrong table.
    #[must_use]
    pub fn snapshot(&self) -> (u64, Arc<MethodTable>) {
        let table = self.table.read();
        (self.version.load(Ordering::Acquire), Arc::clone(&table))
    }

    /// Install a rebuilt table and advance to `version` in one critical
    /// section.
    fn install(&self, table: MethodTable, version: u64) {
        let mut slot = self.table.write();
        *slot = Arc::new(table);
        self.version.store(version, Ordering::Release);
    }
}

impl std::fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("class", &self.class)
            .field("version", &self.version())
            .finish()
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// A structural change to a class's callable surface.
pub enum Mutation {
    /// Declare a new method.
    AddMethod(RawMethod),
    /// Remove every declared method with this name.
    RemoveMethod(Symbol),
}

impl std::fmt::Debug for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mutation::AddMethod(raw) => f.debug_tuple("AddMethod").field(&raw.name).finish(),
            Mutation::RemoveMethod(name) => f.debug_tuple("RemoveMethod").field(name).finish(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owner of all materialized [`ClassMetadata`] cells.
///
/// Classes are materialized lazily on first dispatch; a mutation rebuilds the
/// tables of the mutated class and every materialized subclass, since
/// inherited members flow downward.
pub struct MetaRegistry {
    hierarchy: Arc<Hierarchy>,
    members: Arc<MemberCache>,
    classes: RwLock<FxHashMap<ClassId, Arc<ClassMetadata>>>,
    // Source of every version number handed out, across all classes.
    version_counter: AtomicU64,
    invalidations: AtomicU64,
}

impl MetaRegistry {
    /// Create a registry over the given hierarchy and member cache.
    #[must_use]
    pub fn new(hierarchy: Arc<Hierarchy>, members: Arc<MemberCache>) -> Self {
        Self {
            hierarchy,
            members,
            classes: RwLock::new(FxHashMap::default()),
            version_counter: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Metadata for `class`, materializing it on first request.
    ///
    /// The table is built inside the map's write lock, so a mutation racing
    /// with first materialization either sees the cell (and rebuilds it) or
    /// is fully applied to the member cache before the build reads it.
    pub fn get_or_create(&self, class: ClassId) -> Arc<ClassMetadata> {
        if let Some(meta) = self.classes.read().get(&class) {
            return Arc::clone(meta);
        }
        let mut classes = self.classes.write();
        if let Some(meta) = classes.get(&class) {
            return Arc::clone(meta);
        }
        let table = MethodTable::build(class, &self.hierarchy, &self.members);
        let meta = Arc::new(ClassMetadata::new(class, table, self.next_version()));
        classes.insert(class, Arc::clone(&meta));
        meta
    }

    /// Metadata for `class` if already materialized.
    #[must_use]
    pub fn get(&self, class: ClassId) -> Option<Arc<ClassMetadata>> {
        self.classes.read().get(&class).map(Arc::clone)
    }

    /// Current version of a materialized class.
    ///
    /// This is the call-site guard check: one atomic load behind the map's
    /// read lock.
    #[must_use]
    pub fn version_of(&self, class: ClassId) -> Option<u64> {
        self.classes.read().get(&class).map(|m| m.version())
    }

    /// Apply a structural mutation to `class`.
    ///
    /// Materializes the class, applies the change to the member cache, then
    /// rebuilds and version-bumps the mutated class and every materialized
    /// subclass. Cached dispatch decisions against any affected class are
    /// invalid from the moment its version moves.
    pub fn mutate(&self, class: ClassId, mutation: Mutation) -> DispatchResult<()> {
        self.get_or_create(class);

        match mutation {
            Mutation::AddMethod(mut raw) => {
                raw.declaring = class;
                self.members.register(&self.hierarchy, raw)?;
            }
            Mutation::RemoveMethod(name) => {
                self.members.remove(class, &name);
            }
        }

        // Every materialized class that can see the mutated class's members.
        let affected: Vec<Arc<ClassMetadata>> = {
            let classes = self.classes.read();
            classes
                .values()
                .filter(|m| self.hierarchy.is_assignable(class, m.class()))
                .map(Arc::clone)
                .collect()
        };
        for meta in affected {
            let table = MethodTable::build(meta.class(), &self.hierarchy, &self.members);
            meta.install(table, self.next_version());
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Total table installs caused by mutations, across all classes.
    #[must_use]
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Drop the materialized metadata of `class`, if any.
    ///
    /// While evicted, [`MetaRegistry::version_of`] returns `None` and every
    /// outstanding guard fails. Re-materialization draws a fresh version
    /// from the registry-wide counter, so decisions cached before the
    /// eviction can never pass a guard again.
    pub fn evict(&self, class: ClassId) -> bool {
        self.classes.write().remove(&class).is_some()
    }

    /// The hierarchy this registry resolves against.
    #[must_use]
    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// The member cache backing table builds.
    #[must_use]
    pub fn members(&self) -> &Arc<MemberCache> {
        &self.members
    }

    /// Number of materialized classes.
    #[must_use]
    pub fn materialized(&self) -> usize {
        self.classes.read().len()
    }
}

impl std::fmt::Debug for MetaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaRegistry")
            .field("materialized", &self.materialized())
            .finish()
    }
}
