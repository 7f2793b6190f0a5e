//! Polymorphic inline call-site cache.
//!
//! One [`CallSite`] cell per call expression in a compiled unit. The cell
//! remembers the last successful dispatch decision together with the guard
//! under which it stays valid, and specializes itself in place:
//!
//! ```text
//! Uninitialized -> Monomorphic -> Revalidating -> Monomorphic
//!                                             \-> Megamorphic (terminal)
//! ```
//!
//! # Design
//!
//! The cached `(target, guard)` pair is one immutable [`CachedTarget`] behind
//! an atomically swapped `Arc`, so a reader can never observe a target paired
//! with another dispatch's guard. The fast path is a state load, an `Arc`
//! clone under a read lock, and the guard check; no resolver call and no
//! write lock. Misses re-resolve and overwrite the pair. Once the miss
//! counter passes [`MEGAMORPHIC_THRESHOLD`] the cell disables itself and
//! every later call goes straight to the resolver, which bounds worst-case
//! overhead at uncached dispatch.
//!
//! State transitions race benignly: a stale state read costs at most one
//! redundant re-resolution, never a wrong invocation, because correctness
//! rests on the guard check alone.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sable_core::error::DispatchResult;
use sable_core::intern::Symbol;
use sable_core::value::{ClassId, TypeKey, Value};
use sable_meta::method::ReflectedMethod;
use smallvec::SmallVec;

use crate::engine::DispatchEngine;
use crate::invoke;

/// Misses tolerated on the revalidation path before a site goes megamorphic.
pub const MEGAMORPHIC_THRESHOLD: u32 = 8;

// ============================================================================
// Site state
// ============================================================================

/// Specialization state of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SiteState {
    /// No dispatch has happened yet.
    Uninitialized = 0,
    /// One cached target; the fast path is live.
    Monomorphic = 1,
    /// The guard just failed; the next dispatch re-resolves.
    Revalidating = 2,
    /// Too many distinct receiver shapes; caching disabled for good.
    Megamorphic = 3,
}

impl SiteState {
    fn from_u8(raw: u8) -> SiteState {
        match raw {
            1 => SiteState::Monomorphic,
            2 => SiteState::Revalidating,
            3 => SiteState::Megamorphic,
            _ => SiteState::Uninitialized,
        }
    }
}

// ============================================================================
// Cached target
// ============================================================================

/// An immutable resolved-dispatch record: the target plus the guard it was
/// cached under. Swapped wholesale, never mutated.
#[derive(Debug)]
pub struct CachedTarget {
    /// The resolved method.
    pub method: ReflectedMethod,
    /// Receiver class the decision was made for.
    pub class: ClassId,
    /// Class metadata version at caching time.
    pub version: u64,
    /// Argument type keys of the call the decision was made for.
    pub arg_keys: SmallVec<[TypeKey; 6]>,
    /// Whether this call shape needs argument coercion.
    pub needs_coercion: bool,
}

impl CachedTarget {
    fn invoke(&self, receiver: &Value, args: &[Value]) -> DispatchResult<Value> {
        if self.needs_coercion {
            invoke::invoke(&self.method, receiver, args)
        } else {
            invoke::invoke_uncoerced(&self.method, receiver, args)
        }
    }
}

// ============================================================================
// Call site
// ============================================================================

/// Point-in-time counters for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteStats {
    /// Current specialization state.
    pub state: SiteState,
    /// Fast-path dispatches served from the cache.
    pub hits: u64,
    /// Dispatches that went through the resolver.
    pub misses: u64,
}

/// One self-specializing call-site cell.
pub struct CallSite {
    name: Symbol,
    argc: usize,
    is_static: bool,
    state: AtomicU8,
    target: RwLock<Option<Arc<CachedTarget>>>,
    miss_count: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CallSite {
    /// Create an uninitialized site for `name` with a fixed argument count.
    #[must_use]
    pub fn new(name: Symbol, argc: usize) -> Self {
        Self::with_kind(name, argc, false)
    }

    /// Create an uninitialized static-call site.
    #[must_use]
    pub fn new_static(name: Symbol, argc: usize) -> Self {
        Self::with_kind(name, argc, true)
    }

    fn with_kind(name: Symbol, argc: usize, is_static: bool) -> Self {
        Self {
            name,
            argc,
            is_static,
            state: AtomicU8::new(SiteState::Uninitialized as u8),
            target: RwLock::new(None),
            miss_count: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Method name dispatched at this site.
    #[must_use]
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Argument count of the compiled call shape.
    #[must_use]
    pub fn argc(&self) -> usize {
        self.argc
    }

    /// Current specialization state.
    #[must_use]
    pub fn state(&self) -> SiteState {
        SiteState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> SiteStats {
        SiteStats {
            state: self.state(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Dispatch an instance call through this site.
    pub fn dispatch(
        &self,
        engine: &DispatchEngine,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        self.dispatch_on(engine, receiver.runtime_class(), receiver, args)
    }

    /// Dispatch a static call through this site.
    pub fn dispatch_static(
        &self,
        engine: &DispatchEngine,
        class: ClassId,
        args: &[Value],
    ) -> DispatchResult<Value> {
        self.dispatch_on(engine, class, &Value::Null, args)
    }

    fn dispatch_on(
        &self,
        engine: &DispatchEngine,
        class: ClassId,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        if self.state() == SiteState::Megamorphic {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return engine.dispatch_uncached(class, &self.name, self.is_static, receiver, args);
        }

        if let Some(target) = self.load_target() {
            if self.guard_holds(engine, &target, class, args) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return target.invoke(receiver, args);
            }
        }
        self.miss(engine, class, receiver, args)
    }

    /// Guard check: receiver class identity, live metadata version and the
    /// call's argument type keys must all match the cached decision.
    fn guard_holds(
        &self,
        engine: &DispatchEngine,
        target: &CachedTarget,
        class: ClassId,
        args: &[Value],
    ) -> bool {
        target.class == class
            && engine.registry().version_of(class) == Some(target.version)
            && target.arg_keys.len() == args.len()
            && target
                .arg_keys
                .iter()
                .zip(args)
                .all(|(key, arg)| *key == arg.type_key())
    }

    fn load_target(&self) -> Option<Arc<CachedTarget>> {
        self.target.read().as_ref().map(Arc::clone)
    }

    fn miss(
        &self,
        engine: &DispatchEngine,
        class: ClassId,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Cold sites go straight to resolution; only guard failures count
        // toward the megamorphic threshold.
        let state = self.state();
        if state != SiteState::Uninitialized {
            self.transition(SiteState::Monomorphic, SiteState::Revalidating);
            let misses = self.miss_count.fetch_add(1, Ordering::Relaxed) + 1;
            if misses > u64::from(MEGAMORPHIC_THRESHOLD) {
                self.go_megamorphic();
                return engine.dispatch_uncached(
                    class,
                    &self.name,
                    self.is_static,
                    receiver,
                    args,
                );
            }
        }

        match engine.resolve_target(class, &self.name, self.is_static, args) {
            Ok(target) => {
                let target = Arc::new(target);
                self.store(Arc::clone(&target));
                target.invoke(receiver, args)
            }
            Err(e) if e.is_resolution_miss() => {
                engine.missing_method(receiver, &self.name, args, e)
            }
            Err(e) => Err(e),
        }
    }

    /// Publish a new `(target, guard)` pair and return to monomorphic.
    fn store(&self, target: Arc<CachedTarget>) {
        {
            let mut slot = self.target.write();
            *slot = Some(target);
        }
        // A racing go_megamorphic wins: megamorphic is terminal.
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (SiteState::from_u8(raw) != SiteState::Megamorphic)
                    .then_some(SiteState::Monomorphic as u8)
            });
    }

    fn transition(&self, from: SiteState, to: SiteState) {
        let _ = self.state.compare_exchange(
            from as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn go_megamorphic(&self) {
        self.state
            .store(SiteState::Megamorphic as u8, Ordering::Release);
        let mut slot = self.target.write();
        *slot = None;
    }
}

impl std::fmt::Debug for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSite")
            .field("name", &self.name)
            .field("argc", &self.argc)
            .field("state", &self.state())
            .finish()
    }
}
