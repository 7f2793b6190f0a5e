//! The dispatch engine: the single facade compiled code talks to.
//!
//! Owns the hierarchy, the member cache, the versioned metadata registry and
//! the resolver, and wires them to the call-site layer. Also hosts the
//! missing-method hook, the one extension point consulted when resolution
//! fails with "no such method".

use std::sync::Arc;

use parking_lot::RwLock;
use sable_core::error::{DispatchError, DispatchResult};
use sable_core::intern::{intern, Symbol};
use sable_core::value::{ClassId, TypeKey, Value};
use sable_meta::hierarchy::Hierarchy;
use sable_meta::members::MemberCache;
use sable_meta::metadata::{MetaRegistry, Mutation};
use sable_meta::method::RawMethod;
use sable_meta::resolve::Resolver;
use smallvec::SmallVec;

use crate::invoke;
use crate::site::CachedTarget;
use crate::site_array::{CallSiteArray, SiteDescriptor};

/// Handler invoked when resolution finds no matching method.
///
/// Receives the receiver, the attempted name and the arguments; may produce
/// a value (recovering the call) or an error of its own. Hook results are
/// never cached at call sites.
pub type MissingMethodHook =
    Arc<dyn Fn(&Value, &Symbol, &[Value]) -> DispatchResult<Value> + Send + Sync>;

/// The runtime's dispatch facade.
pub struct DispatchEngine {
    hierarchy: Arc<Hierarchy>,
    registry: MetaRegistry,
    resolver: Resolver,
    hook: RwLock<Option<MissingMethodHook>>,
}

impl DispatchEngine {
    /// Create an engine with an empty user class space.
    #[must_use]
    pub fn new() -> Self {
        let hierarchy = Arc::new(Hierarchy::new());
        let members = Arc::new(MemberCache::new());
        Self {
            registry: MetaRegistry::new(Arc::clone(&hierarchy), members),
            resolver: Resolver::new(Arc::clone(&hierarchy)),
            hierarchy,
            hook: RwLock::new(None),
        }
    }

    /// The class hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// The metadata registry.
    #[must_use]
    pub fn registry(&self) -> &MetaRegistry {
        &self.registry
    }

    // ========================================================================
    // Class and method definition
    // ========================================================================

    /// Define a class extending `superclass` (or `Object`).
    pub fn define_class(&self, name: &str, superclass: Option<ClassId>) -> ClassId {
        self.hierarchy.register(name, superclass)
    }

    /// Define a class with explicit interfaces.
    pub fn define_class_with(
        &self,
        name: &str,
        superclass: Option<ClassId>,
        interfaces: &[ClassId],
    ) -> ClassId {
        self.hierarchy.register_with(name, superclass, interfaces)
    }

    /// Define a marker interface.
    pub fn define_interface(&self, name: &str, extends: &[ClassId]) -> ClassId {
        self.hierarchy.register_interface(name, extends)
    }

    /// Add a method to `class`, invalidating every cached decision that
    /// could see it.
    pub fn add_method(&self, class: ClassId, raw: RawMethod) -> DispatchResult<()> {
        self.registry.mutate(class, Mutation::AddMethod(raw))
    }

    /// Remove every method named `name` declared on `class`.
    pub fn remove_method(&self, class: ClassId, name: &str) -> DispatchResult<()> {
        self.registry.mutate(class, Mutation::RemoveMethod(intern(name)))
    }

    /// Install the missing-method hook, replacing any previous one.
    pub fn set_missing_method_hook(&self, hook: MissingMethodHook) {
        *self.hook.write() = Some(hook);
    }

    /// Remove the missing-method hook.
    pub fn clear_missing_method_hook(&self) {
        *self.hook.write() = None;
    }

    // ========================================================================
    // Compilation surface
    // ========================================================================

    /// Materialize the call-site cells for one compiled unit.
    pub fn compile_unit(self: &Arc<Self>, descriptors: Vec<SiteDescriptor>) -> CallSiteArray {
        CallSiteArray::new(Arc::clone(self), descriptors)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// One-shot dynamic dispatch with no call-site cell.
    ///
    /// The entry point for reflective calls (`invokeMethod`-style); compiled
    /// code goes through [`CallSiteArray`] instead.
    pub fn invoke_dynamic(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> DispatchResult<Value> {
        let name = intern(name);
        self.dispatch_uncached(receiver.runtime_class(), &name, false, receiver, args)
    }

    /// One-shot static dispatch on a class.
    pub fn invoke_static(&self, class: ClassId, name: &str, args: &[Value]) -> DispatchResult<Value> {
        let name = intern(name);
        self.dispatch_uncached(class, &name, true, &Value::Null, args)
    }

    /// Resolve a target against a consistent metadata snapshot, producing
    /// the immutable record a call site caches.
    pub(crate) fn resolve_target(
        &self,
        class: ClassId,
        name: &Symbol,
        is_static: bool,
        args: &[Value],
    ) -> DispatchResult<CachedTarget> {
        let arg_keys: SmallVec<[TypeKey; 6]> = args.iter().map(Value::type_key).collect();
        let (version, table) = self.registry.get_or_create(class).snapshot();
        let method = if is_static {
            self.resolver.resolve_static(&table, class, name, &arg_keys)?
        } else {
            self.resolver.resolve_instance(&table, class, name, &arg_keys)?
        };
        let needs_coercion = invoke::needs_coercion(&method, args);
        Ok(CachedTarget {
            method,
            class,
            version,
            arg_keys,
            needs_coercion,
        })
    }

    /// Resolve and invoke without touching any cache.
    ///
    /// Used for one-shot calls and by megamorphic sites.
    pub(crate) fn dispatch_uncached(
        &self,
        class: ClassId,
        name: &Symbol,
        is_static: bool,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        match self.resolve_target(class, name, is_static, args) {
            Ok(target) => {
                if target.needs_coercion {
                    invoke::invoke(&target.method, receiver, args)
                } else {
                    invoke::invoke_uncoerced(&target.method, receiver, args)
                }
            }
            Err(e) if e.is_resolution_miss() => self.missing_method(receiver, name, args, e),
            Err(e) => Err(e),
        }
    }

    /// Run the missing-method hook, or surface the original resolution error
    /// when none is installed.
    pub(crate) fn missing_method(
        &self,
        receiver: &Value,
        name: &Symbol,
        args: &[Value],
        original: DispatchError,
    ) -> DispatchResult<Value> {
        let hook = self.hook.read().as_ref().map(Arc::clone);
        match hook {
            Some(hook) => hook(receiver, name, args),
            None => Err(original),
        }
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
