//! Per-compiled-unit call-site arrays.
//!
//! A compiled unit carries one [`CallSiteArray`]: the cells for every call
//! expression it contains, addressed positionally by the index baked into
//! the compiled code. Cells live exactly as long as the array.

use std::sync::Arc;

use sable_core::error::{DispatchError, DispatchResult};
use sable_core::intern::Symbol;
use sable_core::value::{ClassId, Value};

use crate::engine::DispatchEngine;
use crate::site::{CallSite, SiteStats};

/// Compile-time description of one call expression.
#[derive(Debug, Clone)]
pub struct SiteDescriptor {
    /// Method name at the site.
    pub name: Symbol,
    /// Argument count of the compiled call shape.
    pub argc: usize,
    /// Whether the site dispatches statically on a class.
    pub is_static: bool,
}

impl SiteDescriptor {
    /// Descriptor for an instance call.
    #[must_use]
    pub fn instance(name: Symbol, argc: usize) -> Self {
        Self {
            name,
            argc,
            is_static: false,
        }
    }

    /// Descriptor for a static call.
    #[must_use]
    pub fn static_call(name: Symbol, argc: usize) -> Self {
        Self {
            name,
            argc,
            is_static: true,
        }
    }
}

/// The call-site cells of one compiled unit.
pub struct CallSiteArray {
    engine: Arc<DispatchEngine>,
    sites: Vec<CallSite>,
}

impl CallSiteArray {
    /// Build the cells for a unit's call expressions.
    #[must_use]
    pub fn new(engine: Arc<DispatchEngine>, descriptors: Vec<SiteDescriptor>) -> Self {
        let sites = descriptors
            .into_iter()
            .map(|d| {
                if d.is_static {
                    CallSite::new_static(d.name, d.argc)
                } else {
                    CallSite::new(d.name, d.argc)
                }
            })
            .collect();
        Self { engine, sites }
    }

    /// Dispatch an instance call through the cell at `index`.
    pub fn call(&self, index: usize, receiver: &Value, args: &[Value]) -> DispatchResult<Value> {
        self.site(index)?.dispatch(&self.engine, receiver, args)
    }

    /// Dispatch a static call through the cell at `index`.
    pub fn call_static(
        &self,
        index: usize,
        class: ClassId,
        args: &[Value],
    ) -> DispatchResult<Value> {
        self.site(index)?.dispatch_static(&self.engine, class, args)
    }

    /// Counters for the cell at `index`.
    pub fn stats(&self, index: usize) -> DispatchResult<SiteStats> {
        Ok(self.site(index)?.stats())
    }

    fn site(&self, index: usize) -> DispatchResult<&CallSite> {
        self.sites.get(index).ok_or_else(|| {
            DispatchError::internal(format!(
                "call site index {index} out of range ({} sites)",
                self.sites.len()
            ))
        })
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the unit has no call expressions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// The engine the cells dispatch through.
    #[must_use]
    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }
}

impl std::fmt::Debug for CallSiteArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSiteArray")
            .field("sites", &self.sites.len())
            .finish()
    }
}
