//! The registry of live adapters.
//!
//! Holds every adapter from accept until disconnect, plus a dense by-id
//! table for the adapters that have identified themselves. Registry
//! membership is one strong reference; the adapter's I/O tasks hold the
//! others. Unlinking happens exactly once, on the disconnect path;
//! memory is reclaimed when the last `Arc` drops.
//!
//! Invariants kept at every public-method boundary:
//!
//! - at most one adapter carries a given (non-default) name;
//! - `by_id[id]` points at an adapter iff that adapter resolved to `id`,
//!   and never at one that was removed.

use std::sync::Arc;

use routemgr_core::ClientId;

use crate::adapter::Adapter;

/// All live adapters, in accept order, with the by-id index.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<Adapter>>,
    by_id: [Option<Arc<Adapter>>; ClientId::COUNT],
}

impl AdapterRegistry {
    /// Appends a newly accepted adapter.
    pub fn insert(&mut self, adapter: Arc<Adapter>) {
        self.adapters.push(adapter);
    }

    /// Unlinks an adapter from the list and, if it owns its slot, from
    /// the by-id table. Safe to call for an adapter already removed.
    pub fn remove(&mut self, adapter: &Adapter) {
        self.adapters.retain(|a| !std::ptr::eq(a.as_ref(), adapter));
        for slot in &mut self.by_id {
            if slot
                .as_ref()
                .is_some_and(|a| std::ptr::eq(a.as_ref(), adapter))
            {
                *slot = None;
            }
        }
    }

    /// Installs `adapter` as the owner of `id`, returning every adapter
    /// it displaces: a previous holder of the id, and any other adapter
    /// still carrying the same name (a half-closed predecessor whose EOF
    /// the daemon has not seen yet).
    ///
    /// The caller must disconnect the returned adapters after releasing
    /// the registry lock.
    #[must_use]
    pub fn install(&mut self, id: ClientId, adapter: &Arc<Adapter>) -> Vec<Arc<Adapter>> {
        let mut displaced: Vec<Arc<Adapter>> = Vec::new();
        let mut push_unique = |list: &mut Vec<Arc<Adapter>>, old: Arc<Adapter>| {
            if !std::ptr::eq(old.as_ref(), adapter.as_ref())
                && !list.iter().any(|a| Arc::ptr_eq(a, &old))
            {
                list.push(old);
            }
        };

        if let Some(prev) = self.by_id[id.index()].take() {
            push_unique(&mut displaced, prev);
        }
        self.by_id[id.index()] = Some(Arc::clone(adapter));

        let name = adapter.name();
        for other in &self.adapters {
            if other.name() == name {
                push_unique(&mut displaced, Arc::clone(other));
            }
        }
        displaced
    }

    /// Direct lookup by client id.
    #[must_use]
    pub fn get_by_id(&self, id: ClientId) -> Option<Arc<Adapter>> {
        self.by_id[id.index()].clone()
    }

    /// Linear lookup by connection fd.
    #[must_use]
    pub fn find_by_fd(&self, fd: i32) -> Option<Arc<Adapter>> {
        self.adapters.iter().find(|a| a.fd() == fd).cloned()
    }

    /// Linear lookup by adapter name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Adapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Iterates live adapters in accept order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Adapter>> {
        self.adapters.iter()
    }

    /// Snapshot of every live adapter (for shutdown sweeps).
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Adapter>> {
        self.adapters.clone()
    }

    /// Number of live adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// True when no adapters are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
