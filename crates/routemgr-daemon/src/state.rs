//! Shared daemon state.
//!
//! One [`DaemonState`] exists per daemon instance. The subscription map is
//! immutable after construction; the adapter registry is the only mutable
//! piece and is guarded by a plain mutex (never held across an await).
//! The transaction manager is a collaborator reached through the
//! [`TxnNotifier`] trait object.

use std::sync::{Arc, Mutex};

use routemgr_core::SubscriptionMap;

use crate::config::DaemonConfig;
use crate::registry::AdapterRegistry;
use crate::txn::TxnNotifier;

/// Shared handle to the daemon state.
pub type SharedState = Arc<DaemonState>;

/// Process-wide state passed as explicit context to every handler.
pub struct DaemonState {
    /// Daemon tunables.
    pub config: DaemonConfig,
    /// The static pattern → subscriber registry.
    pub subscriptions: Arc<SubscriptionMap>,
    /// All live adapters.
    pub registry: Mutex<AdapterRegistry>,
    /// The transaction manager collaborator.
    pub txn: Arc<dyn TxnNotifier>,
}

impl DaemonState {
    /// Builds a shared state handle.
    #[must_use]
    pub fn new(
        config: DaemonConfig,
        subscriptions: Arc<SubscriptionMap>,
        txn: Arc<dyn TxnNotifier>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            subscriptions,
            registry: Mutex::new(AdapterRegistry::default()),
            txn,
        })
    }

    /// Locks the adapter registry.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned; registry consistency is an
    /// invariant, and a panicked holder means it can no longer be trusted.
    #[must_use]
    pub fn registry(&self) -> std::sync::MutexGuard<'_, AdapterRegistry> {
        self.registry.lock().expect("adapter registry lock poisoned")
    }
}
