//! Transaction manager seam and config-push fan-out.
//!
//! The daemon core does not correlate multi-client transactions; it only
//! notifies the transaction manager of adapter lifecycle events, forwards
//! replies, and offers the outbound surface the manager drives:
//! create/destroy a transaction on one client, push config-data batches,
//! and request the final apply.
//!
//! [`InitialSyncCoordinator`] is the in-crate manager implementation used
//! by the binary and the tests. It owns the exclusive config lock and, on
//! each new client, drives the full two-phase push of that client's slice
//! of the datastore. Cross-client correlation and rollback stay with the
//! real management plane.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use routemgr_core::SubscriptionMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapter::{Adapter, SendError};
use crate::datastore::Datastore;
use crate::protocol::messages::{BackendMessage, CfgAction, CfgDataItem};
use crate::sync::{self, CfgChangeAction, CfgChangeEntry};

/// Errors surfaced by a transaction manager on connect.
#[derive(Debug, Error)]
pub enum TxnError {
    /// Pushing to the client failed mid-setup.
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// The manager refused the connect for its own reasons.
    #[error("transaction manager rejected the connect: {reason}")]
    Rejected {
        /// Human-readable refusal.
        reason: String,
    },
}

/// The transaction manager collaborator.
///
/// Implementations must tolerate replies arriving in fd-readiness order
/// across adapters; correlation is by `txn_id`.
pub trait TxnNotifier: Send + Sync {
    /// True while any configuration transaction is in progress. New
    /// connections defer their initial sync until this clears.
    fn config_txn_in_progress(&self) -> bool;

    /// A new adapter finished conn-init and may be synced.
    ///
    /// # Errors
    ///
    /// An error makes the caller disconnect the adapter, forcing the
    /// client to reconnect and retry later.
    fn notify_connect(&self, adapter: &Arc<Adapter>) -> Result<(), TxnError>;

    /// An adapter disconnected; drop it from any in-flight transaction.
    fn notify_disconnect(&self, adapter: &Arc<Adapter>);

    /// A `TXN_REPLY` arrived.
    fn handle_txn_reply(&self, txn_id: u64, create: bool, success: bool, adapter: &Arc<Adapter>);

    /// A `CFG_DATA_REPLY` arrived.
    fn handle_cfg_data_reply(
        &self,
        txn_id: u64,
        batch_id: u64,
        success: bool,
        error: Option<&str>,
        adapter: &Arc<Adapter>,
    );

    /// A `CFG_APPLY_REPLY` arrived.
    fn handle_cfg_apply_reply(
        &self,
        txn_id: u64,
        success: bool,
        batch_ids: &[u64],
        error: Option<&str>,
        adapter: &Arc<Adapter>,
    );
}

/// Asks the client to create transaction `txn_id`.
///
/// # Errors
///
/// [`SendError::ConnectionClosed`] means the adapter should be dropped
/// from the transaction's participants.
pub fn create_txn(adapter: &Adapter, txn_id: u64) -> Result<(), SendError> {
    debug!(
        "sending create TXN_REQ to '{}' for txn-id {txn_id:#x}",
        adapter.name(),
    );
    adapter.send_msg(&BackendMessage::txn_req(txn_id, true)).map(|_| ())
}

/// Asks the client to destroy transaction `txn_id`.
///
/// # Errors
///
/// Same contract as [`create_txn`].
pub fn destroy_txn(adapter: &Adapter, txn_id: u64) -> Result<(), SendError> {
    debug!(
        "sending delete TXN_REQ to '{}' for txn-id {txn_id:#x}",
        adapter.name(),
    );
    adapter.send_msg(&BackendMessage::txn_req(txn_id, false)).map(|_| ())
}

/// Pushes one config-data batch for `txn_id`.
///
/// # Errors
///
/// Same contract as [`create_txn`].
pub fn send_cfg_data_create_req(
    adapter: &Adapter,
    txn_id: u64,
    batch_id: u64,
    data_req: Vec<CfgDataItem>,
    end_of_data: bool,
) -> Result<(), SendError> {
    debug!(
        "sending CFG_DATA_REQ to '{}' for txn-id {txn_id:#x} batch-id {batch_id:#x} ({} items{})",
        adapter.name(),
        data_req.len(),
        if end_of_data { ", end of data" } else { "" },
    );
    adapter
        .send_msg(&BackendMessage::cfg_data_req(txn_id, batch_id, data_req, end_of_data))
        .map(|_| ())
}

/// Asks the client to apply every staged batch of `txn_id`.
///
/// # Errors
///
/// Same contract as [`create_txn`].
pub fn send_cfg_apply_req(adapter: &Adapter, txn_id: u64) -> Result<(), SendError> {
    debug!(
        "sending CFG_APPLY_REQ to '{}' for txn-id {txn_id:#x}",
        adapter.name(),
    );
    adapter.send_msg(&BackendMessage::cfg_apply_req(txn_id)).map(|_| ())
}

struct ActiveSync {
    txn_id: u64,
    adapter: Weak<Adapter>,
}

/// Minimal transaction manager: one initial-sync transaction at a time.
pub struct InitialSyncCoordinator {
    datastore: Arc<dyn Datastore>,
    subscriptions: Arc<SubscriptionMap>,
    batch_size: usize,
    next_txn_id: AtomicU64,
    active: Mutex<Option<ActiveSync>>,
}

/// Config-data items per `CFG_DATA_REQ` batch.
const DEFAULT_BATCH_SIZE: usize = 64;

impl InitialSyncCoordinator {
    /// Builds a coordinator over the given datastore and subscriptions.
    #[must_use]
    pub fn new(datastore: Arc<dyn Datastore>, subscriptions: Arc<SubscriptionMap>) -> Self {
        Self {
            datastore,
            subscriptions,
            batch_size: DEFAULT_BATCH_SIZE,
            next_txn_id: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    /// Overrides the batch size (mostly for tests).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<ActiveSync>> {
        self.active.lock().expect("active sync lock poisoned")
    }

    fn clear_active(&self, txn_id: u64) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|a| a.txn_id == txn_id) {
            *active = None;
        }
    }

    #[allow(clippy::cast_possible_truncation)] // batch indexes stay tiny
    fn push_initial_config(
        &self,
        adapter: &Adapter,
        txn_id: u64,
        entries: &[CfgChangeEntry],
    ) -> Result<(), SendError> {
        create_txn(adapter, txn_id)?;
        let batches = entries.chunks(self.batch_size.max(1));
        let last = batches.len().saturating_sub(1);
        for (index, chunk) in batches.enumerate() {
            let items = chunk.iter().map(to_cfg_data_item).collect();
            let batch_id = index as u64 + 1;
            send_cfg_data_create_req(adapter, txn_id, batch_id, items, index == last)?;
        }
        send_cfg_apply_req(adapter, txn_id)
    }
}

fn to_cfg_data_item(entry: &CfgChangeEntry) -> CfgDataItem {
    let action = match entry.change.action {
        CfgChangeAction::Created | CfgChangeAction::Modified => CfgAction::Set,
        CfgChangeAction::Deleted => CfgAction::Delete,
    };
    CfgDataItem {
        action: action as i32,
        xpath: entry.xpath.clone(),
        value: entry.change.value.clone(),
    }
}

impl TxnNotifier for InitialSyncCoordinator {
    fn config_txn_in_progress(&self) -> bool {
        self.active().is_some()
    }

    fn notify_connect(&self, adapter: &Arc<Adapter>) -> Result<(), TxnError> {
        let entries = sync::get_adapter_config(adapter, &*self.datastore, &self.subscriptions);
        if entries.is_empty() {
            debug!("no subscribed configuration for '{}'", adapter.name());
            return Ok(());
        }

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut active = self.active();
            if active.is_some() {
                // conn-init gates on config_txn_in_progress, so landing
                // here means two conn-inits raced; the loser retries.
                return Err(TxnError::Rejected {
                    reason: "a config transaction is already in progress".to_string(),
                });
            }
            *active = Some(ActiveSync {
                txn_id,
                adapter: Arc::downgrade(adapter),
            });
        }

        debug!(
            "starting initial config sync for '{}' (txn-id {txn_id:#x}, {} changes)",
            adapter.name(),
            entries.len(),
        );
        if let Err(err) = self.push_initial_config(adapter, txn_id, &entries) {
            self.clear_active(txn_id);
            return Err(err.into());
        }
        Ok(())
    }

    fn notify_disconnect(&self, adapter: &Arc<Adapter>) {
        let mut active = self.active();
        let participant = active
            .as_ref()
            .and_then(|a| a.adapter.upgrade())
            .is_some_and(|a| Arc::ptr_eq(&a, adapter));
        if participant {
            debug!(
                "dropping '{}' from the in-progress sync transaction",
                adapter.name(),
            );
            *active = None;
        }
    }

    fn handle_txn_reply(&self, txn_id: u64, create: bool, success: bool, adapter: &Arc<Adapter>) {
        if !success {
            warn!(
                "'{}' failed to {} txn-id {txn_id:#x}",
                adapter.name(),
                if create { "create" } else { "delete" },
            );
            self.clear_active(txn_id);
        }
    }

    fn handle_cfg_data_reply(
        &self,
        txn_id: u64,
        batch_id: u64,
        success: bool,
        error: Option<&str>,
        adapter: &Arc<Adapter>,
    ) {
        if !success {
            // The client's verbatim error; retry is its operator's call.
            warn!(
                "'{}' rejected batch {batch_id:#x} of txn-id {txn_id:#x}: {}",
                adapter.name(),
                error.unwrap_or("no detail"),
            );
        }
    }

    fn handle_cfg_apply_reply(
        &self,
        txn_id: u64,
        success: bool,
        batch_ids: &[u64],
        error: Option<&str>,
        adapter: &Arc<Adapter>,
    ) {
        if success {
            debug!(
                "'{}' applied {} batches of txn-id {txn_id:#x}",
                adapter.name(),
                batch_ids.len(),
            );
        } else {
            warn!(
                "'{}' failed to apply txn-id {txn_id:#x}: {}",
                adapter.name(),
                error.unwrap_or("no detail"),
            );
        }
        let matches = self.active().as_ref().is_some_and(|a| a.txn_id == txn_id);
        if matches {
            if let Err(err) = destroy_txn(adapter, txn_id) {
                debug!("could not send delete TXN_REQ for txn-id {txn_id:#x}: {err}");
            }
            self.clear_active(txn_id);
        }
    }
}
