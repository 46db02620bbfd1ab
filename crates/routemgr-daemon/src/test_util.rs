//! Shared fixtures for the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use routemgr_core::SubscriptionMap;
use tokio::net::UnixStream;

use crate::adapter::Adapter;
use crate::config::DaemonConfig;
use crate::state::{DaemonState, SharedState};
use crate::txn::{TxnError, TxnNotifier};

/// Transaction-manager double: counts notifications, optionally holds the
/// config lock or fails connects.
#[derive(Default)]
pub(crate) struct RecordingTxn {
    in_progress: AtomicBool,
    fail_connects: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl RecordingTxn {
    pub(crate) fn set_in_progress(&self, value: bool) {
        self.in_progress.store(value, Ordering::SeqCst);
    }

    pub(crate) fn fail_connects(&self) {
        self.fail_connects.store(true, Ordering::SeqCst);
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl TxnNotifier for RecordingTxn {
    fn config_txn_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    fn notify_connect(&self, _adapter: &Arc<Adapter>) -> Result<(), TxnError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(TxnError::Rejected {
                reason: "test-induced failure".to_string(),
            });
        }
        Ok(())
    }

    fn notify_disconnect(&self, _adapter: &Arc<Adapter>) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn handle_txn_reply(&self, _: u64, _: bool, _: bool, _: &Arc<Adapter>) {}

    fn handle_cfg_data_reply(&self, _: u64, _: u64, _: bool, _: Option<&str>, _: &Arc<Adapter>) {}

    fn handle_cfg_apply_reply(&self, _: u64, _: bool, _: &[u64], _: Option<&str>, _: &Arc<Adapter>) {}
}

pub(crate) fn test_state() -> SharedState {
    test_state_with(DaemonConfig::default())
}

pub(crate) fn test_state_with(config: DaemonConfig) -> SharedState {
    DaemonState::new(
        config,
        Arc::new(SubscriptionMap::from_static_registry()),
        Arc::new(RecordingTxn::default()),
    )
}

pub(crate) fn recording_state() -> (SharedState, Arc<RecordingTxn>) {
    let txn = Arc::new(RecordingTxn::default());
    let state = DaemonState::new(
        DaemonConfig::default(),
        Arc::new(SubscriptionMap::from_static_registry()),
        Arc::clone(&txn) as Arc<dyn TxnNotifier>,
    );
    (state, txn)
}

/// Spawns an adapter over one side of a socketpair; the other side plays
/// the backend client.
pub(crate) async fn spawned_adapter(state: &SharedState) -> (Arc<Adapter>, UnixStream) {
    let (server_side, client_side) = UnixStream::pair().expect("socketpair");
    let adapter = Adapter::spawn(server_side, state);
    (adapter, client_side)
}
