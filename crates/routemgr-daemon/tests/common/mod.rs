//! Shared fixtures for the integration tests: a scripted backend client
//! and a recording transaction manager, both talking to a real daemon
//! over a temp-dir Unix socket.
#![allow(dead_code)] // each test binary uses its own subset

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use routemgr_core::SubscriptionMap;
use routemgr_daemon::adapter::Adapter;
use routemgr_daemon::datastore::MemoryDatastore;
use routemgr_daemon::protocol::messages::{BackendMessage, Payload, SubscribeReq};
use routemgr_daemon::protocol::FrameCodec;
use routemgr_daemon::txn::{TxnError, TxnNotifier};
use routemgr_daemon::{BackendServer, DaemonConfig, DaemonState, SharedState};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Everything the transaction manager was told, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TxnEvent {
    Connect(String),
    Disconnect(String),
    TxnReply {
        txn_id: u64,
        create: bool,
        success: bool,
    },
    CfgDataReply {
        txn_id: u64,
        batch_id: u64,
        success: bool,
        error: Option<String>,
    },
    CfgApplyReply {
        txn_id: u64,
        success: bool,
        batch_ids: Vec<u64>,
        error: Option<String>,
    },
}

/// Transaction-manager double that records every notification.
#[derive(Default)]
pub struct RecordingTxn {
    in_progress: AtomicBool,
    events: Mutex<Vec<TxnEvent>>,
}

impl RecordingTxn {
    pub fn set_in_progress(&self, value: bool) {
        self.in_progress.store(value, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<TxnEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_connects(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TxnEvent::Connect(_)))
            .count()
    }

    fn record(&self, event: TxnEvent) {
        self.events.lock().unwrap().push(event);
    }

    /// Polls until `predicate` holds over the recorded events.
    pub async fn wait_until(&self, predicate: impl Fn(&[TxnEvent]) -> bool) {
        timeout(Duration::from_secs(5), async {
            loop {
                if predicate(&self.events()) {
                    return;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("recorded events never matched");
    }
}

impl TxnNotifier for RecordingTxn {
    fn config_txn_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    fn notify_connect(&self, adapter: &Arc<Adapter>) -> Result<(), TxnError> {
        self.record(TxnEvent::Connect(adapter.name()));
        Ok(())
    }

    fn notify_disconnect(&self, adapter: &Arc<Adapter>) {
        self.record(TxnEvent::Disconnect(adapter.name()));
    }

    fn handle_txn_reply(&self, txn_id: u64, create: bool, success: bool, _adapter: &Arc<Adapter>) {
        self.record(TxnEvent::TxnReply {
            txn_id,
            create,
            success,
        });
    }

    fn handle_cfg_data_reply(
        &self,
        txn_id: u64,
        batch_id: u64,
        success: bool,
        error: Option<&str>,
        _adapter: &Arc<Adapter>,
    ) {
        self.record(TxnEvent::CfgDataReply {
            txn_id,
            batch_id,
            success,
            error: error.map(str::to_string),
        });
    }

    fn handle_cfg_apply_reply(
        &self,
        txn_id: u64,
        success: bool,
        batch_ids: &[u64],
        error: Option<&str>,
        _adapter: &Arc<Adapter>,
    ) {
        self.record(TxnEvent::CfgApplyReply {
            txn_id,
            success,
            batch_ids: batch_ids.to_vec(),
            error: error.map(str::to_string),
        });
    }
}

/// A daemon instance bound to a socket in its own temp dir.
pub struct TestDaemon {
    pub state: SharedState,
    pub socket_path: PathBuf,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    _dir: TempDir,
}

impl TestDaemon {
    /// Starts a daemon with the given transaction manager and quick
    /// timers suitable for tests.
    pub async fn start(txn: Arc<dyn TxnNotifier>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_path = dir.path().join("backend.sock");

        let mut config = DaemonConfig::default();
        config.socket_path.clone_from(&socket_path);
        config.conn_init_delay_ms = 10;

        let state = DaemonState::new(
            config,
            Arc::new(SubscriptionMap::from_static_registry()),
            txn,
        );
        let server = BackendServer::bind(&socket_path).expect("bind backend socket");
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(server.run(Arc::clone(&state), shutdown.clone()));

        Self {
            state,
            socket_path,
            shutdown,
            server,
            _dir: dir,
        }
    }

    /// Polls the registry until `predicate` holds.
    pub async fn wait_for_registry(
        &self,
        predicate: impl Fn(&routemgr_daemon::AdapterRegistry) -> bool,
    ) {
        timeout(Duration::from_secs(5), async {
            loop {
                if predicate(&self.state.registry()) {
                    return;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry never reached the expected state");
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.server.await.expect("server task panicked");
    }
}

/// The far end of one backend connection, speaking real frames.
pub struct TestClient {
    framed: Framed<UnixStream, FrameCodec>,
}

impl TestClient {
    pub async fn connect(socket_path: &Path) -> Self {
        let stream = UnixStream::connect(socket_path)
            .await
            .expect("connect to backend socket");
        let codec = FrameCodec::new(DaemonConfig::default().max_frame_size);
        Self {
            framed: Framed::new(stream, codec),
        }
    }

    pub async fn send(&mut self, msg: &BackendMessage) {
        self.send_raw(&msg.to_bytes()).await;
    }

    /// Sends an arbitrary (well-framed) payload.
    pub async fn send_raw(&mut self, payload: &[u8]) {
        self.framed
            .send(bytes::Bytes::copy_from_slice(payload))
            .await
            .expect("send frame");
    }

    pub async fn subscribe(&mut self, client_name: &str) {
        self.send(&BackendMessage::new(Payload::SubscribeReq(SubscribeReq {
            client_name: client_name.to_string(),
            subscribe_xpaths: true,
            xpath_reg: Vec::new(),
        })))
        .await;
    }

    /// Receives the next message, or `None` on EOF.
    pub async fn recv(&mut self) -> Option<BackendMessage> {
        let frame = timeout(Duration::from_secs(5), self.framed.next())
            .await
            .expect("timed out waiting for a frame")?;
        let frame = frame.expect("frame error");
        Some(BackendMessage::from_bytes(&frame).expect("decode message"))
    }

    /// Receives the next payload, panicking on EOF.
    pub async fn recv_payload(&mut self) -> Payload {
        self.recv()
            .await
            .expect("connection closed")
            .payload
            .expect("empty payload")
    }

    /// True once the server has closed this connection.
    pub async fn closed(&mut self) -> bool {
        timeout(Duration::from_secs(5), self.framed.next())
            .await
            .expect("timed out waiting for EOF")
            .is_none()
    }

    /// Asserts that nothing arrives for the given window.
    pub async fn expect_silence(&mut self, window: Duration) {
        let outcome = timeout(window, self.framed.next()).await;
        assert!(outcome.is_err(), "unexpected frame during silence window");
    }
}

/// A datastore with three staticd-owned nodes and one that is not.
pub fn seeded_datastore() -> MemoryDatastore {
    let mut ds = MemoryDatastore::new();
    ds.set("/frr-interface:lib/interface[name='eth0']/name", "eth0");
    ds.set(
        "/frr-routing:routing/control-plane-protocols/\
         control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/\
         frr-staticd:staticd/route-list[prefix='10.0.0.0/24']",
        "10.0.0.1",
    );
    ds.set("/frr-vrf:lib/vrf[name='default']/name", "default");
    ds.set("/frr-bgp:bgp/router-id", "1.1.1.1");
    ds
}
