//! Per-connection backend client adapter.
//!
//! One [`Adapter`] exists per accepted backend connection. It owns the
//! connection's identity and counters and runs three cooperating tasks:
//!
//! - **reader**: framed reads, protobuf decode, inbound dispatch. At most
//!   a configured batch of frames is handled before yielding back to the
//!   runtime so one chatty client cannot starve the rest.
//! - **writer**: drains the outbound queue into the socket. When the
//!   queue depth crosses the high-water mark the adapter pauses draining
//!   for a fixed delay; producers keep enqueuing and never block.
//! - **conn-init**: waits until the client has identified itself and no
//!   config transaction is in progress, then hands the adapter to the
//!   transaction manager for the initial config push. Failure to set
//!   that up disconnects the client so it can retry.
//!
//! The adapter is shared as an `Arc`; the registry and each running task
//! hold one strong reference, and the allocation is reclaimed when the
//! last drops. Disconnect is idempotent: the first call closes I/O
//! (through the cancellation token), notifies the transaction manager,
//! and unlinks from the registry; later calls are no-ops.

use std::collections::BTreeMap;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use routemgr_core::ClientId;
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::protocol::messages::{BackendMessage, Payload, SubscribeReq};
use crate::protocol::{FrameCodec, PeerCredentials};
use crate::state::SharedState;
use crate::sync::CfgChange;

/// Errors producing an outbound message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is closed; the caller should drop this adapter
    /// from any transaction it participates in.
    #[error("connection closed")]
    ConnectionClosed,

    /// The encoded message does not fit in one frame.
    #[error("encoded message of {size} bytes exceeds the {max} byte frame limit")]
    FrameTooLarge {
        /// Encoded size.
        size: usize,
        /// Frame limit.
        max: usize,
    },
}

/// Inbound/outbound traffic counters, readable from the status dump.
#[derive(Debug, Default)]
pub struct IoCounters {
    rx_msgs: AtomicU64,
    rx_bytes: AtomicU64,
    tx_msgs: AtomicU64,
    tx_bytes: AtomicU64,
}

/// Point-in-time copy of [`IoCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoCounterSnapshot {
    /// Messages received.
    pub rx_msgs: u64,
    /// Bytes received (payload only).
    pub rx_bytes: u64,
    /// Messages sent.
    pub tx_msgs: u64,
    /// Bytes sent (payload only).
    pub tx_bytes: u64,
}

#[allow(clippy::cast_possible_truncation)] // usize fits the u64 counters
impl IoCounters {
    fn note_rx(&self, bytes: usize) {
        self.rx_msgs.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn note_tx(&self, bytes: usize) {
        self.tx_msgs.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Reads all four counters.
    #[must_use]
    pub fn snapshot(&self) -> IoCounterSnapshot {
        IoCounterSnapshot {
            rx_msgs: self.rx_msgs.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_msgs: self.tx_msgs.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct Identity {
    name: String,
    id: Option<ClientId>,
}

/// Server-side representation of one connected backend client.
pub struct Adapter {
    fd: i32,
    peer: Option<PeerCredentials>,
    ident: Mutex<Identity>,
    writes_off: AtomicBool,
    disconnected: AtomicBool,
    counters: IoCounters,
    outbound_tx: mpsc::UnboundedSender<Bytes>,
    queued_bytes: AtomicUsize,
    max_frame_size: usize,
    pub(crate) cfg_changes: Mutex<BTreeMap<String, CfgChange>>,
    cancel: CancellationToken,
}

impl Adapter {
    /// Accepts a connection: builds the adapter, registers it, and spawns
    /// its reader, writer, and conn-init tasks.
    pub fn spawn(stream: UnixStream, state: &SharedState) -> Arc<Self> {
        let fd = stream.as_raw_fd();
        apply_socket_buffers(&stream, state);
        let peer = PeerCredentials::from_stream(&stream).ok();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let adapter = Arc::new(Self {
            fd,
            peer,
            ident: Mutex::new(Identity {
                name: format!("Unknown-FD-{fd}"),
                id: None,
            }),
            writes_off: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            counters: IoCounters::default(),
            outbound_tx,
            queued_bytes: AtomicUsize::new(0),
            max_frame_size: state.config.max_frame_size,
            cfg_changes: Mutex::new(BTreeMap::new()),
            cancel: CancellationToken::new(),
        });

        state.registry().insert(Arc::clone(&adapter));

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(read_loop(Arc::clone(&adapter), Arc::clone(state), read_half));
        tokio::spawn(write_loop(
            Arc::clone(&adapter),
            Arc::clone(state),
            write_half,
            outbound_rx,
        ));
        tokio::spawn(conn_init_loop(Arc::clone(&adapter), Arc::clone(state)));

        debug!("added new backend adapter '{}'", adapter.name());
        adapter
    }

    /// The adapter's current name: the client name once identified,
    /// `Unknown-FD-<fd>` before that.
    #[must_use]
    pub fn name(&self) -> String {
        self.ident().name.clone()
    }

    /// The resolved client id, once a subscribe request supplied one.
    #[must_use]
    pub fn id(&self) -> Option<ClientId> {
        self.ident().id
    }

    /// The connection fd, or -1 once disconnected.
    #[must_use]
    pub fn fd(&self) -> i32 {
        if self.is_disconnected() {
            -1
        } else {
            self.fd
        }
    }

    /// Credentials of the peer process, when available.
    #[must_use]
    pub const fn peer(&self) -> Option<PeerCredentials> {
        self.peer
    }

    /// Traffic counters.
    #[must_use]
    pub const fn counters(&self) -> &IoCounters {
        &self.counters
    }

    /// True while outbound draining is paused by backpressure.
    #[must_use]
    pub fn writes_off(&self) -> bool {
        self.writes_off.load(Ordering::Acquire)
    }

    /// Bytes currently queued for the writer.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes.load(Ordering::Relaxed)
    }

    /// True once [`disconnect`](Self::disconnect) ran.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Serializes and enqueues a message for the writer task.
    ///
    /// Never blocks: backpressure pauses the drain, not the producers.
    ///
    /// # Errors
    ///
    /// [`SendError::ConnectionClosed`] once disconnected;
    /// [`SendError::FrameTooLarge`] if the encoded message cannot fit in
    /// one frame.
    pub fn send_msg(&self, msg: &BackendMessage) -> Result<usize, SendError> {
        if self.is_disconnected() {
            debug!("cannot send message on closed connection to '{}'", self.name());
            return Err(SendError::ConnectionClosed);
        }
        let bytes = Bytes::from(msg.to_bytes());
        let len = bytes.len();
        if len > self.max_frame_size {
            return Err(SendError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        self.queued_bytes.fetch_add(len, Ordering::Relaxed);
        if self.outbound_tx.send(bytes).is_err() {
            self.queued_bytes.fetch_sub(len, Ordering::Relaxed);
            return Err(SendError::ConnectionClosed);
        }
        Ok(len)
    }

    /// Tears the connection down. Idempotent.
    ///
    /// Closes I/O (the tasks stop and drop the stream halves), notifies
    /// the transaction manager so an in-flight transaction can drop this
    /// participant, and unlinks from the registry and by-id table. The
    /// allocation itself lives until the last `Arc` drops.
    pub fn disconnect(self: &Arc<Self>, state: &SharedState) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("disconnecting backend adapter '{}' (fd {})", self.name(), self.fd);
        self.cancel.cancel();
        state.txn.notify_disconnect(self);
        state.registry().remove(self);
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.ident().name = name.to_string();
    }

    pub(crate) fn set_id(&self, id: ClientId) {
        self.ident().id = Some(id);
    }

    pub(crate) fn cfg_changes(&self) -> MutexGuard<'_, BTreeMap<String, CfgChange>> {
        self.cfg_changes
            .lock()
            .expect("pending config changes lock poisoned")
    }

    fn ident(&self) -> MutexGuard<'_, Identity> {
        self.ident.lock().expect("adapter identity lock poisoned")
    }

    /// Routes one decoded inbound message.
    fn dispatch_message(self: &Arc<Self>, state: &SharedState, msg: BackendMessage) {
        let Some(payload) = msg.payload else {
            debug!("dropping message with no payload from '{}'", self.name());
            return;
        };
        match payload {
            Payload::SubscribeReq(req) => self.handle_subscribe(state, &req),
            Payload::TxnReply(reply) => {
                debug!(
                    "got {} TXN_REPLY for txn-id {:#x} from '{}' with {}",
                    if reply.create { "create" } else { "delete" },
                    reply.txn_id,
                    self.name(),
                    if reply.success { "success" } else { "failure" },
                );
                state
                    .txn
                    .handle_txn_reply(reply.txn_id, reply.create, reply.success, self);
            }
            Payload::CfgDataReply(reply) => {
                debug!(
                    "got CFG_DATA_REPLY from '{}' for txn-id {:#x} batch-id {:#x} err: {}",
                    self.name(),
                    reply.txn_id,
                    reply.batch_id,
                    reply.error_if_any.as_deref().unwrap_or("none"),
                );
                state.txn.handle_cfg_data_reply(
                    reply.txn_id,
                    reply.batch_id,
                    reply.success,
                    reply.error_if_any.as_deref(),
                    self,
                );
            }
            Payload::CfgApplyReply(reply) => {
                debug!(
                    "got {} CFG_APPLY_REPLY from '{}' for txn-id {:#x} covering {} batches",
                    if reply.success { "successful" } else { "failed" },
                    self.name(),
                    reply.txn_id,
                    reply.batch_ids.len(),
                );
                state.txn.handle_cfg_apply_reply(
                    reply.txn_id,
                    reply.success,
                    &reply.batch_ids,
                    reply.error_if_any.as_deref(),
                    self,
                );
            }
            p @ (Payload::GetReply(_)
            | Payload::CfgCmdReply(_)
            | Payload::ShowCmdReply(_)
            | Payload::NotifyData(_)) => {
                // Reserved kinds: acknowledged, handling comes later.
                debug!("dropping unhandled {} from '{}'", p.kind(), self.name());
            }
            p @ (Payload::SubscribeReply(_)
            | Payload::TxnReq(_)
            | Payload::CfgDataReq(_)
            | Payload::CfgApplyReq(_)
            | Payload::GetReq(_)
            | Payload::CfgCmdReq(_)
            | Payload::ShowCmdReq(_)) => {
                // These only ever travel server → client.
                trace!("ignoring server-bound {} from '{}'", p.kind(), self.name());
            }
        }
    }

    fn handle_subscribe(self: &Arc<Self>, state: &SharedState, req: &SubscribeReq) {
        debug!(
            "got subscribe request from '{}' to {}register {} xpaths",
            req.client_name,
            if req.subscribe_xpaths || req.xpath_reg.is_empty() { "" } else { "de" },
            req.xpath_reg.len(),
        );
        if req.client_name.is_empty() {
            return;
        }
        self.set_name(&req.client_name);
        let Some(id) = ClientId::from_name(&req.client_name) else {
            error!(
                "unable to resolve client '{}' to a known id; disconnecting",
                req.client_name,
            );
            self.disconnect(state);
            return;
        };
        self.set_id(id);

        let displaced = state.registry().install(id, self);
        for old in displaced {
            debug!(
                "client '{}' (fd {}) seems to have reconnected; removing old connection (fd {})",
                self.name(),
                self.fd,
                old.fd(),
            );
            old.disconnect(state);
        }
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name())
            .field("fd", &self.fd)
            .field("id", &self.id())
            .field("disconnected", &self.is_disconnected())
            .finish_non_exhaustive()
    }
}

/// Applies the configured send/receive socket buffer sizes.
///
/// Failure is logged and tolerated: the connection still works with the
/// kernel defaults.
fn apply_socket_buffers(stream: &UnixStream, state: &SharedState) {
    use nix::sys::socket::{setsockopt, sockopt};

    if let Err(err) = setsockopt(stream, sockopt::SndBuf, &state.config.send_buf_size) {
        warn!("failed to set send buffer on fd {}: {err}", stream.as_raw_fd());
    }
    if let Err(err) = setsockopt(stream, sockopt::RcvBuf, &state.config.recv_buf_size) {
        warn!("failed to set recv buffer on fd {}: {err}", stream.as_raw_fd());
    }
}

/// Reader task: framed reads and inbound dispatch.
async fn read_loop(adapter: Arc<Adapter>, state: SharedState, read_half: OwnedReadHalf) {
    let codec = FrameCodec::new(state.config.max_frame_size);
    let mut frames = FramedRead::new(read_half, codec);
    let mut batched = 0usize;

    loop {
        let item = tokio::select! {
            () = adapter.cancel.cancelled() => break,
            item = frames.next() => item,
        };
        match item {
            None => {
                debug!("connection from '{}' closed by peer", adapter.name());
                adapter.disconnect(&state);
                break;
            }
            Some(Err(err)) => {
                warn!("read error on '{}': {err}", adapter.name());
                adapter.disconnect(&state);
                break;
            }
            Some(Ok(frame)) => {
                adapter.counters.note_rx(frame.len());
                match BackendMessage::from_bytes(&frame) {
                    Ok(msg) => adapter.dispatch_message(&state, msg),
                    Err(err) => {
                        // A bad payload inside a good frame is dropped;
                        // the stream itself is still framed correctly.
                        debug!(
                            "failed to decode {} bytes from '{}': {err}",
                            frame.len(),
                            adapter.name(),
                        );
                    }
                }
                if adapter.is_disconnected() {
                    break;
                }
                batched += 1;
                if batched >= state.config.proc_msg_batch {
                    batched = 0;
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}

/// Writer task: drains the outbound queue with high-water backpressure.
async fn write_loop(
    adapter: Arc<Adapter>,
    state: SharedState,
    write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
) {
    let codec = FrameCodec::new(state.config.max_frame_size);
    let mut sink = FramedWrite::new(write_half, codec);
    let mut burst = 0usize;

    loop {
        let item = tokio::select! {
            () = adapter.cancel.cancelled() => break,
            item = outbound.recv() => item,
        };
        let Some(frame) = item else { break };
        let len = frame.len();

        if let Err(err) = sink.send(frame).await {
            debug!("write error on '{}': {err}", adapter.name());
            adapter.disconnect(&state);
            break;
        }
        adapter.queued_bytes.fetch_sub(len, Ordering::Relaxed);
        adapter.counters.note_tx(len);
        burst += len;

        // Pause when the queue runs past the high-water mark, or after
        // draining that much in one burst; either way the producers keep
        // enqueuing and the drain resumes after the delay.
        if burst > state.config.outbound_high_water
            || adapter.queued_bytes.load(Ordering::Relaxed) > state.config.outbound_high_water
        {
            burst = 0;
            adapter.writes_off.store(true, Ordering::Release);
            debug!("pausing writes for '{}'", adapter.name());
            let cancelled = tokio::select! {
                () = adapter.cancel.cancelled() => true,
                () = tokio::time::sleep(state.config.writes_resume_delay()) => false,
            };
            adapter.writes_off.store(false, Ordering::Release);
            if cancelled {
                break;
            }
            debug!("resuming writes for '{}'", adapter.name());
        }
    }
}

/// Conn-init task: waits for the config lock, then hands the adapter to
/// the transaction manager for the initial config push.
async fn conn_init_loop(adapter: Arc<Adapter>, state: SharedState) {
    loop {
        let () = tokio::select! {
            () = adapter.cancel.cancelled() => return,
            () = tokio::time::sleep(state.config.conn_init_delay()) => (),
        };
        // A config transaction elsewhere owns the datastore; not an
        // error, just try again after the delay.
        if state.txn.config_txn_in_progress() {
            continue;
        }
        // Identity arrives with the subscribe request; there is nothing
        // to sync for a client that has not named itself yet.
        if adapter.id().is_none() {
            continue;
        }
        if let Err(err) = state.txn.notify_connect(&adapter) {
            warn!(
                "config sync setup failed for '{}': {err}; disconnecting",
                adapter.name(),
            );
            adapter.disconnect(&state);
        }
        return;
    }
}
