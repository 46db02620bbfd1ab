//! routemgr-daemon - Backend-adapter core of the routemgr management
//! daemon.
//!
//! The management daemon owns a single editable configuration datastore
//! and keeps a set of in-process feature daemons ("backend clients") in
//! sync with it. This crate is the server side of that relationship:
//!
//! - [`protocol`]: length-prefixed framing and the typed message set
//! - [`adapter`]: one state machine per connected client
//! - [`registry`]: all live adapters, indexed by client id
//! - [`sync`]: the initial config walk for a newly connected client
//! - [`txn`]: the transaction-manager seam and the config-push fan-out
//! - [`server`]: the Unix-socket accept loop
//! - [`show`]: operator status dumps
//! - [`datastore`]: the datastore collaborator seam
//!
//! The pure matching and subscription logic lives in `routemgr-core`.

pub mod adapter;
pub mod config;
pub mod datastore;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod show;
pub mod state;
pub mod sync;
pub mod txn;

#[cfg(test)]
pub(crate) mod test_util;

pub use adapter::Adapter;
pub use config::DaemonConfig;
pub use registry::AdapterRegistry;
pub use server::BackendServer;
pub use state::{DaemonState, SharedState};
