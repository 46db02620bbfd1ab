//! routemgr-core - Domain logic for the routemgr management daemon.
//!
//! The management daemon terminates connections from in-process feature
//! daemons ("backend clients") and routes configuration changes to the
//! subset of clients that own the affected parts of the configuration
//! tree. This crate holds the pure, I/O-free pieces of that machinery:
//!
//! - [`client`]: the closed set of known backend clients
//! - [`xpath`]: longest-match scoring of instance paths against
//!   path-shaped glob patterns
//! - [`subscription`]: the static pattern → subscriber registry and its
//!   resolution logic
//!
//! Everything here is deterministic and synchronous; the daemon crate
//! layers sockets, framing, and the adapter lifecycle on top.

pub mod client;
pub mod subscription;
pub mod xpath;

pub use client::ClientId;
pub use subscription::{CapabilityTriple, SubscriberInfo, SubscriptionMap, SubscriptionMapError};
