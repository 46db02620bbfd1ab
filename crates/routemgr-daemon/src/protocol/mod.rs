//! Backend wire protocol: framing and typed messages.
//!
//! Each backend connection carries a sequence of length-prefixed frames,
//! each holding one encoded [`messages::BackendMessage`]:
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | Payload          |
//! +----------------------------+------------------+
//! ```
//!
//! The frame length is validated before any allocation, so a hostile or
//! confused client cannot make the daemon reserve an arbitrary buffer.

pub mod credentials;
pub mod framing;
pub mod messages;

pub use credentials::PeerCredentials;
pub use framing::FrameCodec;

use thiserror::Error;

/// Errors at the framing layer.
///
/// Protobuf decode failures are not represented here: an undecodable
/// payload inside a well-formed frame is dropped by the dispatcher, while
/// framing errors tear the connection down.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame exceeded the configured maximum size.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared or actual frame size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
