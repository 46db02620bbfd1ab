//! Peer credentials extraction from Unix sockets via `SO_PEERCRED`.

use std::fmt;
use std::io;

use tokio::net::UnixStream;

/// Credentials of the process on the far end of a backend connection.
///
/// Recorded at accept time and reported in the operator status dump; the
/// daemon makes no authorization decisions from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// User ID of the peer process.
    pub uid: u32,
    /// Group ID of the peer process.
    pub gid: u32,
    /// Process ID of the peer, when the platform reports one.
    pub pid: Option<i32>,
}

impl PeerCredentials {
    /// Extracts credentials from a connected Unix stream.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if `SO_PEERCRED` fails.
    pub fn from_stream(stream: &UnixStream) -> io::Result<Self> {
        let creds = stream.peer_cred()?;
        Ok(Self {
            uid: creds.uid(),
            gid: creds.gid(),
            pid: creds.pid(),
        })
    }
}

impl fmt::Display for PeerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "uid={} gid={} pid={}", self.uid, self.gid, pid),
            None => write!(f, "uid={} gid={}", self.uid, self.gid),
        }
    }
}
