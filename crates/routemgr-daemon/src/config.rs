//! Daemon configuration.
//!
//! All tunables live in one [`DaemonConfig`] loaded from a TOML file; a
//! missing file means defaults. CLI flags may override individual fields
//! after loading (see `main.rs`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Daemon tunables.
///
/// Every field has a default mirroring the daemon's historical constants;
/// a config file only needs to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Unix socket the backend server listens on.
    pub socket_path: PathBuf,

    /// `SO_SNDBUF` applied to each accepted backend connection.
    pub send_buf_size: usize,

    /// `SO_RCVBUF` applied to each accepted backend connection.
    pub recv_buf_size: usize,

    /// Maximum encoded message length accepted or produced on the wire.
    pub max_frame_size: usize,

    /// Inbound frames handled per scheduling slot before yielding back to
    /// the runtime.
    pub proc_msg_batch: usize,

    /// Outbound queue depth, in bytes, above which writes pause.
    pub outbound_high_water: usize,

    /// Delay before (re)attempting connection init while a config
    /// transaction is in progress, in milliseconds.
    pub conn_init_delay_ms: u64,

    /// Pause applied once the outbound queue crosses the high-water mark,
    /// in milliseconds.
    pub writes_resume_delay_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/routemgr/backend.sock"),
            send_buf_size: 65535,
            recv_buf_size: 65535,
            max_frame_size: 64 * 1024,
            proc_msg_batch: 500,
            outbound_high_water: 1024 * 1024,
            conn_init_delay_ms: 50,
            writes_resume_delay_ms: 10,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Retry delay for connection init while the config lock is held.
    #[must_use]
    pub const fn conn_init_delay(&self) -> Duration {
        Duration::from_millis(self.conn_init_delay_ms)
    }

    /// Pause before resuming writes after hitting the high-water mark.
    #[must_use]
    pub const fn writes_resume_delay(&self) -> Duration {
        Duration::from_millis(self.writes_resume_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = DaemonConfig::default();
        assert!(cfg.max_frame_size > 0);
        assert!(cfg.proc_msg_batch > 0);
        assert!(cfg.outbound_high_water >= cfg.max_frame_size);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let cfg: DaemonConfig =
            toml::from_str("max_frame_size = 4096\nconn_init_delay_ms = 5\n").unwrap();
        assert_eq!(cfg.max_frame_size, 4096);
        assert_eq!(cfg.conn_init_delay(), Duration::from_millis(5));
        assert_eq!(cfg.send_buf_size, DaemonConfig::default().send_buf_size);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = toml::from_str::<DaemonConfig>("no_such_tunable = 1\n");
        assert!(err.is_err());
    }
}
