//! Unix-socket server for backend client connections.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::adapter::Adapter;
use crate::state::SharedState;

/// Errors binding the backend socket.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The socket path could not be prepared or bound.
    #[error("failed to bind backend socket {path}: {source}")]
    Bind {
        /// Socket path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Accepts backend client connections and turns each into an adapter.
pub struct BackendServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl BackendServer {
    /// Binds the backend socket, removing any stale socket file first.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the directory cannot be created
    /// or the socket cannot be bound.
    pub fn bind(socket_path: &Path) -> Result<Self, ServerError> {
        let bind_err = |source| ServerError::Bind {
            path: socket_path.to_path_buf(),
            source,
        };

        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(bind_err)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(bind_err)?;
        }
        let listener = UnixListener::bind(socket_path).map_err(bind_err)?;
        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// The bound socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the accept loop until `shutdown` fires, then disconnects
    /// every adapter and removes the socket file.
    pub async fn run(self, state: SharedState, shutdown: CancellationToken) {
        info!("backend server listening on {:?}", self.socket_path);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        Adapter::spawn(stream, &state);
                    }
                    Err(err) => {
                        error!("failed to accept backend connection: {err}");
                    }
                },
            }
        }

        info!("backend server shutting down");
        let adapters = state.registry().all();
        for adapter in adapters {
            adapter.disconnect(&state);
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}
