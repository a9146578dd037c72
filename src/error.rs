use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Why [`ServerManager::start`](crate::ServerManager::start) refused to start. No resources are held
/// when any of these is returned.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("root directory {path} is not usable: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("failed to bind {addr}{}: {source}", port_conflict_hint(.source))]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to build the background runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl StartError {
    /// True when the bind failed because something else already listens on the port.
    pub fn is_port_conflict(&self) -> bool {
        matches!(self, StartError::BindFailed { source, .. } if source.kind() == io::ErrorKind::AddrInUse)
    }
}

fn port_conflict_hint(err: &io::Error) -> &'static str {
    if err.kind() == io::ErrorKind::AddrInUse {
        " (port is likely already in use by another server)"
    } else {
        ""
    }
}

#[derive(Debug, Error)]
pub enum StopError {
    #[error("a start or stop is already in progress")]
    TransitionInProgress,

    /// The server is stopped, but its background thread ended by panicking.
    #[error("background server thread panicked: {0}")]
    BackgroundPanicked(String),
}
