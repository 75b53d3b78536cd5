use std::net::SocketAddr;

use fieldlink_frame::FrameError;
use fieldlink_outcome::{Fault, FaultKind, FaultSource};
use fieldlink_transport::TransportError;

/// Errors that can occur in connection and listener operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A protocol hook reported failure.
    #[error("{0}")]
    Hook(Fault),

    /// No socket is held by the connection.
    #[error("not connected")]
    NotConnected,

    /// The listener is already accepting on this address.
    #[error("listener already started on {0}")]
    AlreadyStarted(SocketAddr),

    /// A worker thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl SessionError {
    /// Wrap a failed hook outcome, naming the hook.
    pub(crate) fn hook(fault: Fault, hook: &str) -> Self {
        Self::Hook(fault.context(hook))
    }
}

impl FaultSource for SessionError {
    fn fault_kind(&self) -> FaultKind {
        match self {
            SessionError::Transport(e) => e.fault_kind(),
            SessionError::Frame(e) => e.fault_kind(),
            SessionError::Hook(fault) => fault.kind(),
            SessionError::NotConnected => FaultKind::Connect,
            SessionError::AlreadyStarted(_) => FaultKind::Bind,
            SessionError::Spawn(_) => FaultKind::Unknown,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
