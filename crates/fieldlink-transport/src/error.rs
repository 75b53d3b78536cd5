/// Errors that can occur in socket transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host name did not resolve to any address.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to open a connection to the device.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to bind or listen on the requested address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    Send(std::io::Error),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    Receive(std::io::Error),

    /// The peer closed the stream before the full read completed.
    #[error("peer closed connection ({received} of {expected} bytes received)")]
    PeerClosed { expected: usize, received: usize },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl fieldlink_outcome::FaultSource for TransportError {
    fn fault_kind(&self) -> fieldlink_outcome::FaultKind {
        use fieldlink_outcome::FaultKind;

        match self {
            TransportError::Resolve { .. } | TransportError::Connect { .. } => FaultKind::Connect,
            TransportError::Bind { .. } => FaultKind::Bind,
            TransportError::Accept(_) => FaultKind::Accept,
            TransportError::Send(_) => FaultKind::Send,
            TransportError::Receive(_) | TransportError::Io(_) => FaultKind::Receive,
            TransportError::PeerClosed { .. } => FaultKind::PeerClosed,
            TransportError::Shutdown => FaultKind::Shutdown,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
