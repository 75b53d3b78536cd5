use fieldlink_outcome::{FaultKind, FaultSource};
use fieldlink_transport::TransportError;

/// Errors that can occur while reading or building framed messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The head failed the descriptor's protocol check.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// The head announces more content than the configured maximum.
    #[error("content too large ({size} bytes, max {max})")]
    ContentTooLarge { size: usize, max: usize },

    /// The underlying socket failed or the peer closed mid-frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FrameError {
    pub fn integrity(reason: impl Into<String>) -> Self {
        Self::Integrity(reason.into())
    }
}

impl FaultSource for FrameError {
    fn fault_kind(&self) -> FaultKind {
        match self {
            FrameError::Integrity(_) | FrameError::ContentTooLarge { .. } => FaultKind::Integrity,
            FrameError::Transport(e) => e.fault_kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
