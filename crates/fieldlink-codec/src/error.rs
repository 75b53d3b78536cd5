use fieldlink_outcome::{FaultKind, FaultSource};

use crate::kind::ValueKind;

/// Errors raised while packing or unpacking values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The buffer ends before the requested element range.
    #[error("buffer too short: need {needed} bytes from offset {offset}, have {available}")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The kind has no fixed packing format, or the name/code is unknown.
    #[error("unsupported value kind: {0}")]
    UnsupportedKind(String),

    /// A value cannot be represented in the target kind.
    #[error("invalid value for {kind}: {reason}")]
    InvalidValue { kind: ValueKind, reason: String },

    /// Text could not be encoded or decoded with the requested encoding.
    #[error("text encoding error: {0}")]
    Encoding(String),
}

impl CodecError {
    pub(crate) fn invalid(kind: ValueKind, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            reason: reason.into(),
        }
    }
}

impl FaultSource for CodecError {
    fn fault_kind(&self) -> FaultKind {
        match self {
            CodecError::TruncatedBuffer { .. } => FaultKind::TruncatedBuffer,
            CodecError::UnsupportedKind(_) => FaultKind::UnsupportedKind,
            CodecError::InvalidValue { .. } | CodecError::Encoding(_) => FaultKind::InvalidValue,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
