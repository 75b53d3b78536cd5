use std::fmt;

use serde::Serialize;

/// Failure taxonomy shared by all layers.
///
/// The numeric codes are stable and are what [`crate::Outcome::code`]
/// reports for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Opening a client socket failed (resolve, refuse, timeout).
    Connect,
    /// Binding or listening on a server socket failed.
    Bind,
    /// Accepting an incoming connection failed.
    Accept,
    /// Writing to a socket failed.
    Send,
    /// Reading from a socket failed for a reason other than peer close.
    Receive,
    /// The remote end closed the stream before a full read completed.
    PeerClosed,
    /// A framed response failed its protocol check.
    Integrity,
    /// A buffer held fewer bytes than a decode asked for.
    TruncatedBuffer,
    /// A value kind has no meaning for the requested operation.
    UnsupportedKind,
    /// A protocol hook was invoked but never implemented.
    UnsupportedMethod,
    /// A value could not be represented in the requested kind.
    InvalidValue,
    /// The component was stopped or interrupted.
    Shutdown,
    /// Failure without a more specific classification.
    Unknown,
}

impl FaultKind {
    /// Stable numeric code.
    pub fn code(self) -> u32 {
        match self {
            FaultKind::Connect => 1001,
            FaultKind::Bind => 1002,
            FaultKind::Accept => 1003,
            FaultKind::Send => 1004,
            FaultKind::Receive => 1005,
            FaultKind::PeerClosed => 1006,
            FaultKind::Integrity => 1007,
            FaultKind::TruncatedBuffer => 2001,
            FaultKind::UnsupportedKind => 2002,
            FaultKind::InvalidValue => 2003,
            FaultKind::UnsupportedMethod => 3001,
            FaultKind::Shutdown => 4001,
            FaultKind::Unknown => 10000,
        }
    }

    /// Reverse lookup of [`FaultKind::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        const ALL: [FaultKind; 13] = [
            FaultKind::Connect,
            FaultKind::Bind,
            FaultKind::Accept,
            FaultKind::Send,
            FaultKind::Receive,
            FaultKind::PeerClosed,
            FaultKind::Integrity,
            FaultKind::TruncatedBuffer,
            FaultKind::UnsupportedKind,
            FaultKind::InvalidValue,
            FaultKind::UnsupportedMethod,
            FaultKind::Shutdown,
            FaultKind::Unknown,
        ];
        ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Short label used in messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Connect => "connect error",
            FaultKind::Bind => "bind error",
            FaultKind::Accept => "accept error",
            FaultKind::Send => "send error",
            FaultKind::Receive => "receive error",
            FaultKind::PeerClosed => "peer closed",
            FaultKind::Integrity => "integrity error",
            FaultKind::TruncatedBuffer => "truncated buffer",
            FaultKind::UnsupportedKind => "unsupported kind",
            FaultKind::UnsupportedMethod => "unsupported method",
            FaultKind::InvalidValue => "invalid value",
            FaultKind::Shutdown => "shut down",
            FaultKind::Unknown => "unknown",
        }
    }

    /// Transport faults leave the socket unusable; the next call reconnects.
    pub fn is_transport(self) -> bool {
        matches!(
            self,
            FaultKind::Connect
                | FaultKind::Send
                | FaultKind::Receive
                | FaultKind::PeerClosed
                | FaultKind::Shutdown
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure: the kind plus the rendered error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Fault {
    kind: FaultKind,
    message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify any layer error.
    pub fn from_source<E: FaultSource + ?Sized>(err: &E) -> Self {
        Self::new(err.fault_kind(), err.to_string())
    }

    /// A hook that a concrete protocol never implemented.
    pub fn unsupported(method: &str) -> Self {
        Self::new(
            FaultKind::UnsupportedMethod,
            format!("{method} is not implemented by this protocol"),
        )
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with call-site context.
    pub fn context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

impl FaultSource for Fault {
    fn fault_kind(&self) -> FaultKind {
        self.kind
    }
}

/// Implemented by every layer error so it can be folded into an `Outcome`.
pub trait FaultSource: std::error::Error {
    fn fault_kind(&self) -> FaultKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_and_reversible() {
        let kinds = [
            FaultKind::Connect,
            FaultKind::Bind,
            FaultKind::Accept,
            FaultKind::Send,
            FaultKind::Receive,
            FaultKind::PeerClosed,
            FaultKind::Integrity,
            FaultKind::TruncatedBuffer,
            FaultKind::UnsupportedKind,
            FaultKind::InvalidValue,
            FaultKind::UnsupportedMethod,
            FaultKind::Shutdown,
            FaultKind::Unknown,
        ];
        for kind in kinds {
            assert_eq!(FaultKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FaultKind::from_code(0), None);
    }

    #[test]
    fn context_prefixes_message() {
        let fault = Fault::new(FaultKind::Send, "broken pipe").context("exchange");
        assert_eq!(fault.message(), "exchange: broken pipe");
        assert_eq!(fault.to_string(), "exchange: broken pipe");
    }

    #[test]
    fn unsupported_names_the_hook() {
        let fault = Fault::unsupported("initialize_on_connect");
        assert_eq!(fault.kind(), FaultKind::UnsupportedMethod);
        assert!(fault.message().contains("initialize_on_connect"));
    }

    #[test]
    fn transport_classification() {
        assert!(FaultKind::PeerClosed.is_transport());
        assert!(FaultKind::Send.is_transport());
        assert!(!FaultKind::Integrity.is_transport());
        assert!(!FaultKind::TruncatedBuffer.is_transport());
    }

    #[test]
    fn serializes_kind_as_snake_case() {
        let fault = Fault::new(FaultKind::PeerClosed, "eof");
        let json = serde_json::to_value(&fault).unwrap();
        assert_eq!(json["kind"], "peer_closed");
        assert_eq!(json["message"], "eof");
    }
}
