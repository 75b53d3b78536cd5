use std::fmt;
use std::io;

use fieldlink_codec::CodecError;
use fieldlink_outcome::{Fault, FaultKind, Outcome};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Exit code for a classified failure.
pub fn fault_code(kind: FaultKind) -> i32 {
    match kind {
        FaultKind::Connect
        | FaultKind::Bind
        | FaultKind::Accept
        | FaultKind::Send
        | FaultKind::Receive
        | FaultKind::PeerClosed
        | FaultKind::Shutdown => TRANSPORT_ERROR,
        FaultKind::Integrity
        | FaultKind::TruncatedBuffer
        | FaultKind::UnsupportedKind
        | FaultKind::InvalidValue => DATA_INVALID,
        FaultKind::UnsupportedMethod => INTERNAL,
        FaultKind::Unknown => FAILURE,
    }
}

pub fn fault_error(context: &str, fault: &Fault) -> CliError {
    CliError::new(fault_code(fault.kind()), format!("{context}: {}", fault.message()))
}

/// Unwrap a successful outcome or turn its fault into a `CliError`.
pub fn require<T>(context: &str, outcome: Outcome<T>) -> CliResult<T> {
    outcome.into_result().map_err(|fault| fault_error(context, &fault))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => USAGE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}
