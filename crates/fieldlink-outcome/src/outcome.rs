use serde::Serialize;

use crate::fault::{Fault, FaultKind, FaultSource};

/// Message carried by every successful outcome.
pub const SUCCESS_MESSAGE: &str = "Success";

/// Success/failure carrier returned by public fieldlink operations.
///
/// A failed outcome never exposes contents. A successful one carries the
/// value handed to [`Outcome::success`]; use a tuple for several values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    success: bool,
    code: u32,
    message: String,
    contents: Option<T>,
}

impl<T> Outcome<T> {
    pub fn success(contents: T) -> Self {
        Self {
            success: true,
            code: 0,
            message: SUCCESS_MESSAGE.to_string(),
            contents: Some(contents),
        }
    }

    pub fn failure(fault: Fault) -> Self {
        Self {
            success: false,
            code: fault.code(),
            message: fault.message().to_string(),
            contents: None,
        }
    }

    /// Failure that copies code and message from another outcome.
    ///
    /// Used to re-raise an inner failure with a different content type.
    pub fn failure_from<U>(other: &Outcome<U>) -> Self {
        let code = if other.success {
            FaultKind::Unknown.code()
        } else {
            other.code
        };
        Self {
            success: false,
            code,
            message: other.message.clone(),
            contents: None,
        }
    }

    /// Failure for a protocol hook that was never implemented.
    pub fn unsupported(method: &str) -> Self {
        Self::failure(Fault::unsupported(method))
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// `0` on success, otherwise the [`FaultKind`] code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Fault classification; `None` on success.
    pub fn kind(&self) -> Option<FaultKind> {
        if self.success {
            None
        } else {
            Some(FaultKind::from_code(self.code).unwrap_or(FaultKind::Unknown))
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn contents(&self) -> Option<&T> {
        self.contents.as_ref()
    }

    pub fn into_contents(self) -> Option<T> {
        self.contents
    }

    pub fn fault(&self) -> Option<Fault> {
        self.kind()
            .map(|kind| Fault::new(kind, self.message.clone()))
    }

    pub fn into_result(self) -> Result<T, Fault> {
        match (self.success, self.contents) {
            (true, Some(contents)) => Ok(contents),
            (_, _) => {
                let kind = FaultKind::from_code(self.code).unwrap_or(FaultKind::Unknown);
                Err(Fault::new(kind, self.message))
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            success: self.success,
            code: self.code,
            message: self.message,
            contents: self.contents.map(f),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self.contents {
            Some(contents) if self.success => f(contents),
            _ => Outcome {
                success: false,
                code: self.code,
                message: self.message,
                contents: None,
            },
        }
    }

    /// Prefix a failure message with call-site context. Successes pass through.
    pub fn context(mut self, context: &str) -> Self {
        if !self.success {
            self.message = format!("{context}: {}", self.message);
        }
        self
    }
}

impl Outcome<()> {
    /// Success without contents of interest.
    pub fn done() -> Self {
        Self::success(())
    }
}

impl<T> From<Fault> for Outcome<T> {
    fn from(fault: Fault) -> Self {
        Self::failure(fault)
    }
}

impl<T, E: FaultSource> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(contents) => Self::success(contents),
            Err(err) => Self::failure(Fault::from_source(&err)),
        }
    }
}
