use fieldlink_outcome::{FaultKind, FaultSource};

/// Why a submitted task produced no value.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task panicked; carries the panic message when it was a string.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// No thread could be spawned to run the task.
    #[error("failed to spawn task thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl FaultSource for TaskError {
    fn fault_kind(&self) -> FaultKind {
        FaultKind::Unknown
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
