//! Uniform result carrier for fieldlink.
//!
//! Every public operation in the workspace returns an [`Outcome`]: a success
//! flag, a numeric fault code, a human-readable message, and the returned
//! contents. Operations that hand back several values use a tuple as the
//! content type, so each call site declares exactly what it returns.
//!
//! Internally every layer works with `Result<T, LayerError>` and `?`; the
//! conversion into an [`Outcome`] happens at the public boundary through the
//! [`FaultSource`] trait.

pub mod fault;
pub mod outcome;

pub use fault::{Fault, FaultKind, FaultSource};
pub use outcome::{Outcome, SUCCESS_MESSAGE};
