//! Field-device communication toolkit.
//!
//! fieldlink talks to PLCs and other field devices over plain TCP/UDP
//! sockets: it frames request/response exchanges, keeps device connections
//! alive across failures, and converts raw register buffers to typed values.
//!
//! # Crate Structure
//!
//! - [`outcome`]: the success/failure carrier returned at public boundaries
//! - [`codec`]: typed values to and from device buffers, word order handling
//! - [`transport`]: blocking socket primitives (connect, listen, exact reads)
//! - [`frame`]: descriptor-driven framing of device responses
//! - [`session`]: device connections and framed listeners (behind `session`)
//! - [`pool`]: bounded task pool for polling many devices (behind `pool`)

/// Re-export outcome types.
pub mod outcome {
    pub use fieldlink_outcome::*;
}

/// Re-export codec types.
pub mod codec {
    pub use fieldlink_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use fieldlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fieldlink_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use fieldlink_session::*;
}

/// Re-export pool types (requires `pool` feature).
#[cfg(feature = "pool")]
pub mod pool {
    pub use fieldlink_pool::*;
}

pub use fieldlink_outcome::{Fault, FaultKind, Outcome};
