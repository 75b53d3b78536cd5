//! Blocking socket primitives for talking to field devices.
//!
//! Provides the small set of operations every device link is built from:
//! - [`connect`] / [`connect_udp`]: open a client socket (with connect timeout)
//! - [`listen`]: bind a TCP listener with an explicit backlog
//! - [`receive_exact`]: read exactly N bytes or fail
//! - [`send`]: write a whole buffer once
//!
//! Each operation comes in a `try_*` form returning [`Result`] for use with
//! `?`, and an [`Outcome`](fieldlink_outcome::Outcome) form for callers at
//! the public boundary. This is the lowest layer of fieldlink.

pub mod error;
pub mod socket;
pub mod stream;

pub use error::{Result, TransportError};
pub use socket::{
    connect, connect_udp, listen, receive_exact, send, try_connect, try_connect_udp, try_listen,
    try_receive_exact, try_send, DeviceListener, ListenerHandle, DEFAULT_BACKLOG,
};
pub use stream::{DeviceStream, SocketKind};
