//! Device connections and framed message listeners.
//!
//! This is the layer applications talk to. A [`Connection`] owns one device
//! socket and turns "send a command, get the framed response" into a single
//! call, reconnecting after failures. A [`Listener`] serves the other side,
//! handing each framed message to a [`MessageHandler`]. Protocol specifics
//! plug in through [`DeviceProtocol`].

pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod stream_client;

pub use config::{
    ConnectionConfig, ListenerConfig, DEFAULT_CONNECT_RETRIES, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_LISTEN_BACKLOG,
};
pub use connection::{Connection, ConnectionState, ConnectionStats};
pub use error::{Result, SessionError};
pub use listener::{Listener, MessageHandler, Session};
pub use protocol::{DeviceProtocol, MarkerProtocol};
pub use registry::{SessionInfo, SessionRegistry};
pub use stream_client::{StreamClient, StreamEvents, StreamSender};
