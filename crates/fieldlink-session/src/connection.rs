use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use fieldlink_frame::{try_receive_framed_message, FrameConfig, FrameFactory, FramedMessage};
use fieldlink_outcome::Outcome;
use fieldlink_transport::{try_connect, try_connect_udp, try_send, DeviceStream, SocketKind};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{Result, SessionError};
use crate::protocol::DeviceProtocol;

/// Where a [`Connection`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Ready,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Counters kept by a [`Connection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Sockets successfully opened and initialized.
    pub connects: u64,
    /// Exchanges attempted.
    pub exchanges: u64,
    /// Exchanges and acquisitions that failed.
    pub failures: u64,
}

struct Inner {
    stream: Option<DeviceStream>,
    errored: bool,
}

/// A client link to one device.
///
/// The socket is opened lazily on first use and reopened after any failure.
/// Every operation that touches it runs under one lock, so concurrent
/// callers are served strictly one exchange at a time.
pub struct Connection<P> {
    protocol: P,
    config: ConnectionConfig,
    frame_config: FrameConfig,
    inner: Mutex<Inner>,
    // Clone of the current socket, reachable without the exchange lock.
    interrupt: Mutex<Option<DeviceStream>>,
    state: AtomicU8,
    connects: AtomicU64,
    exchanges: AtomicU64,
    failures: AtomicU64,
}

impl<P: DeviceProtocol> Connection<P> {
    /// Create a connection. Nothing is opened until the first exchange.
    pub fn new(protocol: P, config: ConnectionConfig) -> Self {
        let frame_config = config.frame_config();
        Self {
            protocol,
            config,
            frame_config,
            inner: Mutex::new(Inner {
                stream: None,
                errored: false,
            }),
            interrupt: Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            connects: AtomicU64::new(0),
            exchanges: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Make sure a usable socket is held, connecting and initializing one if
    /// needed. Returns the device address.
    pub fn acquire_socket(&self) -> Outcome<SocketAddr> {
        let mut inner = self.lock();
        let result = self.acquire_locked(&mut inner);
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result.into()
    }

    /// Send `command` and read back one framed response.
    ///
    /// With `apply_framing`, the protocol's pack/unpack hooks wrap the
    /// exchange. Without `expect_response`, returns an empty success right
    /// after the send. Any failure drops the socket so the next call
    /// reconnects; the failure itself is returned as is.
    pub fn exchange(
        &self,
        command: &[u8],
        expect_response: bool,
        apply_framing: bool,
    ) -> Outcome<Bytes> {
        let mut inner = self.lock();
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        let result = self.exchange_locked(&mut inner, command, expect_response, apply_framing);
        if let Err(e) = &result {
            warn!(device = %self.config.endpoint(), error = %e, "exchange failed");
            self.failures.fetch_add(1, Ordering::Relaxed);
            inner.errored = true;
            self.close_locked(&mut inner);
        } else if !self.config.persistent {
            self.close_locked(&mut inner);
        }
        result.into()
    }

    /// Run the protocol goodbye, then close the socket whatever it returned.
    pub fn disconnect(&self) -> Outcome<()> {
        let mut inner = self.lock();
        let result = match inner.stream.as_mut() {
            Some(stream) => self.protocol.extra_on_disconnect(stream),
            None => Outcome::done(),
        };
        self.close_locked(&mut inner);
        inner.errored = false;
        debug!(device = %self.config.endpoint(), "disconnected");
        result
    }

    /// Shut the current socket down without waiting for the exchange lock.
    ///
    /// A read blocked in another thread fails promptly; that exchange then
    /// reports the failure and the next one reconnects.
    pub fn interrupt(&self) -> Outcome<()> {
        let handle = self.interrupt.lock().unwrap_or_else(PoisonError::into_inner);
        match handle.as_ref() {
            Some(stream) => {
                debug!(device = %self.config.endpoint(), "interrupting connection");
                stream.shutdown().into()
            }
            None => Outcome::done(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connects: self.connects.load(Ordering::Relaxed),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn acquire_locked(&self, inner: &mut Inner) -> Result<SocketAddr> {
        if self.config.persistent && !inner.errored {
            if let Some(addr) = inner.stream.as_ref().and_then(|s| s.peer_addr().ok()) {
                return Ok(addr);
            }
        }

        self.close_locked(inner);
        self.set_state(ConnectionState::Connecting);
        match self.open() {
            Ok((stream, addr)) => {
                let handle = stream.try_clone().ok();
                *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = handle;
                inner.stream = Some(stream);
                inner.errored = false;
                self.connects.fetch_add(1, Ordering::Relaxed);
                self.set_state(ConnectionState::Ready);
                debug!(device = %addr, "connection ready");
                Ok(addr)
            }
            Err(e) => {
                inner.errored = true;
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    fn open(&self) -> Result<(DeviceStream, SocketAddr)> {
        let mut stream = match self.config.socket_kind {
            SocketKind::Tcp => {
                try_connect(&self.config.host, self.config.port, self.config.connect_timeout)?
            }
            SocketKind::Udp => try_connect_udp(&self.config.host, self.config.port)?,
        };
        let addr = stream.peer_addr()?;

        if let Err(fault) = self.protocol.initialize_on_connect(&mut stream).into_result() {
            if let Err(e) = stream.shutdown() {
                debug!(error = %e, "shutdown after failed initialization");
            }
            return Err(SessionError::hook(fault, "initialize_on_connect"));
        }
        Ok((stream, addr))
    }

    fn exchange_locked(
        &self,
        inner: &mut Inner,
        command: &[u8],
        expect_response: bool,
        apply_framing: bool,
    ) -> Result<Bytes> {
        let attempts = self.config.connect_retries.max(1);
        let mut acquired = Err(SessionError::NotConnected);
        for attempt in 1..=attempts {
            acquired = self.acquire_locked(inner);
            match &acquired {
                Ok(_) => break,
                Err(e) => debug!(attempt, attempts, error = %e, "socket acquisition failed"),
            }
        }
        acquired?;

        let packed = if apply_framing {
            self.protocol
                .pack_command_with_header(command)
                .into_result()
                .map_err(|fault| SessionError::hook(fault, "pack_command_with_header"))?
        } else {
            Bytes::copy_from_slice(command)
        };

        let stream = inner.stream.as_mut().ok_or(SessionError::NotConnected)?;
        try_send(stream, &packed)?;
        if !expect_response {
            return Ok(Bytes::new());
        }

        let message = FramedMessage::new(self.protocol.new_frame(), packed.clone());
        let received = try_receive_framed_message(stream, message, &self.frame_config)?;
        trace!(len = received.len(), "framed response received");

        if apply_framing {
            self.protocol
                .unpack_response(&packed, received)
                .into_result()
                .map_err(|fault| SessionError::hook(fault, "unpack_response"))
        } else {
            Ok(received)
        }
    }

    fn close_locked(&self, inner: &mut Inner) {
        if let Some(stream) = inner.stream.take() {
            if let Err(e) = stream.shutdown() {
                debug!(error = %e, "socket shutdown failed");
            }
        }
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_state(ConnectionState::Disconnected);
    }
}

impl<P> Drop for Connection<P> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = inner.stream.take() {
            let _ = stream.shutdown();
        }
    }
}

impl<P> std::fmt::Debug for Connection<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("device", &self.config.endpoint())
            .field("state", &ConnectionState::from_u8(self.state.load(Ordering::Relaxed)))
            .finish()
    }
}
