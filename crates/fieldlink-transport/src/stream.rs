use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Socket type used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    #[default]
    Tcp,
    /// Connected datagram socket. Each read consumes one datagram; bytes
    /// beyond the read buffer are discarded by the OS.
    Udp,
}

impl std::fmt::Display for SocketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketKind::Tcp => f.write_str("tcp"),
            SocketKind::Udp => f.write_str("udp"),
        }
    }
}

/// A connected device socket. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations.
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.read(buf),
            DeviceStreamInner::Udp(socket) => socket.recv(buf),
        }
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.write(buf),
            DeviceStreamInner::Udp(socket) => socket.send(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.flush(),
            DeviceStreamInner::Udp(_) => Ok(()),
        }
    }
}

impl DeviceStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: DeviceStreamInner::Tcp(stream),
        }
    }

    pub(crate) fn from_udp(socket: UdpSocket) -> Self {
        Self {
            inner: DeviceStreamInner::Udp(socket),
        }
    }

    pub fn kind(&self) -> SocketKind {
        match &self.inner {
            DeviceStreamInner::Tcp(_) => SocketKind::Tcp,
            DeviceStreamInner::Udp(_) => SocketKind::Udp,
        }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            DeviceStreamInner::Udp(socket) => socket.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            DeviceStreamInner::Udp(socket) => socket.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// The clone shares the socket: [`DeviceStream::shutdown`] on either
    /// handle unblocks a read pending on the other.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            DeviceStreamInner::Udp(socket) => Ok(Self::from_udp(socket.try_clone()?)),
        }
    }

    /// Shut both directions down. Safe to call from another thread and more
    /// than once; a socket that is already disconnected is not an error.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            DeviceStreamInner::Udp(socket) => shutdown_datagram(socket),
        };
        match result {
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.peer_addr().map_err(Into::into),
            DeviceStreamInner::Udp(socket) => socket.peer_addr().map_err(Into::into),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.local_addr().map_err(Into::into),
            DeviceStreamInner::Udp(socket) => socket.local_addr().map_err(Into::into),
        }
    }
}

#[cfg(unix)]
fn shutdown_datagram(socket: &UdpSocket) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is owned by `socket`, which outlives this call;
    // shutdown(2) does not touch memory we own.
    let rc = unsafe { libc::shutdown(socket.as_raw_fd(), libc::SHUT_RDWR) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

// Without shutdown(2) on datagram sockets, a short read timeout makes a
// pending recv return promptly.
#[cfg(not(unix))]
fn shutdown_datagram(socket: &UdpSocket) -> std::io::Result<()> {
    socket.set_read_timeout(Some(Duration::from_millis(1)))
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let peer = self.peer_addr().ok();
        f.debug_struct("DeviceStream")
            .field("kind", &self.kind())
            .field("peer", &peer)
            .finish()
    }
}
