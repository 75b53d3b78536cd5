use std::io::{ErrorKind, Read, Write};
use std::net::{
    IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket,
};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use fieldlink_codec::format_bytes;
use fieldlink_outcome::Outcome;
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::stream::DeviceStream;

/// Backlog used when the caller does not pick one.
pub const DEFAULT_BACKLOG: i32 = 128;

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addr = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.clone(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve {
            addr,
            source: std::io::Error::new(ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}

/// Open a TCP connection to a device.
///
/// Each resolved address is tried in turn, bounded by `timeout` when given.
/// Read and write timeouts are cleared on the returned stream: steady-state
/// reads block until data, peer close, or [`DeviceStream::shutdown`].
pub fn try_connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<DeviceStream> {
    let mut last_err = None;
    for addr in resolve(host, port)? {
        let attempt = match timeout {
            Some(limit) => TcpStream::connect_timeout(&addr, limit),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                prepare_stream(&stream).map_err(|source| setup_failed(addr, source))?;
                debug!(%addr, "connected to device");
                return Ok(DeviceStream::from_tcp(stream));
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(TransportError::Connect {
        addr: format!("{host}:{port}"),
        source: last_err
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no addresses")),
    })
}

fn prepare_stream(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(None)?;
    stream.set_write_timeout(None)?;
    stream.set_nodelay(true)
}

/// A socket option failing right after connect is still a connect failure.
fn setup_failed(addr: SocketAddr, source: std::io::Error) -> TransportError {
    TransportError::Connect {
        addr: addr.to_string(),
        source,
    }
}

/// Outcome form of [`try_connect`].
pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Outcome<DeviceStream> {
    try_connect(host, port, timeout).into()
}

/// Open a connected UDP socket to a device.
///
/// Reads are datagram reads: bytes of a datagram beyond the requested
/// length are discarded by the OS.
pub fn try_connect_udp(host: &str, port: u16) -> Result<DeviceStream> {
    let target = resolve(host, port)?[0];
    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let connect_err = |source| TransportError::Connect {
        addr: target.to_string(),
        source,
    };
    let socket = UdpSocket::bind(local).map_err(connect_err)?;
    socket.connect(target).map_err(connect_err)?;
    debug!(addr = %target, "connected datagram socket");
    Ok(DeviceStream::from_udp(socket))
}

/// Outcome form of [`try_connect_udp`].
pub fn connect_udp(host: &str, port: u16) -> Outcome<DeviceStream> {
    try_connect_udp(host, port).into()
}

/// Bind and listen on `host:port` with the requested backlog.
///
/// Port `0` picks a free port; read it back with [`DeviceListener::local_addr`].
pub fn try_listen(host: &str, port: u16, backlog: i32) -> Result<DeviceListener> {
    let addr = format!("{host}:{port}");
    let bind_err = |source| TransportError::Bind {
        addr: addr.clone(),
        source,
    };
    let targets = resolve(host, port).map_err(|e| match e {
        TransportError::Resolve { source, .. } => bind_err(source),
        other => other,
    })?;
    let listener = TcpListener::bind(&targets[..]).map_err(bind_err)?;
    apply_backlog(&listener, backlog).map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;

    info!(%local_addr, backlog, "listening for device connections");

    Ok(DeviceListener {
        listener,
        local_addr,
        backlog,
    })
}

/// Outcome form of [`try_listen`].
pub fn listen(host: &str, port: u16, backlog: i32) -> Outcome<DeviceListener> {
    try_listen(host, port, backlog).into()
}

// std binds with its own backlog; listen(2) again to apply the caller's.
#[cfg(unix)]
fn apply_backlog(listener: &TcpListener, backlog: i32) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor belongs to `listener`, which is alive for the
    // duration of the call; listen(2) only changes kernel-side queue length.
    let rc = unsafe { libc::listen(listener.as_raw_fd(), backlog.max(1)) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn apply_backlog(_listener: &TcpListener, _backlog: i32) -> std::io::Result<()> {
    Ok(())
}

/// Read exactly `length` bytes.
///
/// A zero-byte read before `length` is reached fails with
/// [`TransportError::PeerClosed`]; interrupted reads are retried.
pub fn try_receive_exact<R: Read + ?Sized>(stream: &mut R, length: usize) -> Result<Bytes> {
    let mut buf = BytesMut::zeroed(length);
    let mut received = 0;
    while received < length {
        match stream.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(TransportError::PeerClosed {
                    expected: length,
                    received,
                })
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::Receive(e)),
        }
    }
    let data = buf.freeze();
    if length > 0 {
        trace!(len = length, data = %format_bytes(&data), "received");
    }
    Ok(data)
}

/// Outcome form of [`try_receive_exact`].
pub fn receive_exact<R: Read + ?Sized>(stream: &mut R, length: usize) -> Outcome<Bytes> {
    try_receive_exact(stream, length).into()
}

/// Write all of `data` in one attempt. On failure the caller should close
/// the stream and reconnect.
pub fn try_send<W: Write + ?Sized>(stream: &mut W, data: &[u8]) -> Result<()> {
    trace!(len = data.len(), data = %format_bytes(data), "send");
    stream
        .write_all(data)
        .and_then(|()| stream.flush())
        .map_err(TransportError::Send)
}

/// Outcome form of [`try_send`].
pub fn send<W: Write + ?Sized>(stream: &mut W, data: &[u8]) -> Outcome<()> {
    try_send(stream, data).into()
}

/// A bound TCP listening socket.
pub struct DeviceListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    backlog: i32,
}

impl DeviceListener {
    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(DeviceStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok((DeviceStream::from_tcp(stream), peer))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn backlog(&self) -> i32 {
        self.backlog
    }

    /// A handle that can wake a blocked [`DeviceListener::accept`] from
    /// another thread.
    pub fn shutdown_handle(&self) -> Result<ListenerHandle> {
        Ok(ListenerHandle {
            listener: self.listener.try_clone()?,
            wake_addr: wake_addr(self.local_addr),
        })
    }
}

impl std::fmt::Debug for DeviceListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceListener")
            .field("local_addr", &self.local_addr)
            .field("backlog", &self.backlog)
            .finish()
    }
}

fn wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}

/// Wakes a listener's blocked accept.
#[derive(Debug)]
pub struct ListenerHandle {
    listener: TcpListener,
    wake_addr: SocketAddr,
}

impl ListenerHandle {
    /// Unblock a pending accept. The accept loop must check its own running
    /// flag afterwards; the connection made here carries no data.
    pub fn wake(&self) {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;

            // SAFETY: the descriptor is owned by our cloned listener and
            // stays open until `self` drops. On Linux this fails any
            // in-progress accept(2).
            unsafe {
                libc::shutdown(self.listener.as_raw_fd(), libc::SHUT_RDWR);
            }
        }
        match TcpStream::connect_timeout(&self.wake_addr, Duration::from_millis(250)) {
            Ok(stream) => {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            Err(e) => debug!(addr = %self.wake_addr, error = %e, "wake connect refused"),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.wake_addr
    }
}
