use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::{BufMut, Bytes, BytesMut};
use fieldlink_frame::{MARKER, MARKER_HEAD_SIZE};
use fieldlink_outcome::Outcome;
use fieldlink_transport::{
    try_connect, try_connect_udp, try_receive_exact, try_send, DeviceStream, SocketKind,
    TransportError,
};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{Result, SessionError};

/// Callbacks for a [`StreamClient`]; all run on its receive thread.
pub trait StreamEvents: Send + 'static {
    fn on_connect(&mut self, _sender: &StreamSender) {}

    /// A complete marker frame: marker, length byte and content.
    fn on_data(&mut self, sender: &StreamSender, frame: Bytes);

    /// The peer closed the stream.
    fn on_close(&mut self, _reason: &str) {}

    /// Any other receive failure. The stream is closed afterwards.
    fn on_error(&mut self, _error: &SessionError) {}
}

/// Cloneable write half of a [`StreamClient`].
#[derive(Clone)]
pub struct StreamSender {
    stream: Arc<Mutex<DeviceStream>>,
}

impl StreamSender {
    pub fn send(&self, data: &[u8]) -> Outcome<()> {
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        try_send(&mut *stream, data).into()
    }
}

impl std::fmt::Debug for StreamSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSender").finish_non_exhaustive()
    }
}

/// A push client for devices that stream `0x68`-framed messages without
/// being asked.
///
/// The receive thread resynchronizes on the marker byte: anything that is
/// not `0x68` at a frame boundary is skipped.
pub struct StreamClient {
    endpoint: String,
    sender: StreamSender,
    reader: Option<DeviceStream>,
    valid: Arc<AtomicBool>,
    receive: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Open the socket. Call [`StreamClient::start`] to begin receiving.
    pub fn connect(config: &ConnectionConfig) -> Outcome<Self> {
        Self::try_connect(config).into()
    }

    fn try_connect(config: &ConnectionConfig) -> Result<Self> {
        let stream = match config.socket_kind {
            SocketKind::Tcp => try_connect(&config.host, config.port, config.connect_timeout)?,
            SocketKind::Udp => try_connect_udp(&config.host, config.port)?,
        };
        let reader = stream.try_clone()?;
        Ok(Self {
            endpoint: config.endpoint(),
            sender: StreamSender {
                stream: Arc::new(Mutex::new(stream)),
            },
            reader: Some(reader),
            valid: Arc::new(AtomicBool::new(true)),
            receive: None,
        })
    }

    /// Spawn the receive thread. `events` gets `on_connect` first.
    pub fn start<E: StreamEvents>(&mut self, events: E) -> Outcome<()> {
        self.try_start(events).into()
    }

    fn try_start<E: StreamEvents>(&mut self, mut events: E) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            return Err(SessionError::NotConnected);
        };
        let valid = Arc::clone(&self.valid);
        let sender = self.sender.clone();
        let handle = thread::Builder::new()
            .name(format!("fieldlink-stream-{}", self.endpoint))
            .spawn(move || {
                events.on_connect(&sender);
                receive_loop(reader, &valid, &sender, &mut events);
                valid.store(false, Ordering::SeqCst);
            })
            .map_err(SessionError::Spawn)?;
        self.receive = Some(handle);
        Ok(())
    }

    pub fn send(&self, data: &[u8]) -> Outcome<()> {
        self.sender.send(data)
    }

    pub fn sender(&self) -> StreamSender {
        self.sender.clone()
    }

    /// False once closed locally or by the peer.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Shut the socket down and wait for the receive thread.
    pub fn close(&mut self) {
        self.valid.store(false, Ordering::SeqCst);
        {
            let stream = self.sender.stream.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = stream.shutdown() {
                debug!(endpoint = %self.endpoint, error = %e, "stream shutdown failed");
            }
        }
        if let Some(handle) = self.receive.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(endpoint = %self.endpoint, "stream receive thread panicked");
            }
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.endpoint)
            .field("valid", &self.is_valid())
            .finish()
    }
}

fn receive_loop<E: StreamEvents>(
    mut reader: DeviceStream,
    valid: &AtomicBool,
    sender: &StreamSender,
    events: &mut E,
) {
    while valid.load(Ordering::SeqCst) {
        match read_marker_frame(&mut reader) {
            Ok(Some(frame)) => events.on_data(sender, frame),
            Ok(None) => {}
            Err(e) => {
                if !valid.load(Ordering::SeqCst) {
                    break;
                }
                match e {
                    TransportError::PeerClosed { .. } => events.on_close("remote close"),
                    other => events.on_error(&SessionError::Transport(other)),
                }
                break;
            }
        }
    }
}

/// One frame, or `None` when the byte read was not a marker.
fn read_marker_frame(reader: &mut DeviceStream) -> fieldlink_transport::Result<Option<Bytes>> {
    let start = try_receive_exact(reader, 1)?;
    if start[0] != MARKER {
        trace!(byte = start[0], "skipping byte outside frame");
        return Ok(None);
    }
    let length = try_receive_exact(reader, 1)?;
    let content = try_receive_exact(reader, usize::from(length[0]))?;

    let mut frame = BytesMut::with_capacity(MARKER_HEAD_SIZE + content.len());
    frame.put_u8(MARKER);
    frame.put_u8(length[0]);
    frame.put_slice(&content);
    Ok(Some(frame.freeze()))
}
