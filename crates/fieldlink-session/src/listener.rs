use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use fieldlink_frame::{try_receive_framed_message, FrameConfig, FrameError, FramedMessage};
use fieldlink_outcome::Outcome;
use fieldlink_transport::{
    try_listen, try_send, DeviceListener, DeviceStream, ListenerHandle, TransportError,
};
use tracing::{debug, info, trace, warn};

use crate::config::ListenerConfig;
use crate::error::{Result, SessionError};
use crate::protocol::DeviceProtocol;
use crate::registry::{SessionInfo, SessionRegistry};

/// Receives every framed message read by a [`Listener`].
///
/// One handler instance serves all sessions, each from its own thread.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, session: &mut Session, payload: Bytes);
}

impl<F> MessageHandler for F
where
    F: Fn(&mut Session, Bytes) + Send + Sync + 'static,
{
    fn on_message(&self, session: &mut Session, payload: Bytes) {
        self(session, payload)
    }
}

/// One accepted connection, as seen by a [`MessageHandler`].
pub struct Session {
    stream: DeviceStream,
    peer: SocketAddr,
    open: bool,
}

impl Session {
    fn new(stream: DeviceStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            open: true,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Write raw bytes back to the peer.
    pub fn send(&mut self, data: &[u8]) -> Outcome<()> {
        try_send(&mut self.stream, data).into()
    }

    /// End the session once the handler returns.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.stream.shutdown() {
                debug!(peer = %self.peer, error = %e, "session shutdown failed");
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("open", &self.open)
            .finish()
    }
}

struct Running {
    local_addr: SocketAddr,
    wake: ListenerHandle,
    accept: JoinHandle<()>,
}

/// Accepts device connections and reads framed messages from each.
///
/// Nothing runs until [`Listener::start`]. Every accepted socket gets its own
/// handler thread that loops reading framed messages until the peer goes
/// away or sends a frame that fails the protocol check.
pub struct Listener<P, H> {
    config: ListenerConfig,
    protocol: Arc<P>,
    handler: Arc<H>,
    registry: Arc<SessionRegistry>,
    running: Arc<AtomicBool>,
    state: Mutex<Option<Running>>,
}

impl<P, H> Listener<P, H>
where
    P: DeviceProtocol + 'static,
    H: MessageHandler,
{
    pub fn new(protocol: P, handler: H, config: ListenerConfig) -> Self {
        Self {
            config,
            protocol: Arc::new(protocol),
            handler: Arc::new(handler),
            registry: Arc::new(SessionRegistry::new()),
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(None),
        }
    }

    /// Bind, spawn the accept loop and return the bound address.
    pub fn start(&self) -> Outcome<SocketAddr> {
        self.try_start().into()
    }

    fn try_start(&self) -> Result<SocketAddr> {
        let mut state = self.lock_state();
        if let Some(running) = state.as_ref() {
            return Err(SessionError::AlreadyStarted(running.local_addr));
        }

        let listener = try_listen(&self.config.host, self.config.port, self.config.backlog)?;
        let local_addr = listener.local_addr();
        let wake = listener.shutdown_handle()?;

        self.running.store(true, Ordering::SeqCst);
        let accept = AcceptLoop {
            listener,
            protocol: Arc::clone(&self.protocol),
            handler: Arc::clone(&self.handler),
            registry: Arc::clone(&self.registry),
            running: Arc::clone(&self.running),
            frame_config: self.config.frame_config(),
        };
        let handle = thread::Builder::new()
            .name(format!("fieldlink-accept-{local_addr}"))
            .spawn(move || accept.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SessionError::Spawn(e)
            })?;

        info!(addr = %local_addr, backlog = self.config.backlog, "listener started");
        *state = Some(Running {
            local_addr,
            wake,
            accept: handle,
        });
        Ok(local_addr)
    }

    /// Shut the listening socket and wait for the accept loop to exit.
    ///
    /// Sessions already accepted keep running; see
    /// [`Listener::close_sessions`].
    pub fn stop(&self) -> Outcome<()> {
        self.stop_accepting();
        Outcome::done()
    }

    /// Shut every accepted session down. Returns how many were signalled.
    pub fn close_sessions(&self) -> Outcome<usize> {
        let closed = self.registry.close_all();
        debug!(closed, "closing sessions");
        Outcome::success(closed)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.snapshot()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_state().as_ref().map(|r| r.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl<P, H> Listener<P, H> {
    fn lock_state(&self) -> MutexGuard<'_, Option<Running>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_accepting(&self) {
        let running = self.lock_state().take();
        if let Some(running) = running {
            self.running.store(false, Ordering::SeqCst);
            running.wake.wake();
            if running.accept.join().is_err() {
                warn!(addr = %running.local_addr, "accept thread panicked");
            }
            info!(addr = %running.local_addr, "listener stopped");
        }
    }
}

impl<P, H> Drop for Listener<P, H> {
    fn drop(&mut self) {
        self.stop_accepting();
    }
}

struct AcceptLoop<P, H> {
    listener: DeviceListener,
    protocol: Arc<P>,
    handler: Arc<H>,
    registry: Arc<SessionRegistry>,
    running: Arc<AtomicBool>,
    frame_config: FrameConfig,
}

impl<P, H> AcceptLoop<P, H>
where
    P: DeviceProtocol + 'static,
    H: MessageHandler,
{
    fn run(self) {
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        let _ = stream.shutdown();
                        break;
                    }
                    if let Err(e) = self.spawn_session(stream, peer) {
                        warn!(%peer, error = %e, "could not start session");
                    }
                }
                Err(e) => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    if is_fatal_accept(&e) {
                        warn!(error = %e, "accept loop giving up");
                        break;
                    }
                    debug!(error = %e, "accept failed");
                }
            }
        }
        debug!(addr = %self.listener.local_addr(), "accept loop exited");
    }

    fn spawn_session(&self, stream: DeviceStream, peer: SocketAddr) -> Result<()> {
        self.registry.register(peer, stream.try_clone()?);

        let protocol = Arc::clone(&self.protocol);
        let handler = Arc::clone(&self.handler);
        let registry = Arc::clone(&self.registry);
        let frame_config = self.frame_config;
        let spawned = thread::Builder::new()
            .name(format!("fieldlink-session-{peer}"))
            .spawn(move || {
                let session = Session::new(stream, peer);
                serve_session(session, &*protocol, &*handler, &registry, &frame_config);
                registry.unregister(&peer);
            });

        if let Err(e) = spawned {
            self.registry.unregister(&peer);
            return Err(SessionError::Spawn(e));
        }
        Ok(())
    }
}

fn serve_session<P, H>(
    mut session: Session,
    protocol: &P,
    handler: &H,
    registry: &SessionRegistry,
    frame_config: &FrameConfig,
) where
    P: DeviceProtocol + ?Sized,
    H: MessageHandler + ?Sized,
{
    let peer = session.peer;
    debug!(%peer, "session started");
    while session.is_open() {
        let message = FramedMessage::unsolicited(protocol.new_frame());
        match try_receive_framed_message(&mut session.stream, message, frame_config) {
            Ok(payload) => {
                trace!(%peer, len = payload.len(), "message received");
                registry.record_message(&peer);
                handler.on_message(&mut session, payload);
            }
            Err(FrameError::Transport(TransportError::PeerClosed { received: 0, .. })) => {
                debug!(%peer, "peer closed session");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "session ended");
                break;
            }
        }
    }
    session.close();
}

fn is_fatal_accept(err: &TransportError) -> bool {
    match err {
        TransportError::Accept(io) => matches!(
            io.kind(),
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::NotConnected
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use fieldlink_frame::{encode_marker_frame, FrameReader, MarkerFrame};
    use fieldlink_transport::try_connect;

    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connection::Connection;
    use crate::protocol::MarkerProtocol;

    fn loopback() -> ListenerConfig {
        ListenerConfig::new("127.0.0.1", 0).with_backlog(16)
    }

    fn connect_to(addr: SocketAddr) -> DeviceStream {
        try_connect("127.0.0.1", addr.port(), Some(Duration::from_secs(2)))
            .expect("client should connect")
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn delivers_marker_frame_exactly_once() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let tx = Mutex::new(tx);
        let listener = Listener::new(
            MarkerProtocol,
            move |_: &mut Session, payload: Bytes| {
                let _ = tx.lock().expect("sender lock").send(payload.to_vec());
            },
            loopback(),
        );
        let addr = listener.start().into_contents().expect("listener should start");

        let mut client = connect_to(addr);
        try_send(&mut client, &[0x68, 0x03, 0xAA, 0xBB, 0xCC, 0x68, 0x00]).expect("client send");

        let first = rx.recv_timeout(Duration::from_secs(2)).expect("first frame");
        assert_eq!(first, vec![0x68, 0x03, 0xAA, 0xBB, 0xCC]);
        let second = rx.recv_timeout(Duration::from_secs(2)).expect("second frame");
        assert_eq!(second, vec![0x68, 0x00]);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        assert!(listener.stop().is_success());
    }

    #[test]
    fn echo_round_trip_with_connection() {
        let listener = Listener::new(
            MarkerProtocol,
            |session: &mut Session, payload: Bytes| {
                let _ = session.send(&payload);
            },
            loopback(),
        );
        let addr = listener.start().into_contents().expect("listener should start");

        let conn = Connection::new(
            MarkerProtocol,
            ConnectionConfig::new("127.0.0.1", addr.port()),
        );
        let reply = conn.exchange(b"ping", true, true);
        assert_eq!(
            reply.into_contents().expect("reply").as_ref(),
            &[0x68, 0x04, b'p', b'i', b'n', b'g']
        );

        assert!(wait_until(|| listener.sessions().len() == 1));
        assert_eq!(listener.sessions()[0].messages, 1);
        drop(conn);
        assert!(wait_until(|| listener.sessions().is_empty()));
    }

    #[test]
    fn start_twice_is_rejected() {
        let listener = Listener::new(MarkerProtocol, |_: &mut Session, _: Bytes| {}, loopback());
        let addr = listener.start().into_contents().expect("listener should start");
        let again = listener.start();
        assert!(again.is_failure());
        assert!(again.message().contains(&addr.to_string()));
    }

    #[test]
    fn stop_ends_accept_loop_and_allows_restart() {
        let listener = Listener::new(MarkerProtocol, |_: &mut Session, _: Bytes| {}, loopback());
        let addr = listener.start().into_contents().expect("listener should start");
        assert!(listener.is_running());
        assert_eq!(listener.local_addr(), Some(addr));

        assert!(listener.stop().is_success());
        assert!(!listener.is_running());
        assert_eq!(listener.local_addr(), None);
        // Stopping twice is harmless.
        assert!(listener.stop().is_success());

        let restarted = listener.start();
        assert!(restarted.is_success(), "{}", restarted.message());
        listener.stop();
    }

    #[test]
    fn stop_leaves_sessions_and_close_sessions_ends_them() {
        let (tx, rx) = mpsc::channel::<()>();
        let tx = Mutex::new(tx);
        let listener = Listener::new(
            MarkerProtocol,
            move |_: &mut Session, _: Bytes| {
                let _ = tx.lock().expect("sender lock").send(());
            },
            loopback(),
        );
        let addr = listener.start().into_contents().expect("listener should start");

        let mut client = connect_to(addr);
        try_send(&mut client, &encode_marker_frame(b"a").expect("frame")).expect("client send");
        rx.recv_timeout(Duration::from_secs(2)).expect("handler called");

        listener.stop();
        try_send(&mut client, &encode_marker_frame(b"b").expect("frame")).expect("client send");
        rx.recv_timeout(Duration::from_secs(2)).expect("session survives stop");

        assert_eq!(listener.close_sessions().into_contents(), Some(1));
        let mut buf = [0u8; 1];
        let read = client.read(&mut buf);
        assert!(matches!(read, Ok(0)) || read.is_err());
        assert!(wait_until(|| listener.sessions().is_empty()));
    }

    #[test]
    fn handler_close_ends_session() {
        let listener = Listener::new(
            MarkerProtocol,
            |session: &mut Session, _: Bytes| session.close(),
            loopback(),
        );
        let addr = listener.start().into_contents().expect("listener should start");

        let mut client = connect_to(addr);
        try_send(&mut client, &[0x68, 0x00]).expect("client send");
        let mut reader = FrameReader::new(client);
        assert!(reader.read_next(&|| MarkerFrame).is_err());
    }

    #[test]
    fn integrity_failure_drops_session() {
        let listener = Listener::new(MarkerProtocol, |_: &mut Session, _: Bytes| {}, loopback());
        let addr = listener.start().into_contents().expect("listener should start");

        let mut client = connect_to(addr);
        try_send(&mut client, &[0x10, 0x02, 0x00, 0x00]).expect("client send");
        let mut buf = [0u8; 1];
        let read = client.read(&mut buf);
        assert!(matches!(read, Ok(0)) || read.is_err());
        assert!(wait_until(|| listener.sessions().is_empty()));
    }
}
