//! Marker-framed echo server. Every frame received is sent back as is.
//!
//! Run with:
//!   cargo run --example marker-echo-server -- 127.0.0.1:2404
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:2404 --hex "AA BB CC"

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use fieldlink::session::{Listener, ListenerConfig, MarkerProtocol, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:2404".to_string());
    let (host, port) = addr.rsplit_once(':').ok_or("expected host:port")?;

    let listener = Listener::new(
        MarkerProtocol,
        |session: &mut Session, frame: Bytes| {
            eprintln!("{} sent {} bytes", session.peer_addr(), frame.len());
            if session.send(&frame).is_failure() {
                session.close();
            }
        },
        ListenerConfig::new(host, port.parse()?),
    );
    let bound = listener.start().into_result()?;
    eprintln!("Listening on {bound}");

    loop {
        thread::sleep(Duration::from_secs(10));
        for info in listener.sessions() {
            eprintln!("  {} ({} messages)", info.peer, info.messages);
        }
    }
}
