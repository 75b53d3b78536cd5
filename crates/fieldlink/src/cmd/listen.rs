use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use fieldlink_session::{Listener, ListenerConfig, MarkerProtocol, Session};
use tracing::{info, warn};

use crate::cmd::{parse_endpoint, ListenArgs};
use crate::exit::{require, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (host, port) = parse_endpoint(&args.addr)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let received = Arc::new(AtomicUsize::new(0));
    let handler = {
        let running = Arc::clone(&running);
        let received = Arc::clone(&received);
        let echo = args.echo;
        let count = args.count;
        move |session: &mut Session, payload: Bytes| {
            let seen = received.fetch_add(1, Ordering::SeqCst) + 1;
            if count.is_some_and(|limit| seen > limit) {
                return;
            }
            print_message(&session.peer_addr().to_string(), &payload, format);
            if echo {
                let sent = session.send(&payload);
                if sent.is_failure() {
                    warn!(peer = %session.peer_addr(), error = sent.message(), "echo failed");
                }
            }
            if count.is_some_and(|limit| seen >= limit) {
                running.store(false, Ordering::SeqCst);
            }
        }
    };

    let config = ListenerConfig::new(host, port).with_backlog(args.backlog);
    let listener = Listener::new(MarkerProtocol, handler, config);
    let addr = require("listen failed", listener.start())?;
    info!(%addr, echo = args.echo, "listening for marker frames");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(50));
    }

    let _ = listener.stop();
    let _ = listener.close_sessions();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
