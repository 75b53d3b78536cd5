//! Poll several devices concurrently, at most two at a time.
//!
//! Run with:
//!   cargo run --example poll-devices -- 127.0.0.1:2404 127.0.0.1:2405 127.0.0.1:2406

use fieldlink::codec::format_bytes;
use fieldlink::pool::{PoolConfig, TaskPool};
use fieldlink::session::{Connection, ConnectionConfig, MarkerProtocol};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pool: TaskPool<String> = TaskPool::new(PoolConfig::new(2));

    for endpoint in std::env::args().skip(1) {
        let (host, port) = endpoint.rsplit_once(':').ok_or("expected host:port")?;
        let config = ConnectionConfig::new(host, port.parse()?).with_persistent(false);
        pool.execute(move || {
            let conn = Connection::new(MarkerProtocol, config);
            let reply = conn.exchange(&[0x01], true, true);
            match reply.contents() {
                Some(frame) => format!("{endpoint}: {}", format_bytes(frame)),
                None => format!("{endpoint}: {}", reply.message()),
            }
        });
    }

    pool.await_completion();
    for done in pool.drain_results() {
        match done.result {
            Ok(line) => println!("{line} ({} ms)", done.elapsed.as_millis()),
            Err(err) => println!("task {} failed: {err}", done.index),
        }
    }
    println!("{:?}", pool.stats());
    Ok(())
}
