#![cfg(all(unix, feature = "cli"))]

use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    let spare = TcpListener::bind("127.0.0.1:0").expect("spare port bind should succeed");
    spare.local_addr().expect("spare addr").port()
}

fn wait_for_listener(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("listener on {port} never came up");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<i32> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return status.code();
        }
        thread::sleep(Duration::from_millis(25));
    }
    let _ = child.kill();
    let _ = child.wait();
    None
}

fn spawn_echo_listener(port: u16, count: usize) -> Child {
    Command::new(env!("CARGO_BIN_EXE_fieldlink"))
        .args(["--log-level", "error", "--format", "json", "listen"])
        .arg(format!("127.0.0.1:{port}"))
        .args(["--echo", "--count", &count.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen command should start")
}

#[test]
fn send_against_echo_listener_prints_framed_reply() {
    let port = free_port();
    let mut listener = spawn_echo_listener(port, 1);
    wait_for_listener(port, Duration::from_secs(3));

    let output = Command::new(env!("CARGO_BIN_EXE_fieldlink"))
        .args(["--log-level", "error", "--format", "json", "send"])
        .arg(format!("127.0.0.1:{port}"))
        .args(["--hex", "AA BB", "--timeout", "2s"])
        .output()
        .expect("send should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("send should emit json");
    assert_eq!(payload.get("hex").and_then(|v| v.as_str()), Some("68 02 AA BB"));
    assert_eq!(payload.get("size").and_then(|v| v.as_u64()), Some(4));

    assert_eq!(wait_for_exit(&mut listener, Duration::from_secs(3)), Some(0));
}

#[test]
fn poll_reports_live_and_dead_devices() {
    let live = free_port();
    let dead = free_port();
    let mut listener = spawn_echo_listener(live, 1);
    wait_for_listener(live, Duration::from_secs(3));

    let devices = std::env::temp_dir()
        .join(format!("fieldlink-devices-{}.json", std::process::id()));
    std::fs::write(
        &devices,
        format!(
            r#"[
                {{"name": "live", "host": "127.0.0.1", "port": {live}, "command": "01 02"}},
                {{"name": "dead", "host": "127.0.0.1", "port": {dead}, "connect_timeout_ms": 500}}
            ]"#
        ),
    )
    .expect("device list should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_fieldlink"))
        .args(["--log-level", "error", "--format", "json", "poll", "--devices"])
        .arg(&devices)
        .args(["--hex", "03", "--pool-size", "2"])
        .output()
        .expect("poll should run");

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("poll should emit json");
    let rows = report
        .get("devices")
        .and_then(|v| v.as_array())
        .expect("report should list devices");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("device").and_then(|v| v.as_str()), Some("live"));
    assert_eq!(rows[0].get("response").and_then(|v| v.as_str()), Some("68 02 01 02"));
    assert_eq!(rows[1].get("success").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        report.pointer("/stats/finished").and_then(|v| v.as_u64()),
        Some(2)
    );

    let _ = std::fs::remove_file(&devices);
    assert_eq!(wait_for_exit(&mut listener, Duration::from_secs(3)), Some(0));
}
