#![cfg(all(unix, feature = "cli"))]

use std::net::TcpListener;
use std::process::Command;

fn fieldlink(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fieldlink"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("fieldlink should run")
}

#[test]
fn convert_registers_to_float() {
    let output = fieldlink(&[
        "--format", "json", "convert", "--from", "uint16[]", "--to", "float", "--values", "0,16320",
        "--position", "0",
    ]);

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("convert should emit json");
    assert_eq!(value.as_f64(), Some(1.5));
}

#[test]
fn convert_cdab_swaps_words() {
    let output = fieldlink(&[
        "--format", "pretty", "convert", "--from", "uint16[]", "--to", "uint32", "--values", "1,2",
        "--order", "CDAB",
    ]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "65538");
}

#[test]
fn convert_out_of_range_is_data_invalid() {
    let output = fieldlink(&["convert", "--from", "uint8[]", "--to", "uint8[]", "--values", "300"]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn send_to_closed_port_is_transport_error() {
    let port = {
        let spare = TcpListener::bind("127.0.0.1:0").expect("spare port bind should succeed");
        spare.local_addr().expect("spare addr").port()
    };

    let addr = format!("127.0.0.1:{port}");
    let output = fieldlink(&["send", &addr, "--hex", "01", "--timeout", "1s"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn send_rejects_malformed_endpoint() {
    let output = fieldlink(&["send", "no-port-here", "--hex", "01"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_reports_package_version() {
    let output = fieldlink(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("fieldlink {}", env!("CARGO_PKG_VERSION"))
    );

    let extended = fieldlink(&["version", "--extended"]);
    let stdout = String::from_utf8_lossy(&extended.stdout);
    assert!(stdout.contains("features: session=true, pool=true, cli=true"));
}
