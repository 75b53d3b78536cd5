use fieldlink_codec::parse_hex;
use fieldlink_session::{Connection, ConnectionConfig, MarkerProtocol};
use fieldlink_transport::SocketKind;
use tracing::debug;

use crate::cmd::{parse_duration, parse_endpoint, SendArgs};
use crate::exit::{codec_error, require, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let (host, port) = parse_endpoint(&args.addr)?;
    let timeout = parse_duration(&args.timeout)?;
    let command = parse_hex(&args.hex).map_err(|err| codec_error("--hex is not valid hex", err))?;

    let config = connection_config(&args, host, port, timeout);
    let endpoint = config.endpoint();
    let conn = Connection::new(MarkerProtocol, config);

    let response = require(
        "exchange failed",
        conn.exchange(&command, !args.no_wait, !args.no_framing),
    )?;
    if !args.no_wait {
        print_message(&endpoint, &response, format);
    }

    let stats = conn.stats();
    debug!(connects = stats.connects, exchanges = stats.exchanges, "send finished");
    // Goodbye failures do not change the result of the exchange.
    let _ = conn.disconnect();
    Ok(SUCCESS)
}

fn connection_config(
    args: &SendArgs,
    host: String,
    port: u16,
    timeout: std::time::Duration,
) -> ConnectionConfig {
    let kind = if args.udp { SocketKind::Udp } else { SocketKind::Tcp };
    ConnectionConfig::new(host, port)
        .with_socket_kind(kind)
        .with_connect_timeout(Some(timeout))
        .with_connect_retries(args.retries)
        .with_persistent(!args.transient)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn args() -> SendArgs {
        SendArgs {
            addr: "127.0.0.1:502".to_string(),
            hex: "AA".to_string(),
            no_wait: false,
            no_framing: false,
            retries: 2,
            transient: true,
            udp: true,
            timeout: "1s".to_string(),
        }
    }

    #[test]
    fn flags_shape_connection_config() {
        let cfg = connection_config(&args(), "plc".to_string(), 502, Duration::from_secs(1));
        assert_eq!(cfg.socket_kind, SocketKind::Udp);
        assert_eq!(cfg.connect_retries, 2);
        assert!(!cfg.persistent);
        assert_eq!(cfg.connect_timeout, Some(Duration::from_secs(1)));
        assert_eq!(cfg.endpoint(), "plc:502");
    }
}
