use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use fieldlink_codec::{Endian, ValueKind, WordOrder};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod convert;
pub mod listen;
pub mod poll;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept marker-framed connections and print received frames.
    Listen(ListenArgs),
    /// Send one command to a device and print the framed response.
    Send(SendArgs),
    /// Reinterpret register values as another kind.
    Convert(ConvertArgs),
    /// Send a command to many devices through a bounded task pool.
    Poll(PollArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Convert(args) => convert::run(args, format),
        Command::Poll(args) => poll::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    pub addr: String,
    /// Send every received frame back to its sender.
    #[arg(long)]
    pub echo: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Listen backlog.
    #[arg(long, default_value_t = fieldlink_session::DEFAULT_LISTEN_BACKLOG)]
    pub backlog: i32,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device address (host:port).
    pub addr: String,
    /// Command bytes as hex (e.g. "AA BB CC").
    #[arg(long)]
    pub hex: String,
    /// Send without waiting for a response.
    #[arg(long)]
    pub no_wait: bool,
    /// Send the bytes as given, without the protocol header.
    #[arg(long)]
    pub no_framing: bool,
    /// Socket acquisition attempts.
    #[arg(long, default_value_t = fieldlink_session::DEFAULT_CONNECT_RETRIES)]
    pub retries: u32,
    /// Close the socket after the exchange instead of keeping it.
    #[arg(long)]
    pub transient: bool,
    /// Use a UDP socket.
    #[arg(long)]
    pub udp: bool,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Kind of the input values (e.g. uint16[], int32, float).
    #[arg(long)]
    pub from: ValueKind,
    /// Kind to decode as.
    #[arg(long)]
    pub to: ValueKind,
    /// Input values, comma-separated.
    #[arg(long, value_delimiter = ',', conflicts_with = "hex", required_unless_present = "hex")]
    pub values: Vec<String>,
    /// Input as raw hex bytes instead of values.
    #[arg(long)]
    pub hex: Option<String>,
    /// Word order (ABCD, BADC, CDAB, DCBA).
    #[arg(long, default_value = "ABCD")]
    pub order: WordOrder,
    /// Element byte order (little, big).
    #[arg(long, default_value = "little")]
    pub endian: Endian,
    /// Return only the element at this index.
    #[arg(long)]
    pub position: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// JSON file listing devices.
    #[arg(long, value_name = "FILE")]
    pub devices: PathBuf,
    /// Maximum devices polled at once.
    #[arg(long, default_value_t = fieldlink_pool::DEFAULT_POOL_SIZE)]
    pub pool_size: usize,
    /// Default command (hex) for devices without their own.
    #[arg(long)]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Split `host:port`. IPv6 hosts may be bracketed.
pub fn parse_endpoint(input: &str) -> CliResult<(String, u16)> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| CliError::usage(format!("expected host:port, got {input:?}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| CliError::usage(format!("invalid port in {input:?}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(CliError::usage(format!("missing host in {input:?}")));
    }
    Ok((host.to_string(), port))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_endpoint_forms() {
        assert_eq!(parse_endpoint("127.0.0.1:502").unwrap(), ("127.0.0.1".to_string(), 502));
        assert_eq!(parse_endpoint("[::1]:2404").unwrap(), ("::1".to_string(), 2404));
        assert!(parse_endpoint("plc-1").is_err());
        assert!(parse_endpoint(":502").is_err());
        assert!(parse_endpoint("plc:99999").is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
