use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use fieldlink_codec::{format_bytes, parse_hex};
use fieldlink_pool::{PoolConfig, TaskPool};
use fieldlink_session::{Connection, ConnectionConfig, MarkerProtocol};
use serde::Deserialize;
use tracing::{debug, info};

use crate::cmd::PollArgs;
use crate::exit::{
    codec_error, io_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS, USAGE,
};
use crate::output::{print_poll, OutputFormat, PollRow};

/// One entry of the `--devices` file.
#[derive(Debug, Deserialize)]
struct DeviceEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    connection: ConnectionConfig,
    /// Command bytes as hex; falls back to `--hex`.
    #[serde(default)]
    command: Option<String>,
}

struct PollJob {
    device: String,
    connection: ConnectionConfig,
    command: Vec<u8>,
}

pub fn run(args: PollArgs, format: OutputFormat) -> CliResult<i32> {
    let jobs = load_jobs(&args.devices, args.hex.as_deref())?;
    if jobs.is_empty() {
        return Err(CliError::usage("device list is empty"));
    }

    let pool: TaskPool<PollRow> =
        TaskPool::new(PoolConfig::new(args.pool_size).with_thread_name("fieldlink-poll"));
    for job in jobs {
        pool.submit(
            move || poll_device(job),
            |done| {
                debug!(
                    task = done.index,
                    ok = done.succeeded,
                    queued_ms = millis(done.queued_for),
                    "poll finished"
                )
            },
        );
    }
    pool.await_completion();

    let stats = pool.stats();
    let rows: Vec<PollRow> = pool
        .drain_results()
        .into_iter()
        .map(|done| match done.result {
            Ok(row) => row,
            Err(err) => PollRow {
                device: format!("task-{}", done.index),
                success: false,
                code: 0,
                message: err.to_string(),
                response: None,
                elapsed_ms: millis(done.elapsed),
            },
        })
        .collect();

    let failed = rows.iter().filter(|row| !row.success).count();
    info!(devices = rows.len(), failed, "poll complete");
    print_poll(&rows, &stats, format);
    Ok(if failed == 0 { SUCCESS } else { FAILURE })
}

fn poll_device(job: PollJob) -> PollRow {
    let started = Instant::now();
    let conn = Connection::new(MarkerProtocol, job.connection);
    let outcome = conn.exchange(&job.command, true, true);
    let _ = conn.disconnect();

    PollRow {
        device: job.device,
        success: outcome.is_success(),
        code: outcome.code(),
        message: outcome.message().to_string(),
        response: outcome.contents().map(|payload| format_bytes(payload)),
        elapsed_ms: millis(started.elapsed()),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn load_jobs(path: &Path, default_hex: Option<&str>) -> CliResult<Vec<PollJob>> {
    let raw = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
    let entries: Vec<DeviceEntry> = serde_json::from_str(&raw)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid device list: {err}")))?;
    entries
        .into_iter()
        .map(|entry| job_from_entry(entry, default_hex))
        .collect()
}

fn job_from_entry(entry: DeviceEntry, default_hex: Option<&str>) -> CliResult<PollJob> {
    let device = entry.name.unwrap_or_else(|| entry.connection.endpoint());
    let hex = entry.command.as_deref().or(default_hex).ok_or_else(|| {
        CliError::new(USAGE, format!("{device}: no command given and no --hex default"))
    })?;
    let command =
        parse_hex(hex).map_err(|err| codec_error(&format!("{device}: bad command"), err))?;
    Ok(PollJob {
        device,
        connection: entry.connection,
        command: command.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn entries(json: &str) -> Vec<DeviceEntry> {
        serde_json::from_str(json).expect("device list should parse")
    }

    #[test]
    fn entry_flattens_connection_settings() {
        let list = entries(
            r#"[{
                "name": "boiler",
                "host": "10.0.0.5",
                "port": 2404,
                "persistent": false,
                "command": "AA 01"
            }]"#,
        );
        let job = job_from_entry(list.into_iter().next().unwrap(), None).unwrap();
        assert_eq!(job.device, "boiler");
        assert_eq!(job.connection.endpoint(), "10.0.0.5:2404");
        assert!(!job.connection.persistent);
        assert_eq!(job.command, vec![0xAA, 0x01]);
    }

    #[test]
    fn missing_command_uses_default_or_fails() {
        let list = entries(r#"[{"port": 502}]"#);
        let entry = list.into_iter().next().unwrap();
        let err = job_from_entry(entry, None).err().expect("no command should fail");
        assert_eq!(err.code, USAGE);

        let list = entries(r#"[{"port": 502}]"#);
        let job = job_from_entry(list.into_iter().next().unwrap(), Some("01")).unwrap();
        assert_eq!(job.device, "127.0.0.1:502");
        assert_eq!(job.command, vec![0x01]);
    }

    #[test]
    fn unreadable_or_malformed_files_map_to_exit_codes() {
        let err = load_jobs(Path::new("/nonexistent/devices.json"), None).err().unwrap();
        assert_eq!(err.code, USAGE);

        let path = std::env::temp_dir().join(format!("fieldlink-poll-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).expect("temp file should be writable");
        file.write_all(b"{not json").expect("write temp file");
        let err = load_jobs(&path, None).err().unwrap();
        assert_eq!(err.code, DATA_INVALID);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn unreachable_device_is_a_failed_row() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind spare port");
        let port = listener.local_addr().expect("spare addr").port();
        drop(listener);

        let row = poll_device(PollJob {
            device: "gone".to_string(),
            connection: ConnectionConfig::new("127.0.0.1", port),
            command: vec![0x01],
        });
        assert!(!row.success);
        assert!(row.response.is_none());
        assert_ne!(row.code, 0);
    }
}
