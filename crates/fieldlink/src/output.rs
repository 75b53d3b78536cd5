use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fieldlink_codec::{format_bytes, Converted};
use fieldlink_pool::PoolStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    peer: &'a str,
    size: usize,
    hex: String,
    timestamp: String,
}

/// One framed message, received by `listen` or returned by `send`.
pub fn print_message(peer: &str, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                peer,
                size: payload.len(),
                hex: format_bytes(payload),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["PEER", "SIZE", "BYTES"]);
            table.add_row(vec![
                peer.to_string(),
                payload.len().to_string(),
                format_bytes(payload),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={} size={} bytes=[{}]", peer, payload.len(), format_bytes(payload));
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_converted(converted: &Converted, format: OutputFormat) {
    let values = match converted {
        Converted::Single(value) => std::slice::from_ref(value),
        Converted::Many(values) => values.as_slice(),
    };
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(converted),
        OutputFormat::Table => {
            let mut table = new_table(vec!["INDEX", "VALUE"]);
            for (index, value) in values.iter().enumerate() {
                table.add_row(vec![index.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
            println!("{}", rendered.join(" "));
        }
    }
}

/// Result of polling one device.
#[derive(Debug, Clone, Serialize)]
pub struct PollRow {
    pub device: String,
    pub success: bool,
    pub code: u32,
    pub message: String,
    pub response: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Serialize)]
struct PollOutput<'a> {
    stats: &'a PoolStats,
    devices: &'a [PollRow],
}

pub fn print_poll(rows: &[PollRow], stats: &PoolStats, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&PollOutput {
            stats,
            devices: rows,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["DEVICE", "OK", "CODE", "MS", "RESPONSE / MESSAGE"]);
            for row in rows {
                table.add_row(vec![
                    row.device.clone(),
                    row.success.to_string(),
                    row.code.to_string(),
                    row.elapsed_ms.to_string(),
                    row.response.clone().unwrap_or_else(|| row.message.clone()),
                ]);
            }
            println!("{table}");
            println!(
                "{} of {} finished (pool size {})",
                stats.finished, stats.total, stats.pool_size
            );
        }
        OutputFormat::Pretty => {
            for row in rows {
                let detail = row.response.as_deref().unwrap_or(&row.message);
                println!(
                    "{} ok={} code={} {}ms {}",
                    row.device, row.success, row.code, row.elapsed_ms, detail
                );
            }
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
