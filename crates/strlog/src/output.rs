use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use strlog_source::LogMessage;

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
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    schema_id: &'a str,
    seq: u64,
    source: &'a str,
    source_id: &'a str,
    device: &'a str,
    priority: Option<u16>,
    facility: Option<&'static str>,
    severity: Option<&'static str>,
    message: String,
    size: usize,
    timestamp: String,
}

pub fn print_record(msg: &LogMessage, format: OutputFormat) {
    let priority = msg.priority();
    let facility = priority.map(|p| p.facility_name());
    let severity = priority.map(|p| p.severity_name());

    match format {
        OutputFormat::Json => {
            let source = msg.source.to_string();
            let out = RecordOutput {
                schema_id: "https://schemas.3leaps.dev/strlog/cli/v1/record.schema.json",
                seq: msg.seq,
                source: &source,
                source_id: &msg.source_id,
                device: &msg.label,
                priority: priority.map(|p| p.value()),
                facility,
                severity,
                message: text_preview(msg.message()),
                size: msg.raw.len(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "FACILITY", "SEVERITY", "MESSAGE"])
                .add_row(vec![
                    msg.seq.to_string(),
                    facility.unwrap_or("-").to_string(),
                    severity.unwrap_or("-").to_string(),
                    text_preview(msg.message()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match priority {
            Some(p) => println!(
                "#{} <{}> {}.{}: {}",
                msg.seq,
                p.value(),
                p.facility_name(),
                p.severity_name(),
                text_preview(msg.message())
            ),
            None => println!("#{} {}", msg.seq, text_preview(&msg.raw)),
        },
        OutputFormat::Raw => {
            let mut line = msg.raw.to_vec();
            line.push(b'\n');
            print_raw(&line);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Kernel messages frequently end in a newline; it is trimmed for display.
fn text_preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    text.trim_end_matches(['\n', '\r']).to_string()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_trims_trailing_newlines() {
        assert_eq!(text_preview(b"disk full\n"), "disk full");
        assert_eq!(text_preview(b"a\r\n"), "a");
        assert_eq!(text_preview(b"\xffbad"), "\u{fffd}bad");
    }
}
