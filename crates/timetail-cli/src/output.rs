//! Output layer for scan results and format listings.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `TIMETAIL_OUTPUT` env var → `"text"` | `"json"`
//! 3. Default: [`OutputMode::Text`], one raw line per record.
//!
//! Text output writes each line's bytes as stored. JSON strings must be
//! UTF-8, so the JSON report decodes lines lossily.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};
use timetail_core::{FormatSpec, FormatTable, ScanOutcome, ScanStats, StopReason};

/// The output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Raw log lines, oldest first, exactly as stored in the file.
    Text,
    /// A single JSON object with the lines and scan metadata.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(json_flag: bool, output_env: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    match output_env.map(|val| val.trim().to_ascii_lowercase()).as_deref() {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Text,
    }
}

/// Resolve the output mode from the CLI flag and environment.
pub fn resolve_output_mode(json_flag: bool) -> OutputMode {
    let env_val = std::env::var("TIMETAIL_OUTPUT").ok();
    resolve_output_mode_inner(json_flag, env_val.as_deref())
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    format: &'a str,
    cutoff: String,
    lines: Vec<Cow<'a, str>>,
    stats: &'a ScanStats,
}

#[derive(Debug, Serialize)]
struct FormatRow<'a> {
    name: &'a str,
    pattern: &'a str,
    layout: String,
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Write accepted lines (text) or the full report (JSON).
pub fn write_outcome(
    w: &mut dyn Write,
    spec: &FormatSpec,
    outcome: &ScanOutcome,
    mode: OutputMode,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Text => {
            for line in &outcome.lines {
                w.write_all(line)?;
                w.write_all(b"\n")?;
            }
        }
        OutputMode::Json => {
            let report = ScanReport {
                format: spec.name(),
                cutoff: rfc3339(spec.cutoff()),
                lines: outcome
                    .lines
                    .iter()
                    .map(|line| String::from_utf8_lossy(line))
                    .collect(),
                stats: &outcome.stats,
            };
            serde_json::to_writer_pretty(&mut *w, &report)?;
            writeln!(w)?;
        }
    }
    Ok(())
}

/// List registered formats, one per line, in name order.
pub fn write_formats(w: &mut dyn Write, table: &FormatTable, mode: OutputMode) -> anyhow::Result<()> {
    if mode.is_json() {
        let rows: Vec<FormatRow<'_>> = table
            .values()
            .map(|spec| FormatRow {
                name: spec.name(),
                pattern: spec.pattern().as_str(),
                layout: spec.layout().to_string(),
            })
            .collect();
        serde_json::to_writer_pretty(&mut *w, &rows)?;
        writeln!(w)?;
        return Ok(());
    }

    writeln!(w, "available formats:")?;
    for spec in table.values() {
        writeln!(w, "name: {} format: {}", spec.name(), spec.layout())?;
    }
    Ok(())
}

/// Human summary of a scan, written to stderr under `--stats`.
pub fn write_stats(w: &mut dyn Write, stats: &ScanStats) -> io::Result<()> {
    let stop = match stats.stop_reason {
        Some(StopReason::ReachedStart) => "reached start of file".to_string(),
        Some(StopReason::EarlyStop { offset }) => format!("early stop at byte {offset}"),
        None => "incomplete".to_string(),
    };

    writeln!(w, "{:<16} {}", "file size:", stats.file_size)?;
    writeln!(w, "{:<16} {}", "bytes read:", stats.bytes_read)?;
    writeln!(w, "{:<16} {}", "chunks read:", stats.chunks_read)?;
    writeln!(w, "{:<16} {}", "lines examined:", stats.lines_examined)?;
    writeln!(w, "{:<16} {}", "lines accepted:", stats.lines_accepted)?;
    writeln!(w, "{:<16} {stop}", "stopped:")
}
