#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::time::Duration;
use timetail_core::clock::FixedClock;
use timetail_core::registry::{self, FormatTable};

/// Frozen "now" shared by every scenario.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
        .single()
        .expect("valid instant")
}

/// Built-in registry with the cutoff at `now() - window_secs`.
pub fn table(window_secs: u64) -> FormatTable {
    registry::with_cutoff(
        registry::register(),
        Duration::from_secs(window_secs),
        &FixedClock(now()),
    )
}

/// An nginx access-log line stamped `age_secs` before [`now`].
pub fn access_line(age_secs: i64, path: &str) -> String {
    let ts = now() - TimeDelta::seconds(age_secs);
    format!(
        r#"192.168.1.7 - - [{}] "GET {path} HTTP/1.1" 200 1024 "-" "curl/8.4""#,
        ts.format("%d/%b/%Y:%H:%M:%S %z")
    )
}

/// Join lines with `\n`, with a trailing newline.
pub fn log_file(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Decode scanned lines for comparison with generated text.
pub fn text(lines: Vec<Vec<u8>>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| String::from_utf8(line).expect("utf8 line"))
        .collect()
}

/// Reference result: split the whole file and filter line by line.
pub fn naive_filter(content: &str, table: &FormatTable, format: &str) -> Vec<String> {
    let spec = registry::lookup(table, format).expect("format registered");
    content
        .split('\n')
        .filter(|line| !line.is_empty())
        .filter(|line| {
            spec.find_timestamp(line).is_some_and(|text| {
                spec.parse_timestamp(text)
                    .is_ok_and(|ts| spec.is_recent(ts))
            })
        })
        .map(str::to_string)
        .collect()
}
