//! Scan scenarios against real files on disk.

mod support;

use std::fs::File;
use std::io::Write;
use std::num::NonZeroUsize;

use support::{access_line, log_file, naive_filter, table, text};
use tempfile::NamedTempFile;
use timetail_core::registry::lookup;
use timetail_core::{ErrorCode, ScanOptions, StopPolicy, StopReason, TailError, scan};

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

fn scan_file(
    content: &str,
    format: &str,
    window_secs: u64,
    options: ScanOptions,
) -> Result<Vec<String>, TailError> {
    let tmp = write_temp(content);
    let table = table(window_secs);
    let spec = lookup(&table, format).expect("format registered");
    let mut file = File::open(tmp.path()).expect("open temp file");
    scan(&mut file, spec, options).map(|outcome| text(outcome.lines))
}

#[test]
fn five_minute_window_keeps_recent_requests() {
    let content = log_file(&[
        access_line(600, "/ten-minutes-ago"),
        access_line(120, "/two-minutes-ago"),
        access_line(30, "/thirty-seconds-ago"),
    ]);

    let lines = scan_file(&content, "nginx", 300, ScanOptions::default()).expect("scan succeeds");
    assert_eq!(
        lines,
        vec![
            access_line(120, "/two-minutes-ago"),
            access_line(30, "/thirty-seconds-ago"),
        ]
    );
}

#[test]
fn empty_file_is_not_an_error() {
    let lines = scan_file("", "nginx", 300, ScanOptions::default()).expect("scan succeeds");
    assert!(lines.is_empty());
}

#[test]
fn invalid_calendar_date_aborts_without_output() {
    let mut content = log_file(&[access_line(20, "/fine"), access_line(10, "/fine")]);
    content.push_str("192.168.1.7 - - [32/Mar/2024:11:59:59 +0000] \"GET /x HTTP/1.1\" 200 1\n");
    content.push_str(&access_line(5, "/fine"));
    content.push('\n');

    let err = scan_file(&content, "nginx", 300, ScanOptions::default())
        .expect_err("day 32 must abort the scan");
    assert_eq!(err.code(), ErrorCode::MalformedTimestamp);
    assert!(err.to_string().contains("nginx"));
}

#[test]
fn rescanning_unchanged_file_is_idempotent() {
    let lines: Vec<String> = (0..500).rev().map(|age| access_line(age, "/poll")).collect();
    let content = log_file(&lines);
    let options = ScanOptions {
        chunk_size: NonZeroUsize::new(333).expect("non-zero"),
        ..ScanOptions::default()
    };

    let tmp = write_temp(&content);
    let table = table(120);
    let spec = lookup(&table, "nginx").expect("nginx registered");

    let first = scan(&mut File::open(tmp.path()).expect("open"), spec, options).expect("scan");
    let second = scan(&mut File::open(tmp.path()).expect("open"), spec, options).expect("scan");
    assert_eq!(first, second);
    assert_eq!(first.lines.len(), 120);
}

#[test]
fn large_file_is_only_read_near_the_end() {
    let lines: Vec<String> = (0..20_000).rev().map(|age| access_line(age, "/hit")).collect();
    let content = log_file(&lines);

    let tmp = write_temp(&content);
    let table = table(60);
    let spec = lookup(&table, "nginx").expect("nginx registered");
    let outcome = scan(
        &mut File::open(tmp.path()).expect("open"),
        spec,
        ScanOptions::default(),
    )
    .expect("scan succeeds");

    let stats = outcome.stats;
    assert_eq!(text(outcome.lines), naive_filter(&content, &table, "nginx"));
    assert!(matches!(
        stats.stop_reason,
        Some(StopReason::EarlyStop { .. })
    ));
    assert!(stats.bytes_read * 50 < stats.file_size);
}

#[test]
fn latin1_bytes_are_written_back_unchanged() {
    let mut record = access_line(30, "/search?q=").into_bytes();
    record.extend_from_slice(b" \"ref=r\xe9sum\xe9\"");
    let mut content = log_file(&[access_line(900, "/old")]).into_bytes();
    content.extend_from_slice(&record);
    content.push(b'\n');

    let mut tmp = NamedTempFile::new().expect("create temp file");
    tmp.write_all(&content).expect("write temp file");
    tmp.flush().expect("flush temp file");

    let table = table(300);
    let spec = lookup(&table, "nginx").expect("nginx registered");
    let outcome = scan(
        &mut File::open(tmp.path()).expect("open"),
        spec,
        ScanOptions::default(),
    )
    .expect("scan succeeds");
    assert_eq!(outcome.lines, vec![record]);
}

#[test]
fn stack_traces_between_records_are_skipped() {
    let content = log_file(&[
        "2024-03-10T11:50:00Z ERROR request failed".to_string(),
        "    at handler (src/server.rs:88)".to_string(),
        "2024-03-10T11:58:30Z ERROR request failed again".to_string(),
        "    at handler (src/server.rs:88)".to_string(),
        "    at main (src/main.rs:12)".to_string(),
        "2024-03-10T13:59:00+02:00 INFO recovered".to_string(),
    ]);

    let lines = scan_file(&content, "iso8601", 300, ScanOptions::default()).expect("scan");
    assert_eq!(
        lines,
        vec![
            "2024-03-10T11:58:30Z ERROR request failed again".to_string(),
            "2024-03-10T13:59:00+02:00 INFO recovered".to_string(),
        ]
    );
}

#[test]
fn line_longer_than_chunk_fits_under_ceiling() {
    let long = access_line(15, &format!("/{}", "q".repeat(3000)));
    let content = log_file(&[access_line(25, "/before"), long.clone()]);
    let options = ScanOptions {
        chunk_size: NonZeroUsize::new(512).expect("non-zero"),
        mem_ceiling: 8192,
        stop_policy: StopPolicy::Heuristic,
    };

    let lines = scan_file(&content, "nginx", 300, options).expect("scan succeeds");
    assert_eq!(lines, vec![access_line(25, "/before"), long]);
}

#[test]
fn line_longer_than_ceiling_is_refused() {
    let long = access_line(15, &format!("/{}", "q".repeat(3000)));
    let content = log_file(&[long]);
    let options = ScanOptions {
        chunk_size: NonZeroUsize::new(512).expect("non-zero"),
        mem_ceiling: 1024,
        stop_policy: StopPolicy::Heuristic,
    };

    let err = scan_file(&content, "nginx", 300, options).expect_err("ceiling must trip");
    assert_eq!(err.code(), ErrorCode::MemoryLimitExceeded);
}
