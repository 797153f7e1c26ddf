//! Backward, bounded-memory scan for records inside the trailing window.
//!
//! The file is read in fixed-size windows from the end toward offset 0.
//! Each window is joined with the `carry` left over from the previous (later)
//! window; everything after the first newline of that join is a batch of
//! complete lines, everything before it is the new carry.
//!
//! # Invariants
//!
//! - The read offset never increases and never drops below 0.
//! - Only the carry grows across iterations, and only up to `mem_ceiling`
//!   bytes when a window holds no newline at all.
//! - Lines are evaluated newest-first; [`chronological`] restores file order.
//! - Accepted lines are the file's bytes, unmodified. Matching runs on a
//!   lossy UTF-8 view, so invalid bytes never reach a timestamp match but are
//!   kept in the output.
//!
//! # Early stop
//!
//! Under [`StopPolicy::Heuristic`] the scan ends as soon as a batch of
//! complete lines yields no accepted record while `offset > 0`. This bounds
//! I/O on large files but is an approximation: when lines are longer than a
//! chunk, a boundary batch may hold only untimestamped fragments and stop the
//! scan before an in-window record further back is reached.
//! [`StopPolicy::Exhaustive`] always walks to offset 0.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TailError;
use crate::registry::FormatSpec;
use crate::source::ByteSource;

/// Default bytes per backward read.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(size) => size,
    None => panic!("chunk size must be non-zero"),
};

/// Default ceiling for partial-line carry plus chunk.
pub const DEFAULT_MEM_CEILING: usize = 4096;

/// When to stop walking backward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Stop at the first complete batch with no accepted line.
    #[default]
    Heuristic,
    /// Always read back to offset 0.
    Exhaustive,
}

/// Tunables for a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub chunk_size: NonZeroUsize,
    pub mem_ceiling: usize,
    pub stop_policy: StopPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            mem_ceiling: DEFAULT_MEM_CEILING,
            stop_policy: StopPolicy::Heuristic,
        }
    }
}

/// Why a scan finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Offset 0 was reached and the leading fragment evaluated.
    ReachedStart,
    /// A batch at `offset` produced no accepted line.
    EarlyStop { offset: u64 },
}

/// Counters collected while scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub file_size: u64,
    pub bytes_read: u64,
    pub chunks_read: usize,
    /// Non-empty lines run through the timestamp pattern.
    pub lines_examined: usize,
    pub lines_accepted: usize,
    pub stop_reason: Option<StopReason>,
}

/// Result of a completed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Accepted raw lines without their newline, oldest first.
    pub lines: Vec<Vec<u8>>,
    pub stats: ScanStats,
}

/// The byte range read by one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWindow {
    /// A full chunk starting at `offset > 0`.
    Full { offset: u64, len: usize },
    /// The last, possibly shorter window, always starting at offset 0.
    Final { len: usize },
}

impl ReadWindow {
    /// The window that ends at `end`, or `None` once `end` is 0.
    #[must_use]
    pub fn ending_at(end: u64, chunk_size: NonZeroUsize) -> Option<Self> {
        if end == 0 {
            return None;
        }

        let chunk = u64::try_from(chunk_size.get()).unwrap_or(u64::MAX);
        if end > chunk {
            Some(Self::Full {
                offset: end - chunk,
                len: chunk_size.get(),
            })
        } else {
            // end <= chunk_size, so it fits in usize
            let len = usize::try_from(end).unwrap_or(chunk_size.get());
            Some(Self::Final { len })
        }
    }

    #[must_use]
    pub const fn offset(self) -> u64 {
        match self {
            Self::Full { offset, .. } => offset,
            Self::Final { .. } => 0,
        }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::Full { len, .. } | Self::Final { len } => len,
        }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

/// Mutable state of one scan, owned by the caller driving [`ScanState::step`].
#[derive(Debug)]
pub struct ScanState<'a> {
    spec: &'a FormatSpec,
    options: ScanOptions,
    offset: u64,
    chunk: Vec<u8>,
    carry: Vec<u8>,
    accepted: Vec<Vec<u8>>,
    stopped: Option<StopReason>,
    stats: ScanStats,
}

/// Complete-line batch evaluation summary.
#[derive(Debug, Clone, Copy, Default)]
struct BatchTally {
    examined: usize,
    accepted: usize,
}

impl<'a> ScanState<'a> {
    /// Start a scan positioned at the end of a file of `file_size` bytes.
    #[must_use]
    pub fn new(spec: &'a FormatSpec, options: ScanOptions, file_size: u64) -> Self {
        Self {
            spec,
            options,
            offset: file_size,
            chunk: Vec::new(),
            carry: Vec::new(),
            accepted: Vec::new(),
            stopped: None,
            stats: ScanStats {
                file_size,
                ..ScanStats::default()
            },
        }
    }

    /// Start of the most recently read window.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Raw bytes of the most recently read window.
    #[must_use]
    pub fn chunk(&self) -> &[u8] {
        &self.chunk
    }

    /// Incomplete leading fragment awaiting earlier bytes.
    #[must_use]
    pub fn carry(&self) -> &[u8] {
        &self.carry
    }

    /// Accepted lines in discovery order (newest first).
    #[must_use]
    pub fn accepted(&self) -> &[Vec<u8>] {
        &self.accepted
    }

    #[must_use]
    pub const fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    #[must_use]
    pub const fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Read and process the next window backward.
    ///
    /// Returns `Ok(true)` while more of the file remains to be read and
    /// `Ok(false)` once the scan has stopped.
    ///
    /// # Errors
    ///
    /// - [`TailError::Io`] if the read fails or the file shrank.
    /// - [`TailError::MemoryLimitExceeded`] if the carry would outgrow the ceiling.
    /// - [`TailError::MalformedTimestamp`] if a matched timestamp does not parse.
    pub fn step<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<bool, TailError> {
        if self.stopped.is_some() {
            return Ok(false);
        }

        let Some(window) = ReadWindow::ending_at(self.offset, self.options.chunk_size) else {
            self.finish()?;
            return Ok(false);
        };

        self.read_window(source, window)?;

        let mut joined = Vec::with_capacity(self.chunk.len() + self.carry.len());
        joined.extend_from_slice(&self.chunk);
        joined.extend_from_slice(&self.carry);

        let Some(first_newline) = joined.iter().position(|&b| b == b'\n') else {
            let wanted = joined.len();
            if wanted > self.options.mem_ceiling {
                return Err(TailError::MemoryLimitExceeded {
                    format: self.spec.name().to_string(),
                    offset: self.offset,
                    limit: self.options.mem_ceiling,
                    wanted,
                });
            }
            debug!(offset = self.offset, carry = wanted, "no newline in window; growing carry");
            self.carry = joined;

            if window.is_final() {
                self.finish()?;
                return Ok(false);
            }
            return Ok(true);
        };

        let batch = joined.split_off(first_newline);
        self.carry = joined;

        let batch_offset = self.offset + as_u64(first_newline);
        let tally = self.evaluate_batch(&batch, batch_offset)?;
        debug!(
            offset = self.offset,
            examined = tally.examined,
            accepted = tally.accepted,
            carry = self.carry.len(),
            "batch evaluated"
        );

        if window.is_final() {
            self.finish()?;
            return Ok(false);
        }

        if self.options.stop_policy == StopPolicy::Heuristic
            && tally.examined > 0
            && tally.accepted == 0
        {
            debug!(offset = self.offset, "batch yielded nothing in window; stopping early");
            self.stopped = Some(StopReason::EarlyStop {
                offset: self.offset,
            });
            self.stats.stop_reason = self.stopped;
            return Ok(false);
        }

        Ok(true)
    }

    /// Consume the state, returning accepted lines in oldest-to-newest order.
    #[must_use]
    pub fn into_outcome(self) -> ScanOutcome {
        ScanOutcome {
            lines: chronological(self.accepted),
            stats: self.stats,
        }
    }

    fn read_window<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        window: ReadWindow,
    ) -> Result<(), TailError> {
        let offset = window.offset();
        self.chunk.clear();
        self.chunk.resize(window.len(), 0);

        let n = source
            .read_at(offset, &mut self.chunk)
            .map_err(|source| self.io_error(offset, source))?;
        if n < window.len() {
            return Err(self.io_error(
                offset,
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("file shrank: wanted {} bytes, got {n}", window.len()),
                ),
            ));
        }

        self.offset = offset;
        self.stats.bytes_read += as_u64(n);
        self.stats.chunks_read += 1;
        Ok(())
    }

    // `batch` starts with the newline that terminated the carry-side
    // fragment; lines are evaluated from the back.
    fn evaluate_batch(&mut self, batch: &[u8], batch_offset: u64) -> Result<BatchTally, TailError> {
        let mut at = 0_usize;
        let lines: Vec<(usize, &[u8])> = batch
            .split(|&b| b == b'\n')
            .map(|line| {
                let start = at;
                at += line.len() + 1;
                (start, line)
            })
            .filter(|(_, line)| !line.is_empty())
            .collect();

        let mut tally = BatchTally::default();
        for (start, line) in lines.into_iter().rev() {
            tally.examined += 1;
            if self.evaluate_line(line, batch_offset + as_u64(start))? {
                tally.accepted += 1;
            }
        }
        Ok(tally)
    }

    fn evaluate_line(&mut self, raw: &[u8], line_offset: u64) -> Result<bool, TailError> {
        self.stats.lines_examined += 1;

        let line = String::from_utf8_lossy(raw);
        let Some(text) = self.spec.find_timestamp(&line) else {
            return Ok(false);
        };

        let ts = self
            .spec
            .parse_timestamp(text)
            .map_err(|source| TailError::MalformedTimestamp {
                format: self.spec.name().to_string(),
                offset: line_offset,
                text: text.to_string(),
                source,
            })?;

        if !self.spec.is_recent(ts) {
            return Ok(false);
        }

        self.accepted.push(raw.to_vec());
        self.stats.lines_accepted += 1;
        Ok(true)
    }

    // Offset 0 reached: whatever is left in the carry is the file's first line.
    fn finish(&mut self) -> Result<(), TailError> {
        let leading = std::mem::take(&mut self.carry);
        if !leading.is_empty() {
            self.evaluate_line(&leading, 0)?;
        }
        self.stopped = Some(StopReason::ReachedStart);
        self.stats.stop_reason = self.stopped;
        Ok(())
    }

    fn io_error(&self, offset: u64, source: std::io::Error) -> TailError {
        TailError::Io {
            format: self.spec.name().to_string(),
            offset,
            source,
        }
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Reverse newest-first discovery order into file order.
#[must_use]
pub fn chronological<T>(mut discovered: Vec<T>) -> Vec<T> {
    discovered.reverse();
    discovered
}

/// Scan `source` backward and return the lines newer than `spec`'s cutoff.
///
/// # Errors
///
/// Returns the first [`TailError`] raised by a read or a line; no partial
/// result is returned in that case.
pub fn scan<S: ByteSource + ?Sized>(
    source: &mut S,
    spec: &FormatSpec,
    options: ScanOptions,
) -> Result<ScanOutcome, TailError> {
    let file_size = source.size().map_err(|source| TailError::Io {
        format: spec.name().to_string(),
        offset: 0,
        source,
    })?;
    if file_size == 0 {
        debug!(format = spec.name(), "file is empty");
    }

    let mut state = ScanState::new(spec, options, file_size);
    while state.step(source)? {}

    let outcome = state.into_outcome();
    info!(
        format = spec.name(),
        file_size,
        bytes_read = outcome.stats.bytes_read,
        chunks = outcome.stats.chunks_read,
        accepted = outcome.stats.lines_accepted,
        stop = ?outcome.stats.stop_reason,
        "scan complete"
    );
    Ok(outcome)
}
