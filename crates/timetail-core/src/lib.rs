//! timetail-core library.
//!
//! Prints the records of a log file that fall inside a trailing time window
//! by walking the file backward in fixed-size chunks, so only the tail that
//! matters is ever read.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::TailError`] values carrying the format name and
//!   byte offset; the binary wraps them in `anyhow`.
//! - **Logging**: `tracing` macros only; subscribers are installed by the binary.

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod scanner;
pub mod source;

pub use error::{ErrorCode, TailError};
pub use registry::{FormatSpec, FormatTable};
pub use scanner::{ScanOptions, ScanOutcome, ScanStats, StopPolicy, StopReason, scan};
