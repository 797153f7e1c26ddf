use std::fmt;
use std::io;
use std::path::PathBuf;

/// Machine-readable error codes for scripts that wrap `timetail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownFormat,
    InvalidPattern,
    ConfigParseError,
    MalformedTimestamp,
    MemoryLimitExceeded,
    ReadFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnknownFormat => "E1001",
            Self::InvalidPattern => "E1002",
            Self::ConfigParseError => "E1003",
            Self::MalformedTimestamp => "E2001",
            Self::MemoryLimitExceeded => "E2002",
            Self::ReadFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UnknownFormat => "Unknown log format",
            Self::InvalidPattern => "Invalid timestamp pattern",
            Self::ConfigParseError => "Config file parse error",
            Self::MalformedTimestamp => "Malformed timestamp",
            Self::MemoryLimitExceeded => "Memory limit exceeded",
            Self::ReadFailed => "File read failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::UnknownFormat => Some("Run `timetail --list-formats` to see registered formats."),
            Self::InvalidPattern => Some("Fix the `pattern` of the format entry in config.toml."),
            Self::ConfigParseError => Some("Fix syntax in the timetail config.toml and retry."),
            Self::MalformedTimestamp => {
                Some("Check that the format's pattern only matches text its layout can parse.")
            }
            Self::MemoryLimitExceeded => {
                Some("Raise --mem-ceiling or --chunk-size above the longest line in the file.")
            }
            Self::ReadFailed => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised while building the format registry or scanning a file.
///
/// Scan errors carry the format name and the byte offset they were raised at
/// so a failure can be located in the file without rerunning.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// The requested format name is not in the registry.
    #[error("unknown log format '{name}'")]
    UnknownFormat {
        name: String,
        /// Registered names, sorted.
        available: Vec<String>,
    },

    /// A line matched the timestamp pattern but the layout rejected the text.
    #[error("cannot parse timestamp {text:?} (format '{format}', byte {offset}): {source}")]
    MalformedTimestamp {
        format: String,
        /// Absolute offset of the start of the offending line.
        offset: u64,
        text: String,
        source: chrono::ParseError,
    },

    /// A partial line would grow past the configured memory ceiling.
    #[error(
        "max memory exceeded (format '{format}', byte {offset}): limit {limit}, wanted {wanted}"
    )]
    MemoryLimitExceeded {
        format: String,
        offset: u64,
        limit: usize,
        wanted: usize,
    },

    /// Reading from the file failed.
    #[error("read failed (format '{format}', byte {offset}): {source}")]
    Io {
        format: String,
        offset: u64,
        source: io::Error,
    },

    /// A registry entry's timestamp pattern does not compile.
    #[error("invalid timestamp pattern for format '{name}': {source}")]
    InvalidPattern { name: String, source: regex::Error },

    /// The config file could not be read or parsed.
    #[error("config error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl TailError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownFormat { .. } => ErrorCode::UnknownFormat,
            Self::MalformedTimestamp { .. } => ErrorCode::MalformedTimestamp,
            Self::MemoryLimitExceeded { .. } => ErrorCode::MemoryLimitExceeded,
            Self::Io { .. } => ErrorCode::ReadFailed,
            Self::InvalidPattern { .. } => ErrorCode::InvalidPattern,
            Self::Config { .. } => ErrorCode::ConfigParseError,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, TailError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::UnknownFormat,
            ErrorCode::InvalidPattern,
            ErrorCode::ConfigParseError,
            ErrorCode::MalformedTimestamp,
            ErrorCode::MemoryLimitExceeded,
            ErrorCode::ReadFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::MemoryLimitExceeded.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn memory_error_reports_offset_and_sizes() {
        let err = TailError::MemoryLimitExceeded {
            format: "nginx".to_string(),
            offset: 8192,
            limit: 4096,
            wanted: 8192,
        };
        let text = err.to_string();
        assert!(text.contains("nginx"));
        assert!(text.contains("byte 8192"));
        assert!(text.contains("limit 4096"));
        assert_eq!(err.code(), ErrorCode::MemoryLimitExceeded);
        assert!(err.hint().is_some());
    }
}
