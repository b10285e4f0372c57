//! The error taxonomy shared by the corpus loader, the CLI, and both engines.
//!
//! `EngineError` covers the three *recoverable* kinds a caller can act on
//! (`Io`, `Parse`, `Config`); `InvariantViolation` is deliberately not a
//! variant here. Invariant breaks are programming errors, not data errors,
//! so call sites `panic!` directly (see `invariant!` below) rather than
//! threading a `Result` through the hot sampling loops for a condition that
//! should never occur once the implementation is correct.

use std::path::PathBuf;

use thiserror::Error;

/// Recoverable errors surfaced while loading a corpus or validating CLI input.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The corpus or vocabulary file could not be opened or read.
    #[error("can't open {path}: {source}")]
    Io {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A header integer or token record failed to parse.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line number the malformed record was found on.
        line: usize,
        /// Human-readable description of what was expected.
        message: String,
    },

    /// A required CLI argument was missing or two options contradict each other.
    #[error("{message}")]
    Config {
        /// Human-readable description of the misconfiguration.
        message: String,
    },
}

/// Panics with a uniform message, flagging a broken sufficient-statistic
/// invariant. Kept as a macro (rather than a function returning `!`) so the
/// panic message carries the call site via `#[track_caller]` on `panic!`
/// itself.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!("invariant violation: {}", format_args!($($arg)+));
        }
    };
}
