use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed error carried as the cause of a [`Error::Timeout`] and returned by disposal.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which bound of a [`crate::limiter::Limiter`] ran out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhausted {
    Tries(u32),
    Time(Duration),
}

impl fmt::Display for Exhausted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Exhausted::Tries(tries) => write!(f, "attempt budget of {tries} used up"),
            Exhausted::Time(timeout) => write!(f, "time budget of {timeout:?} used up"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Type '{type_name}' is not supported: no hint claimed it, add a hint for it")]
    NotSupported { type_name: String },
    #[error("Recursion overflow at depth {depth} while traversing '{type_name}': the graph nests too deeply, raise max_depth or add a hint for it")]
    RecursionOverflow { type_name: String, depth: usize },
    #[error("{subject} timed out after {attempts} attempt(s) in {elapsed:?}: {exhausted}")]
    Timeout {
        subject: String,
        exhausted: Exhausted,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Option<BoxError>,
    },
    #[error("Copy of '{type_name}' is not equal to its source ({difference}): register or fix a copy hint for it")]
    CopyMismatch { type_name: String, difference: String },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_supported(type_name: impl Into<String>) -> Self {
        Self::NotSupported { type_name: type_name.into() }
    }
    /// Renames what a timeout was about, leaving every other error untouched.
    pub fn about(self, what: impl Into<String>) -> Self {
        match self {
            Self::Timeout { exhausted, attempts, elapsed, source, .. } => Self::Timeout {
                subject: what.into(),
                exhausted,
                attempts,
                elapsed,
                source,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// Helper conversions
impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
