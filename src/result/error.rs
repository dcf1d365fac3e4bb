//! Error types for the session engine

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during expect operations.
///
/// Every engine primitive (`send`, `expect_one_of`, `run_batch`) returns this
/// type. The login orchestrator is the only layer that inspects it to decide
/// whether an attempt may be retried.
///
/// # Examples
///
/// ```no_run
/// use vmconsole::{ExpectError, Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = Pattern::new(r"login: ")?;
///
/// match session.expect_one_of(&[prompt], Duration::from_secs(5)).await {
///     Ok(result) => println!("Matched: {}", result.matched),
///     Err(ExpectError::Timeout { duration }) => {
///         eprintln!("Timed out after {:?}", duration);
///     }
///     Err(ExpectError::Eof) => {
///         eprintln!("Console stream closed");
///     }
///     Err(e) => return Err(e.into()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Timeout waiting for pattern.
    ///
    /// Returned when no pattern matched (or a send did not complete) before the
    /// deadline expired. `duration` is the budget that was exhausted.
    #[error("Timeout waiting for pattern (after {duration:?})")]
    Timeout {
        /// Duration that was waited before timeout
        duration: Duration,
    },

    /// EOF reached before pattern matched.
    ///
    /// The remote side closed its output stream.
    #[error("EOF reached before pattern matched")]
    Eof,

    /// The console rejected the credentials.
    ///
    /// Produced by a case classified as `PermissionDenied`.
    #[error("Permission denied: {matched:?}")]
    PermissionDenied {
        /// Text that matched the denial pattern
        matched: String,
    },

    /// The console answered with a recognized but unwanted response.
    ///
    /// Produced by a case classified as `Reject`, e.g. a non-zero exit status.
    #[error("Rejected response: {matched:?}")]
    Rejected {
        /// Index of the case inside its switch step
        case_index: usize,
        /// Text that matched the rejecting pattern
        matched: String,
    },

    /// A `Continue` case was chosen more often than its retry budget allows.
    #[error("Retries exhausted for case {case_index}")]
    RetriesExhausted {
        /// Index of the case inside its switch step
        case_index: usize,
    },

    /// Invalid pattern.
    #[error("Invalid pattern: {0}")]
    PatternError(#[from] PatternError),

    /// The transport could not be opened.
    #[error("Failed to open console stream: {0}")]
    Connect(#[source] std::io::Error),

    /// I/O error.
    ///
    /// Returned when reading from or writing to the console stream fails.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The session has already been closed.
    #[error("Session is closed")]
    Closed,
}

impl ExpectError {
    /// Whether this error means the console stream itself is unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ExpectError::Eof | ExpectError::Connect(_) | ExpectError::IoError(_) | ExpectError::Closed
        )
    }
}

/// Errors related to pattern creation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Empty pattern.
    ///
    /// An empty expression would match any buffer, including an empty one.
    #[error("Pattern cannot be empty")]
    EmptyPattern,
}
