//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

/// Result of a successful pattern match.
///
/// Contains the matched text, its position, the text consumed before it, and
/// any regex capture groups.
///
/// # Examples
///
/// ```no_run
/// use vmconsole::{Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
/// let banner = Pattern::new(r"(\w+) login: ")?;
/// let result = session.expect_one_of(&[banner], Duration::from_secs(5)).await?;
///
/// println!("Matched: {}", result.matched);
/// println!("Host: {}", result.captures[1]);
/// println!("Before match: {}", result.before);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Index of the pattern that matched (declaration order).
    pub pattern_index: usize,

    /// The matched text.
    pub matched: String,

    /// Start position of the match in the read buffer (byte offset).
    pub start: usize,

    /// End position of the match in the read buffer (byte offset).
    pub end: usize,

    /// Unmatched text that was consumed ahead of the match.
    ///
    /// On a console this is usually the command echo and its output.
    pub before: String,

    /// Captured groups.
    ///
    /// - Index 0: The full matched text
    /// - Index 1+: Each captured group (empty string for groups that did not
    ///   participate)
    pub captures: Vec<String>,
}
