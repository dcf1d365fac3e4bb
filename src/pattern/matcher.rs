//! Pattern matcher implementations

use crate::result::PatternError;
use regex::bytes::Regex;

/// Result of a pattern match
#[derive(Debug, Clone)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match
    pub end: usize,
    /// Captured groups, index 0 is the whole match
    pub captures: Vec<String>,
}

/// Trait for pattern matching
pub trait Matcher: Send + Sync {
    /// Find the leftmost match in the buffer
    fn find(&self, buffer: &[u8]) -> Option<Match>;
}

/// Regex matcher over raw bytes.
///
/// Console output is not guaranteed to be valid UTF-8 (line noise, partial
/// multi-byte sequences split across reads), so matching happens on bytes.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Create a new regex matcher
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The source expression
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        let captures = self.regex.captures(buffer)?;
        let full_match = captures.get(0)?;

        let capture_strings = captures
            .iter()
            .map(|cap| {
                cap.map(|c| String::from_utf8_lossy(c.as_bytes()).into_owned())
                    .unwrap_or_default()
            })
            .collect();

        Some(Match {
            start: full_match.start(),
            end: full_match.end(),
            captures: capture_strings,
        })
    }
}

/// Pick the winning matcher for a buffer.
///
/// Matchers are tried in declaration order and the first one that matches
/// anywhere in `buffer` wins, even when a later matcher's text sits earlier in
/// the buffer.
pub fn first_match<M: Matcher>(matchers: &[M], buffer: &[u8]) -> Option<(usize, Match)> {
    matchers
        .iter()
        .enumerate()
        .find_map(|(idx, matcher)| matcher.find(buffer).map(|m| (idx, m)))
}
