//! Pattern matching for expect operations

mod matcher;

pub use matcher::{first_match, Match, Matcher};

use crate::result::PatternError;
use matcher::RegexMatcher;

/// Default number of times a case may be chosen inside one batch run.
pub const DEFAULT_CASE_RETRIES: usize = 1;

/// A compiled regular expression matched against console output.
///
/// Patterns operate on raw bytes; `.` does not cross newlines unless the
/// expression enables `(?s)`.
///
/// # Examples
///
/// ```
/// use vmconsole::Pattern;
///
/// let banner = Pattern::new(r"(localhost|fedora) login: ").unwrap();
/// let prompt = Pattern::new(r"(\$ |\# )").unwrap();
/// assert_eq!(prompt.as_str(), r"(\$ |\# )");
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    matcher: RegexMatcher,
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is empty or not a valid regex.
    pub fn new(expression: &str) -> Result<Self, PatternError> {
        Ok(Self {
            matcher: RegexMatcher::new(expression)?,
        })
    }

    /// The source expression.
    pub fn as_str(&self) -> &str {
        self.matcher.as_str()
    }
}

impl Matcher for Pattern {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        self.matcher.find(buffer)
    }
}

/// What a matching case means for the batch that evaluates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    /// Send the case's bytes and keep waiting on the same switch step.
    Continue,
    /// Send the case's bytes and advance to the next step.
    Success,
    /// Abort the batch: the console rejected the credentials.
    PermissionDenied,
    /// Abort the batch: the console gave a recognized but unwanted answer.
    Reject,
}

/// One arm of a switch step: a pattern, the bytes to send when it matches,
/// its classification and a retry budget.
///
/// # Examples
///
/// ```
/// use vmconsole::{Case, CaseKind, Pattern};
///
/// let password = Case::new(Pattern::new("Password:").unwrap())
///     .send("secret\n")
///     .kind(CaseKind::Continue)
///     .retries(10);
/// assert_eq!(password.retry_budget(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct Case {
    pattern: Pattern,
    send: Vec<u8>,
    kind: CaseKind,
    retries: usize,
}

impl Case {
    /// Create a `Success` case that sends nothing.
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            send: Vec::new(),
            kind: CaseKind::Success,
            retries: DEFAULT_CASE_RETRIES,
        }
    }

    /// Bytes to send when the case matches.
    pub fn send(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.send = data.into();
        self
    }

    /// Classification of the case.
    pub fn kind(mut self, kind: CaseKind) -> Self {
        self.kind = kind;
        self
    }

    /// How many times the case may be chosen within one batch run.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// The case's pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Bytes sent on match (may be empty).
    pub fn data(&self) -> &[u8] {
        &self.send
    }

    /// The case's classification.
    pub fn case_kind(&self) -> CaseKind {
        self.kind
    }

    /// The configured retry budget.
    pub fn retry_budget(&self) -> usize {
        self.retries
    }
}

impl Matcher for Case {
    fn find(&self, buffer: &[u8]) -> Option<Match> {
        self.pattern.find(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_defaults() {
        let case = Case::new(Pattern::new("login: ").unwrap());
        assert_eq!(case.case_kind(), CaseKind::Success);
        assert!(case.data().is_empty());
        assert_eq!(case.retry_budget(), DEFAULT_CASE_RETRIES);
    }

    #[test]
    fn test_case_builder() {
        let case = Case::new(Pattern::new("Login incorrect").unwrap())
            .kind(CaseKind::PermissionDenied)
            .send(b"\n".to_vec())
            .retries(3);

        assert_eq!(case.case_kind(), CaseKind::PermissionDenied);
        assert_eq!(case.data(), b"\n");
        assert_eq!(case.retry_budget(), 3);
        assert_eq!(case.pattern().as_str(), "Login incorrect");
    }

    #[test]
    fn test_cases_match_in_declaration_order() {
        let cases = [
            Case::new(Pattern::new("Login incorrect").unwrap()),
            Case::new(Pattern::new("login: ").unwrap()),
        ];

        let (idx, _) = first_match(&cases, b"vm login: \r\nLogin incorrect").unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_pattern_rejects_empty() {
        assert!(Pattern::new("").is_err());
    }
}
