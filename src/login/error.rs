//! Login failures and their classification

use crate::result::ExpectError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where in the login flow a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the console stream
    Connect,
    /// Looking for an already logged in shell
    Probe,
    /// Authenticating and escalating
    Login,
    /// Preparing the shell after login
    Configure,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::Probe => "probe",
            Stage::Login => "login",
            Stage::Configure => "configure",
        };
        f.write_str(name)
    }
}

/// Terminal classification of one login run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A shell prompt was already showing; no credentials were sent
    AlreadyLoggedIn,
    /// Logged in, escalated and configured
    LoggedIn,
    /// The console rejected the credentials
    PermissionDenied,
    /// A deadline expired
    Timeout,
    /// The console stream could not be opened or broke
    TransportError,
    /// The console answered something the flow cannot accept
    ProtocolMismatch,
}

impl Outcome {
    /// Classify the result of [`ConsoleLogin::ensure_logged_in`](super::ConsoleLogin::ensure_logged_in).
    pub fn of(result: &Result<LoginState, LoginError>) -> Self {
        match result {
            Ok(LoginState::AlreadyLoggedIn) => Outcome::AlreadyLoggedIn,
            Ok(LoginState::LoggedIn) => Outcome::LoggedIn,
            Err(e) => e.outcome(),
        }
    }

    /// Whether the console ended up at a root shell.
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::AlreadyLoggedIn | Outcome::LoggedIn)
    }
}

/// Successful end states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// A shell prompt answered the probe
    AlreadyLoggedIn,
    /// The full login ran
    LoggedIn,
}

/// Errors returned by the login orchestrator.
///
/// Every variant carries the console transcript captured up to the failure.
#[derive(Error, Debug)]
pub enum LoginError {
    /// The console stream failed
    #[error("console transport failed during {stage}: {source}")]
    Transport {
        /// Failing stage
        stage: Stage,
        /// Underlying engine error
        #[source]
        source: ExpectError,
        /// Console output so far
        transcript: String,
    },

    /// A stage ran out of time
    #[error("{stage} timed out after {duration:?}")]
    Timeout {
        /// Failing stage
        stage: Stage,
        /// The budget that expired
        duration: Duration,
        /// Console output so far
        transcript: String,
    },

    /// The credentials were refused
    #[error("login refused by the console")]
    PermissionDenied {
        /// Console output so far
        transcript: String,
    },

    /// The console answered unexpectedly
    #[error("unexpected console response during {stage}: {detail}")]
    ProtocolMismatch {
        /// Failing stage
        stage: Stage,
        /// What went wrong
        detail: String,
        /// Console output so far
        transcript: String,
    },
}

impl LoginError {
    /// Classify an engine error raised during `stage`.
    pub fn from_expect(stage: Stage, error: ExpectError, transcript: impl Into<String>) -> Self {
        let transcript = transcript.into();
        match error {
            ExpectError::Timeout { duration } => LoginError::Timeout {
                stage,
                duration,
                transcript,
            },
            ExpectError::PermissionDenied { .. } => LoginError::PermissionDenied { transcript },
            ExpectError::Rejected { matched, .. } => LoginError::ProtocolMismatch {
                stage,
                detail: format!("rejected response {matched:?}"),
                transcript,
            },
            ExpectError::RetriesExhausted { case_index } => LoginError::ProtocolMismatch {
                stage,
                detail: format!("prompt {case_index} repeated past its retry budget"),
                transcript,
            },
            ExpectError::PatternError(e) => LoginError::ProtocolMismatch {
                stage,
                detail: e.to_string(),
                transcript,
            },
            source => LoginError::Transport {
                stage,
                source,
                transcript,
            },
        }
    }

    /// The outcome this error stands for.
    pub fn outcome(&self) -> Outcome {
        match self {
            LoginError::Transport { .. } => Outcome::TransportError,
            LoginError::Timeout { .. } => Outcome::Timeout,
            LoginError::PermissionDenied { .. } => Outcome::PermissionDenied,
            LoginError::ProtocolMismatch { .. } => Outcome::ProtocolMismatch,
        }
    }

    /// Console output captured up to the failure.
    pub fn transcript(&self) -> &str {
        match self {
            LoginError::Transport { transcript, .. }
            | LoginError::Timeout { transcript, .. }
            | LoginError::PermissionDenied { transcript }
            | LoginError::ProtocolMismatch { transcript, .. } => transcript,
        }
    }

    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            LoginError::Transport { stage, .. }
            | LoginError::Timeout { stage, .. }
            | LoginError::ProtocolMismatch { stage, .. } => *stage,
            LoginError::PermissionDenied { .. } => Stage::Login,
        }
    }
}
