//! Reporting of login progress and failures
//!
//! The orchestrator never writes to a global logger on its own; it hands
//! every notable event to the [`DiagnosticSink`] it was built with.

use crate::result::ExpectError;
use log::{debug, info, warn};

/// A notable event of one login run
#[derive(Debug)]
pub enum Diagnostic<'a> {
    /// The probe found a shell prompt
    AlreadyLoggedIn {
        /// Target name
        target: &'a str,
    },
    /// A login attempt failed
    AttemptFailed {
        /// Target name
        target: &'a str,
        /// 1-based attempt number
        attempt: usize,
        /// Why it failed
        error: &'a ExpectError,
        /// Console output so far
        transcript: &'a str,
    },
    /// The credentials were refused
    PermissionDenied {
        /// Target name
        target: &'a str,
        /// Console output so far
        transcript: &'a str,
    },
    /// Shell preparation after login failed
    ConfigureFailed {
        /// Target name
        target: &'a str,
        /// Why it failed
        error: &'a ExpectError,
        /// Console output so far
        transcript: &'a str,
    },
    /// Login, escalation and shell preparation finished
    LoggedIn {
        /// Target name
        target: &'a str,
        /// Login attempts used
        attempts: usize,
    },
}

/// Receiver of [`Diagnostic`] events.
///
/// Called synchronously from the login task; implementations should not
/// block.
pub trait DiagnosticSink: Send + Sync {
    /// Handle one event.
    fn report(&self, event: &Diagnostic<'_>);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for std::sync::Arc<S> {
    fn report(&self, event: &Diagnostic<'_>) {
        (**self).report(event)
    }
}

/// Forwards events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, event: &Diagnostic<'_>) {
        match event {
            Diagnostic::AlreadyLoggedIn { target } => {
                info!("Console of {} is already logged in", target)
            }
            Diagnostic::AttemptFailed {
                target,
                attempt,
                error,
                transcript,
            } => {
                warn!("Login attempt {} to {} failed: {}", attempt, target, error);
                debug!("Console transcript of {}:\n{}", target, transcript);
            }
            Diagnostic::PermissionDenied { target, transcript } => {
                warn!("Login to {} was refused", target);
                debug!("Console transcript of {}:\n{}", target, transcript);
            }
            Diagnostic::ConfigureFailed {
                target,
                error,
                transcript,
            } => {
                warn!("Console configuration of {} failed: {}", target, error);
                debug!("Console transcript of {}:\n{}", target, transcript);
            }
            Diagnostic::LoggedIn { target, attempts } => {
                info!("Logged in to {} after {} attempt(s)", target, attempts)
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _event: &Diagnostic<'_>) {}
}
