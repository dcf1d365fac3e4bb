//! Login orchestration
//!
//! [`ConsoleLogin`] drives a console from whatever state it is in to a root
//! shell with a known terminal setup:
//!
//! 1. open a session through the transport
//! 2. probe for a shell prompt and stop early if one answers
//! 3. otherwise run the login batch, retrying it once if it times out
//! 4. prepare the shell
//!
//! The session is closed on every path out of [`ConsoleLogin::ensure_logged_in`].

mod configure;
mod diagnostics;
mod error;
pub mod prompts;

pub use configure::shell_commands;
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, NullSink};
pub use error::{LoginError, LoginState, Outcome, Stage};

use crate::config::LoginConfig;
use crate::result::ExpectError;
use crate::session::{Session, SessionBuilder};
use crate::transport::Transport;
use log::debug;

/// How many times the login batch runs before a timeout is final
pub const LOGIN_ATTEMPTS: usize = 2;

/// Logs in to one target's console.
///
/// Holds no per-run state, so one instance may serve any number of
/// sequential runs, and separate instances may run concurrently.
///
/// # Examples
///
/// ```no_run
/// use vmconsole::transport::PtyTransport;
/// use vmconsole::{ConsoleLogin, LoginConfig, Outcome};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = LoginConfig::from_env()?;
/// let transport = PtyTransport::from_command_line("virtctl console {name}")
///     .ok_or("empty console command")?;
/// let login = ConsoleLogin::new(transport, config);
///
/// let result = login.ensure_logged_in().await;
/// println!("{:?}", Outcome::of(&result));
/// # Ok(())
/// # }
/// ```
pub struct ConsoleLogin<T, D = LogSink> {
    transport: T,
    config: LoginConfig,
    sink: D,
    session: SessionBuilder,
}

impl<T: Transport> ConsoleLogin<T> {
    /// Orchestrator reporting through [`LogSink`].
    pub fn new(transport: T, config: LoginConfig) -> Self {
        Self {
            transport,
            config,
            sink: LogSink,
            session: SessionBuilder::new(),
        }
    }
}

impl<T: Transport, D: DiagnosticSink> ConsoleLogin<T, D> {
    /// Report through `sink` instead.
    pub fn with_sink<E: DiagnosticSink>(self, sink: E) -> ConsoleLogin<T, E> {
        ConsoleLogin {
            transport: self.transport,
            config: self.config,
            sink,
            session: self.session,
        }
    }

    /// Open sessions with `builder` (buffer size, ANSI stripping, transcript
    /// size). Its send timeout is replaced by the connect budget.
    pub fn session_builder(mut self, builder: SessionBuilder) -> Self {
        self.session = builder;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    /// The diagnostic sink in use.
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Bring the console to a configured root shell.
    ///
    /// # Errors
    ///
    /// - [`LoginError::Transport`] if the console cannot be opened or breaks
    /// - [`LoginError::PermissionDenied`] if the credentials are refused (never
    ///   retried)
    /// - [`LoginError::Timeout`] if both login attempts time out, or the shell
    ///   preparation times out
    /// - [`LoginError::ProtocolMismatch`] if a command exits non-zero or a
    ///   prompt repeats past its budget
    pub async fn ensure_logged_in(&self) -> Result<LoginState, LoginError> {
        let target = &self.config.target;
        let mut session = self
            .session
            .clone()
            .open(&self.transport, target, self.config.timeouts.connect)
            .await
            .map_err(|e| LoginError::from_expect(Stage::Connect, e, String::new()))?;

        let result = self.login(&mut session).await;
        session.close().await;
        result
    }

    /// Run the flow on an already open session. The session is left open.
    ///
    /// # Errors
    ///
    /// As [`ConsoleLogin::ensure_logged_in`], minus connect failures.
    pub async fn login(&self, session: &mut Session) -> Result<LoginState, LoginError> {
        let target = self.config.target.name();

        if self.probe(session).await? {
            self.sink.report(&Diagnostic::AlreadyLoggedIn { target });
            return Ok(LoginState::AlreadyLoggedIn);
        }

        let attempts = self.authenticate(session).await?;
        self.configure(session).await?;

        self.sink.report(&Diagnostic::LoggedIn { target, attempts });
        Ok(LoginState::LoggedIn)
    }

    /// `true` if a shell prompt answered. Only a timeout means "not logged in".
    async fn probe(&self, session: &mut Session) -> Result<bool, LoginError> {
        let batch = prompts::probe_batch(&self.config)
            .map_err(|e| failure(Stage::Probe, e.into(), session))?;

        session
            .send(b"\n")
            .await
            .map_err(|e| failure(Stage::Probe, e, session))?;

        match session.run_batch(&batch).await {
            Ok(_) => Ok(true),
            Err(ExpectError::Timeout { .. }) => {
                debug!("No shell prompt on {}, logging in", self.config.target.name());
                Ok(false)
            }
            Err(e) => Err(failure(Stage::Probe, e, session)),
        }
    }

    /// Returns the number of attempts used.
    async fn authenticate(&self, session: &mut Session) -> Result<usize, LoginError> {
        let target = self.config.target.name();
        let timeouts = &self.config.timeouts;
        let mut batch = prompts::login_batch(&self.config, timeouts.login)
            .map_err(|e| failure(Stage::Login, e.into(), session))?;

        let mut attempt = 1;
        loop {
            debug!("Login attempt {} to {}", attempt, target);

            let error = match session.run_batch(&batch).await {
                Ok(_) => return Ok(attempt),
                Err(e) => e,
            };

            if let ExpectError::PermissionDenied { .. } = error {
                self.sink.report(&Diagnostic::PermissionDenied {
                    target,
                    transcript: session.transcript(),
                });
                return Err(failure(Stage::Login, error, session));
            }

            self.sink.report(&Diagnostic::AttemptFailed {
                target,
                attempt,
                error: &error,
                transcript: session.transcript(),
            });

            let retryable = matches!(error, ExpectError::Timeout { .. });
            if !retryable || attempt == LOGIN_ATTEMPTS {
                return Err(failure(Stage::Login, error, session));
            }

            attempt += 1;
            batch = batch.with_timeout(timeouts.login_retry);
        }
    }

    async fn configure(&self, session: &mut Session) -> Result<(), LoginError> {
        let batch = configure::configure_batch(&self.config)
            .map_err(|e| failure(Stage::Configure, e.into(), session))?;

        match session.run_batch(&batch).await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.sink.report(&Diagnostic::ConfigureFailed {
                    target: self.config.target.name(),
                    error: &error,
                    transcript: session.transcript(),
                });
                Err(failure(Stage::Configure, error, session))
            }
        }
    }
}

fn failure(stage: Stage, error: ExpectError, session: &Session) -> LoginError {
    LoginError::from_expect(stage, error, session.transcript())
}
