//! vmconsole: unattended login over virtual machine serial consoles
//!
//! vmconsole drives an interactive console (a VM's serial port reached through
//! a websocket, a `virtctl console` client in a PTY, any duplex byte stream)
//! from an unknown state to a root shell with a known terminal setup. Nothing
//! on the guest has to cooperate: the library types at the console like a
//! person would and reacts to the prompts it reads back.
//!
//! # Layers
//!
//! - **Session engine**: [`Session`], [`Pattern`], [`Case`] and [`Batch`].
//!   Send bytes, wait for the first of several regular expressions, run
//!   scripted send/expect sequences under one deadline.
//! - **Login orchestrator**: [`ConsoleLogin`]. Probe for a shell, log in with
//!   one retry on timeout, escalate, prepare the shell, always close.
//! - **Transports**: the [`transport::Transport`] trait and a PTY
//!   implementation running any console client command.
//! - **Configuration**: [`LoginConfig`], read from a key/value map or the
//!   environment.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vmconsole::transport::PtyTransport;
//! use vmconsole::{ConsoleLogin, LoginConfig, TargetIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoginConfig::new(TargetIdentity::new("vmi-latency"));
//!     let transport = PtyTransport::new("virtctl").arg("console").arg("{name}");
//!
//!     let state = ConsoleLogin::new(transport, config)
//!         .ensure_logged_in()
//!         .await?;
//!     println!("{:?}", state);
//!     Ok(())
//! }
//! ```
//!
//! # Pattern Matching
//!
//! All patterns of one wait are evaluated against the accumulated output after
//! every read, and the first one in declaration order that matches wins, even
//! when a later pattern's text arrived earlier:
//!
//! ```rust,no_run
//! use vmconsole::{Pattern, Session};
//! use std::time::Duration;
//!
//! # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
//! let patterns = [
//!     Pattern::new(r"(localhost|fedora) login: ")?,
//!     Pattern::new("Password:")?,
//!     Pattern::new(r"(\$ |\# )")?,
//! ];
//! let result = session
//!     .expect_one_of(&patterns, Duration::from_secs(10))
//!     .await?;
//! match result.pattern_index {
//!     0 => println!("Login banner"),
//!     1 => println!("Password prompt"),
//!     _ => println!("Shell"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Batches
//!
//! ```rust,no_run
//! use vmconsole::{Batch, Case, CaseKind, Pattern, Session};
//! use std::time::Duration;
//!
//! # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
//! let batch = Batch::new(Duration::from_secs(30))
//!     .send("\n")
//!     .switch(vec![
//!         Case::new(Pattern::new("login: ")?)
//!             .send("fedora\n")
//!             .kind(CaseKind::Continue)
//!             .retries(10),
//!         Case::new(Pattern::new("Login incorrect")?).kind(CaseKind::PermissionDenied),
//!         Case::new(Pattern::new(r"\$ ")?),
//!     ]);
//! session.run_batch(&batch).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod buffer;
mod pattern;
mod result;
mod session;

pub mod config;
pub mod login;
pub mod transport;

// Public API exports
pub use config::{ConfigError, Credentials, LoginConfig, TargetIdentity, TerminalSize, Timeouts};
pub use login::{
    ConsoleLogin, Diagnostic, DiagnosticSink, LogSink, LoginError, LoginState, NullSink, Outcome,
    Stage,
};
pub use pattern::{first_match, Case, CaseKind, Match, Matcher, Pattern};
pub use result::{ExpectError, MatchResult, PatternError};
pub use session::{Batch, Session, SessionBuilder, Step};
