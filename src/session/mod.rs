//! Session management for console automation

mod batch;
mod builder;
mod reader;

pub use batch::{Batch, Step};
pub use builder::SessionBuilder;

use crate::buffer::{BufferManager, Transcript};
use crate::config::TargetIdentity;
use crate::pattern::{first_match, Matcher};
use crate::result::{ExpectError, MatchResult};
use crate::transport::Transport;
use bytes::Bytes;
use log::debug;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// An open console: a duplex byte stream plus the engine state built on it.
///
/// A `Session` exclusively owns its stream. A background task drains the
/// output side into a channel, so `send` never waits on a pending read and
/// `expect_one_of` never waits on a pending write. Operations run in the
/// exact order they are issued.
///
/// Call [`Session::close`] when done; it is safe to call more than once and
/// shuts the stream down exactly once.
///
/// # Examples
///
/// ```no_run
/// use vmconsole::{Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (client, _console) = tokio::io::duplex(4096);
/// let mut session = Session::builder()
///     .send_timeout(Duration::from_secs(5))
///     .attach(client);
///
/// session.send(b"\n").await?;
/// session
///     .expect_one_of(&[Pattern::new(r"login: ")?], Duration::from_secs(5))
///     .await?;
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    incoming: mpsc::Receiver<io::Result<Bytes>>,
    reader: JoinHandle<()>,
    buffer: BufferManager,
    transcript: Transcript,
    send_timeout: Duration,
    eof_reached: bool,
    closed: bool,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Open a session through `transport` with default settings.
    ///
    /// Shorthand for `Session::builder().open(transport, target, timeout)`.
    pub async fn open<T: Transport>(
        transport: &T,
        target: &TargetIdentity,
        timeout: Duration,
    ) -> Result<Self, ExpectError> {
        SessionBuilder::new().open(transport, target, timeout).await
    }

    /// The budget applied to each standalone `send`.
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Everything observed on the console so far (bounded, most recent last).
    pub fn transcript(&self) -> &str {
        self.transcript.as_str()
    }

    /// Whether [`Session::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send literal bytes to the console.
    ///
    /// The write (including flush) is bounded by the session's send timeout.
    ///
    /// ```no_run
    /// # use vmconsole::Session;
    /// # async fn example(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    /// // Flush a stale prompt
    /// session.send(b"\n").await?;
    ///
    /// // Ctrl-C
    /// session.send(&[0x03]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        let deadline = Instant::now() + self.send_timeout;
        self.send_until(data, deadline, self.send_timeout).await
    }

    /// Send a line (appends `\n`).
    pub async fn send_line(&mut self, line: &str) -> Result<(), ExpectError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.send(&data).await
    }

    /// Wait until one of `patterns` matches the unmatched output.
    ///
    /// After every read all patterns are evaluated against the accumulated
    /// unmatched buffer; the lowest-indexed pattern that matches wins, even if
    /// a later pattern's text appears earlier. The matched region and
    /// everything before it are consumed.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::Timeout`] if nothing matches within `timeout`
    /// - [`ExpectError::Eof`] if the console closes its output first
    /// - [`ExpectError::IoError`] if reading fails
    pub async fn expect_one_of<M: Matcher>(
        &mut self,
        patterns: &[M],
        timeout: Duration,
    ) -> Result<MatchResult, ExpectError> {
        let deadline = Instant::now() + timeout;
        self.expect_until(patterns, deadline, timeout).await
    }

    /// Close both directions of the stream.
    ///
    /// Stops the background reader and shuts the write side down. Only the
    /// first call has any effect.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.reader.abort();
        self.incoming.close();
        if let Err(e) = self.writer.shutdown().await {
            debug!("Console stream shutdown failed: {}", e);
        }
        debug!("Session closed");
    }

    pub(crate) async fn send_until(
        &mut self,
        data: &[u8],
        deadline: Instant,
        budget: Duration,
    ) -> Result<(), ExpectError> {
        if self.closed {
            return Err(ExpectError::Closed);
        }

        debug!("Sending {} bytes", data.len());
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(data).await?;
            writer.flush().await?;
            Ok::<(), io::Error>(())
        };

        match tokio::time::timeout_at(deadline, write).await {
            Ok(result) => result.map_err(ExpectError::IoError),
            Err(_) => Err(ExpectError::Timeout { duration: budget }),
        }
    }

    pub(crate) async fn expect_until<M: Matcher>(
        &mut self,
        patterns: &[M],
        deadline: Instant,
        budget: Duration,
    ) -> Result<MatchResult, ExpectError> {
        if self.closed {
            return Err(ExpectError::Closed);
        }

        loop {
            if let Some(result) = self.take_match(patterns) {
                debug!(
                    "Pattern {} matched {:?}",
                    result.pattern_index, result.matched
                );
                return Ok(result);
            }

            if self.eof_reached {
                return Err(ExpectError::Eof);
            }

            match tokio::time::timeout_at(deadline, self.incoming.recv()).await {
                Err(_) => return Err(ExpectError::Timeout { duration: budget }),
                Ok(None) => self.eof_reached = true,
                Ok(Some(Err(e))) => {
                    self.eof_reached = true;
                    return Err(ExpectError::IoError(e));
                }
                Ok(Some(Ok(chunk))) => {
                    let stored = self.buffer.append(&chunk);
                    self.transcript.record(&stored);
                }
            }
        }
    }

    /// Drop everything buffered so far, matched or not.
    pub(crate) fn discard_buffered(&mut self) {
        self.buffer.clear();
    }

    fn take_match<M: Matcher>(&mut self, patterns: &[M]) -> Option<MatchResult> {
        let (pattern_index, m) = first_match(patterns, self.buffer.unmatched())?;

        let absolute_start = self.buffer.matched_position() + m.start;
        let absolute_end = self.buffer.matched_position() + m.end;

        let matched =
            String::from_utf8_lossy(&self.buffer.as_bytes()[absolute_start..absolute_end])
                .into_owned();
        let before = String::from_utf8_lossy(self.buffer.before(absolute_start)).into_owned();

        self.buffer.mark_matched(absolute_end);

        Some(MatchResult {
            pattern_index,
            matched,
            start: absolute_start,
            end: absolute_end,
            before,
            captures: m.captures,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
