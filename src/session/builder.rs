//! Session builder for configuration

use super::reader::spawn_reader;
use crate::buffer::{BufferManager, Transcript, DEFAULT_TRANSCRIPT_LIMIT};
use crate::config::TargetIdentity;
use crate::result::ExpectError;
use crate::session::Session;
use crate::transport::Transport;
use log::debug;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

/// Default send timeout for sessions built from a raw stream (in seconds)
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Default maximum buffer size (in bytes)
const DEFAULT_MAX_BUFFER_SIZE: usize = 8192;

/// Builder for configuring and opening sessions.
///
/// # Defaults
///
/// - Send timeout: 30 seconds (replaced by the remaining connect budget when
///   opened through a [`Transport`])
/// - Max buffer size: 8192 bytes
/// - ANSI stripping: disabled
/// - Transcript: last 64 KiB
///
/// # Examples
///
/// ```no_run
/// use vmconsole::Session;
/// use std::time::Duration;
///
/// # async fn example() {
/// let (client, _console) = tokio::io::duplex(4096);
/// let session = Session::builder()
///     .send_timeout(Duration::from_secs(10))
///     .max_buffer_size(16384)
///     .strip_ansi(true)
///     .attach(client);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    send_timeout: Duration,
    max_buffer_size: usize,
    strip_ansi: bool,
    transcript_limit: usize,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            strip_ansi: false,
            transcript_limit: DEFAULT_TRANSCRIPT_LIMIT,
        }
    }

    /// Set the timeout applied to each standalone send.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set maximum buffer size in bytes.
    ///
    /// When the buffer reaches this size, old data is discarded using a 2/3 strategy
    /// (discard oldest 1/3, keep newest 2/3).
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Enable or disable ANSI escape sequence stripping.
    ///
    /// When enabled, escape sequences (colors, bracketed-paste toggles, window
    /// titles) are removed before pattern matching. They are never interpreted.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Set how many bytes of transcript are retained for diagnostics.
    pub fn transcript_limit(mut self, limit: usize) -> Self {
        self.transcript_limit = limit;
        self
    }

    /// Wrap an already-open duplex stream.
    ///
    /// Must be called from within a tokio runtime: the background reader task
    /// is spawned here.
    pub fn attach<S>(self, stream: S) -> Session
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (incoming, reader) = spawn_reader(read_half);

        Session {
            writer: Box::new(write_half),
            incoming,
            reader,
            buffer: BufferManager::new(self.max_buffer_size, self.strip_ansi),
            transcript: Transcript::new(self.transcript_limit),
            send_timeout: self.send_timeout,
            eof_reached: false,
            closed: false,
        }
    }

    /// Open a stream through `transport` and wrap it.
    ///
    /// The whole connect is bounded by `timeout`. Whatever is left of the
    /// budget afterwards becomes the session's send timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Connect`] if the transport fails or does not
    /// deliver a stream in time.
    pub async fn open<T: Transport>(
        self,
        transport: &T,
        target: &TargetIdentity,
        timeout: Duration,
    ) -> Result<Session, ExpectError> {
        let start = Instant::now();

        let stream = tokio::time::timeout(timeout, transport.open_stream(target, timeout))
            .await
            .map_err(|_| {
                ExpectError::Connect(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no console stream for {} within {:?}", target.name(), timeout),
                ))
            })?
            .map_err(ExpectError::Connect)?;

        let remaining = timeout.saturating_sub(start.elapsed());
        debug!(
            "Console stream for {} open, {:?} of budget left",
            target.name(),
            remaining
        );

        Ok(self.send_timeout(remaining).attach(stream))
    }
}
