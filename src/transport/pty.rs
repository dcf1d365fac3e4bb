//! Transport that runs a console client inside a pseudo-terminal

use super::Transport;
use crate::config::TargetIdentity;
use log::debug;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

/// Placeholder replaced by the target's name in command arguments
pub const TARGET_PLACEHOLDER: &str = "{name}";

/// Capacity of the in-memory pipe between the PTY threads and the session
const BRIDGE_CAPACITY: usize = 16 * 1024;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// Spawns a console client command (for example `virtctl console {name}`) in
/// a PTY and exposes the PTY master as an async duplex stream.
///
/// # Examples
///
/// ```no_run
/// use vmconsole::transport::PtyTransport;
///
/// let transport = PtyTransport::from_command_line("virtctl console {name}")
///     .expect("non-empty command")
///     .pty_size(24, 80);
/// ```
#[derive(Debug, Clone)]
pub struct PtyTransport {
    program: String,
    args: Vec<String>,
    size: PtySize,
}

impl PtyTransport {
    /// Create a transport running `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }

    /// Parse a whitespace separated command line.
    ///
    /// Returns `None` for an empty command line.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(parts.fold(Self::new(program), |transport, arg| transport.arg(arg)))
    }

    /// Append an argument. `{name}` is replaced by the target's name.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set PTY (terminal) size seen by the console client.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// The command that would be run for `target`.
    pub fn command_for(&self, target: &TargetIdentity) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(
                self.args
                    .iter()
                    .map(|arg| arg.replace(TARGET_PLACEHOLDER, target.name())),
            )
            .collect()
    }

    fn spawn(&self, command: Vec<String>) -> io::Result<SpawnedPty> {
        let pty_pair = native_pty_system()
            .openpty(self.size)
            .map_err(|e| io::Error::other(format!("PTY error: {e}")))?;

        let mut cmd = CommandBuilder::new(&command[0]);
        for arg in &command[1..] {
            cmd.arg(arg);
        }

        let child = pty_pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| io::Error::other(format!("Failed to spawn console client: {e}")))?;
        drop(pty_pair.slave);

        let reader = pty_pair
            .master
            .try_clone_reader()
            .map_err(|e| io::Error::other(format!("PTY error: {e}")))?;
        let writer = pty_pair
            .master
            .take_writer()
            .map_err(|e| io::Error::other(format!("PTY error: {e}")))?;

        Ok(SpawnedPty {
            master: pty_pair.master,
            child,
            reader,
            writer,
        })
    }
}

impl Transport for PtyTransport {
    type Stream = PtyStream;

    async fn open_stream(
        &self,
        target: &TargetIdentity,
        timeout: Duration,
    ) -> io::Result<Self::Stream> {
        let command = self.command_for(target);
        debug!("Spawning console client {:?}", command);

        let transport = self.clone();
        let spawn = tokio::task::spawn_blocking(move || transport.spawn(command));
        let spawned = tokio::time::timeout(timeout, spawn)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "console client spawn timed out"))?
            .map_err(io::Error::other)??;

        Ok(spawned.into_stream())
    }
}

struct SpawnedPty {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
}

impl SpawnedPty {
    fn into_stream(self) -> PtyStream {
        let (client, bridge) = tokio::io::duplex(BRIDGE_CAPACITY);
        let (bridge_read, bridge_write) = tokio::io::split(bridge);

        // The PTY reader blocks, so it gets a dedicated thread
        let handle = tokio::runtime::Handle::current();
        let reader = self.reader;
        std::thread::spawn(move || pump_output(reader, bridge_write, handle));

        tokio::spawn(pump_input(bridge_read, self.writer));

        PtyStream {
            inner: client,
            child: self.child,
            _master: self.master,
        }
    }
}

/// Copy console output from the PTY into the bridge until either side closes
fn pump_output(
    mut reader: Box<dyn Read + Send>,
    mut bridge: tokio::io::WriteHalf<DuplexStream>,
    handle: tokio::runtime::Handle,
) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if handle.block_on(bridge.write_all(&buf[..n])).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("PTY read ended: {}", e);
                break;
            }
        }
    }
    let _ = handle.block_on(bridge.shutdown());
}

/// Copy keystrokes from the bridge into the PTY until the session shuts down
async fn pump_input(
    mut bridge: tokio::io::ReadHalf<DuplexStream>,
    mut writer: Box<dyn Write + Send>,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        let n = match bridge.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let data = buf[..n].to_vec();

        let result = tokio::task::spawn_blocking(move || {
            let result = writer.write_all(&data).and_then(|_| writer.flush());
            (writer, result)
        })
        .await;

        match result {
            Ok((returned, Ok(()))) => writer = returned,
            Ok((_, Err(e))) => {
                debug!("PTY write failed: {}", e);
                break;
            }
            Err(_) => break,
        }
    }
}

/// Duplex stream backed by a console client running in a PTY.
///
/// Dropping the stream kills the console client.
pub struct PtyStream {
    inner: DuplexStream,
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
}

impl AsyncRead for PtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for PtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl Drop for PtyStream {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Console client already gone: {}", e);
        }
    }
}
