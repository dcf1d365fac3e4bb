//! Fake consoles shared by the integration tests

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use vmconsole::transport::Transport;
use vmconsole::{Diagnostic, DiagnosticSink, ExpectError, TargetIdentity};

/// Pause between "Login incorrect" and the next banner
pub const RELOGIN_DELAY: Duration = Duration::from_secs(2);

/// Duplex stream that counts shutdown calls
pub struct CountingStream {
    inner: DuplexStream,
    shutdowns: Arc<AtomicUsize>,
}

impl CountingStream {
    pub fn new(inner: DuplexStream) -> (Self, Arc<AtomicUsize>) {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                shutdowns: shutdowns.clone(),
            },
            shutdowns,
        )
    }
}

impl AsyncRead for CountingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for CountingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Hands out one prepared stream
pub struct OneShotTransport {
    stream: Mutex<Option<CountingStream>>,
}

impl OneShotTransport {
    pub fn new(stream: CountingStream) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
        }
    }
}

impl Transport for OneShotTransport {
    type Stream = CountingStream;

    async fn open_stream(
        &self,
        _target: &TargetIdentity,
        _timeout: Duration,
    ) -> io::Result<CountingStream> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "console in use"))
    }
}

/// Refuses every connection
pub struct RefusingTransport;

impl Transport for RefusingTransport {
    type Stream = DuplexStream;

    async fn open_stream(
        &self,
        target: &TargetIdentity,
        _timeout: Duration,
    ) -> io::Result<DuplexStream> {
        Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("no console for {}", target.name()),
        ))
    }
}

/// Never answers
pub struct HangingTransport;

impl Transport for HangingTransport {
    type Stream = DuplexStream;

    async fn open_stream(
        &self,
        _target: &TargetIdentity,
        _timeout: Duration,
    ) -> io::Result<DuplexStream> {
        std::future::pending().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AlreadyLoggedIn,
    AttemptFailed { attempt: usize, timed_out: bool },
    PermissionDenied,
    ConfigureFailed,
    LoggedIn { attempts: usize },
}

/// Sink keeping a summary of every event
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, event: &Diagnostic<'_>) {
        let event = match event {
            Diagnostic::AlreadyLoggedIn { .. } => Event::AlreadyLoggedIn,
            Diagnostic::AttemptFailed { attempt, error, .. } => Event::AttemptFailed {
                attempt: *attempt,
                timed_out: matches!(error, ExpectError::Timeout { .. }),
            },
            Diagnostic::PermissionDenied { .. } => Event::PermissionDenied,
            Diagnostic::ConfigureFailed { .. } => Event::ConfigureFailed,
            Diagnostic::LoggedIn { attempts, .. } => Event::LoggedIn {
                attempts: *attempts,
            },
        };
        self.events.lock().unwrap().push(event);
    }
}

enum VmState {
    Login,
    Password { user: String },
    Shell { root: bool, status: i32 },
}

enum Output {
    Text(String),
    Pause(Duration),
}

/// A Fedora guest's serial console: getty, login(1) and bash, as far as the
/// login flow can tell.
#[derive(Clone)]
pub struct FakeVm {
    hostname: String,
    username: String,
    password: String,
    logged_in: bool,
    silent: bool,
    boot_delay: Duration,
    failing_command: Option<String>,
}

impl Default for FakeVm {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVm {
    pub fn new() -> Self {
        Self {
            hostname: "localhost".into(),
            username: "fedora".into(),
            password: "fedora".into(),
            logged_in: false,
            silent: false,
            boot_delay: Duration::ZERO,
            failing_command: None,
        }
    }

    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.into();
        self
    }

    /// Start at a user shell prompt
    pub fn logged_in(mut self) -> Self {
        self.logged_in = true;
        self
    }

    /// Read everything, answer nothing
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Ignore input until `delay` has passed
    pub fn boot_delay(mut self, delay: Duration) -> Self {
        self.boot_delay = delay;
        self
    }

    /// Commands starting with `prefix` exit with status 1
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing_command = Some(prefix.into());
        self
    }

    /// Start the console; returns the client end and a handle on the guest.
    pub fn start(self) -> (CountingStream, Console) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (stream, shutdowns) = CountingStream::new(client);
        let received = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(self.run(server, received.clone()));

        (
            stream,
            Console {
                received,
                shutdowns,
                task,
            },
        )
    }

    async fn run(self, mut io: DuplexStream, received: Arc<Mutex<Vec<String>>>) {
        let booted_at = Instant::now() + self.boot_delay;
        let mut state = if self.logged_in {
            VmState::Shell {
                root: false,
                status: 0,
            }
        } else {
            VmState::Login
        };
        let mut pending = Vec::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = match io.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            pending.extend_from_slice(&buf[..n]);

            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw[..pos])
                    .trim_end_matches('\r')
                    .to_string();
                received.lock().unwrap().push(line.clone());

                if self.silent || Instant::now() < booted_at {
                    continue;
                }

                for output in self.step(&mut state, &line) {
                    match output {
                        Output::Text(text) => {
                            if io.write_all(text.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        Output::Pause(delay) => tokio::time::sleep(delay).await,
                    }
                }
            }
        }
    }

    fn banner(&self) -> Output {
        Output::Text(format!("\r\n{} login: ", self.hostname))
    }

    fn prompt(&self, root: bool) -> String {
        if root {
            format!("[root@{} {}]# ", self.hostname, self.username)
        } else {
            format!("[{}@{} ~]$ ", self.username, self.hostname)
        }
    }

    fn step(&self, state: &mut VmState, line: &str) -> Vec<Output> {
        match state {
            VmState::Login if line.is_empty() => vec![self.banner()],
            VmState::Login => {
                let output = vec![Output::Text(format!("{line}\r\nPassword: "))];
                *state = VmState::Password { user: line.into() };
                output
            }
            VmState::Password { user } => {
                if *user == self.username && line == self.password {
                    *state = VmState::Shell {
                        root: false,
                        status: 0,
                    };
                    vec![Output::Text(format!("\r\n{}", self.prompt(false)))]
                } else {
                    *state = VmState::Login;
                    vec![
                        Output::Text("\r\nLogin incorrect\r\n".into()),
                        Output::Pause(RELOGIN_DELAY),
                        self.banner(),
                    ]
                }
            }
            VmState::Shell { root, status } => {
                let mut text = format!("{line}\r\n");

                let fails = self
                    .failing_command
                    .as_deref()
                    .is_some_and(|prefix| line.starts_with(prefix));

                match line {
                    "" => {}
                    "echo $?" => {
                        text.push_str(&format!("{status}\r\n"));
                        *status = 0;
                    }
                    _ if fails => {
                        text.push_str(&format!("{line}: Operation not permitted\r\n"));
                        *status = 1;
                    }
                    "sudo su" => {
                        *root = true;
                        *status = 0;
                    }
                    _ if line.starts_with("stty ") || line.starts_with("dmesg ") => *status = 0,
                    _ => {
                        let command = line.split_whitespace().next().unwrap_or_default();
                        text.push_str(&format!("bash: {command}: command not found\r\n"));
                        *status = 127;
                    }
                }

                text.push_str(&self.prompt(*root));
                vec![Output::Text(text)]
            }
        }
    }
}

/// Handle on a running fake guest
pub struct Console {
    received: Arc<Mutex<Vec<String>>>,
    shutdowns: Arc<AtomicUsize>,
    pub task: JoinHandle<()>,
}

impl Console {
    /// Lines typed at the console so far
    pub fn lines(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// How often `line` was typed
    pub fn typed(&self, line: &str) -> usize {
        self.lines().iter().filter(|l| l.as_str() == line).count()
    }

    /// Shutdown calls seen on the client end
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}
