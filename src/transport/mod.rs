//! Console transports
//!
//! A transport turns a [`TargetIdentity`] into a duplex byte stream bound to
//! that target's console. The session engine only needs the stream; how it is
//! obtained (a websocket to a VM's serial port, a local PTY running a console
//! client, an in-memory pipe in tests) is up to the implementation.

mod pty;

pub use pty::{PtyStream, PtyTransport};

use crate::config::TargetIdentity;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Source of console streams.
///
/// `open_stream` should honour `timeout` itself when it can; the session
/// builder additionally bounds the whole call by the same budget.
pub trait Transport: Send + Sync {
    /// Duplex stream connected to the console.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a stream to the console of `target`.
    fn open_stream(
        &self,
        target: &TargetIdentity,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}
