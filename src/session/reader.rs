//! Background reader draining the console's output side

use bytes::Bytes;
use log::debug;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Number of chunks that may queue up before the reader waits
const CHANNEL_CAPACITY: usize = 64;

/// Size of a single read
const READ_CHUNK: usize = 4096;

/// Spawn a task that forwards every chunk read from `reader` into a channel.
///
/// End of stream closes the channel; a read error is forwarded once and then
/// closes it. The task also stops when the receiver is dropped.
pub fn spawn_reader<R>(mut reader: R) -> (mpsc::Receiver<io::Result<Bytes>>, JoinHandle<()>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("Console stream reached EOF");
                    break;
                }
                Ok(n) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
    });

    (rx, handle)
}
