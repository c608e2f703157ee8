//! Dedicated writer task for stream-backed channels.
//!
//! Messages are queued on an mpsc channel and written by a single task, so
//! the engine never waits on socket I/O while holding connection state.
//!
//! ```text
//! Engine ─► mpsc::Sender<Message> ─► Writer Task ─► Socket
//! ```
//!
//! Messages that are already queued when the task wakes are encoded into one
//! buffer and written with a single `write_all` + `flush`.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::protocol::Message;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum messages to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 16;

/// Spawn the writer task.
///
/// Returns the sender used to queue messages and the task handle. The task
/// ends cleanly once every sender is dropped and the queue is drained.
pub fn spawn_writer_task<W>(
    writer: W,
    capacity: usize,
) -> (mpsc::Sender<Message>, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (tx, task)
}

/// Main writer loop - receives messages and writes them to the socket.
async fn writer_loop<W>(mut rx: mpsc::Receiver<Message>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(4 * 1024);

    loop {
        let first = match rx.recv().await {
            Some(m) => m,
            None => {
                let _ = writer.shutdown().await;
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &mut buf, &batch).await?;
    }
}

/// Encode a batch of messages into `buf` and write it out.
async fn write_batch<W>(writer: &mut W, buf: &mut BytesMut, batch: &[Message]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    buf.clear();
    for message in batch {
        message.encode_into(buf);
    }

    writer.write_all(buf).await?;
    writer.flush().await?;
    Ok(())
}
