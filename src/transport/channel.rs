//! Message channel: ordered delivery of whole messages in both directions.
//!
//! A [`Channel`] is either backed by a byte stream (reader task + writer
//! task around a [`FrameBuffer`]) or by an in-memory pair of queues.
//!
//! # Example
//!
//! ```
//! use beatwire::transport::Channel;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> beatwire::Result<()> {
//! let (client, mut peer) = Channel::pair();
//! client.send("beat").await?;
//! assert_eq!(peer.recv().await.unwrap().text(), "beat");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{BeatwireError, Result};
use crate::protocol::{FrameBuffer, Message};
use crate::writer::{spawn_writer_task, DEFAULT_CHANNEL_CAPACITY};

/// How long `close()` waits for queued messages to be flushed.
pub const DEFAULT_LINGER: Duration = Duration::from_secs(5);

/// Read buffer size for stream-backed channels.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Background tasks of a stream-backed channel.
struct IoTasks {
    reader: JoinHandle<Result<()>>,
    writer: JoinHandle<Result<()>>,
}

/// A bidirectional, ordered channel of whole messages.
pub struct Channel {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    tasks: Option<IoTasks>,
}

impl Channel {
    /// Create two connected in-memory channels.
    pub fn pair() -> (Channel, Channel) {
        Self::pair_with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create two connected in-memory channels with the given queue capacity.
    pub fn pair_with_capacity(capacity: usize) -> (Channel, Channel) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);

        (
            Channel {
                tx: a_tx,
                rx: a_rx,
                tasks: None,
            },
            Channel {
                tx: b_tx,
                rx: b_rx,
                tasks: None,
            },
        )
    }

    /// Wrap a byte stream, framing messages with part headers.
    pub fn from_stream<S>(stream: S) -> Channel
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_split(reader, writer)
    }

    /// Wrap the two halves of a byte stream.
    pub fn from_split<R, W>(reader: R, writer: W) -> Channel
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, writer_task) = spawn_writer_task(writer, DEFAULT_CHANNEL_CAPACITY);
        let (inbound_tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let reader_task = tokio::spawn(async move {
            let result = read_loop(reader, inbound_tx).await;
            if let Err(e) = &result {
                tracing::error!("Read loop error: {}", e);
            }
            result
        });

        Channel {
            tx,
            rx,
            tasks: Some(IoTasks {
                reader: reader_task,
                writer: writer_task,
            }),
        }
    }

    /// Queue a message for sending.
    ///
    /// # Errors
    ///
    /// - `Protocol` if the message is over the part size or count limits;
    ///   nothing is queued
    /// - `ConnectionClosed` if the other side or the writer is gone
    pub async fn send(&self, message: impl Into<Message>) -> Result<()> {
        let message = message.into();
        message.validate()?;

        self.tx
            .send(message)
            .await
            .map_err(|_| BeatwireError::ConnectionClosed)
    }

    /// Receive the next whole message.
    ///
    /// Returns `None` once the channel is closed. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Close the channel.
    ///
    /// Messages already queued are flushed for up to [`DEFAULT_LINGER`].
    pub async fn close(self) -> Result<()> {
        self.close_with_linger(DEFAULT_LINGER).await
    }

    /// Close the channel, waiting at most `linger` for queued messages.
    pub async fn close_with_linger(self, linger: Duration) -> Result<()> {
        let Channel { tx, rx, tasks } = self;
        drop(tx);
        drop(rx);

        let Some(IoTasks { reader, mut writer }) = tasks else {
            return Ok(());
        };
        reader.abort();

        match tokio::time::timeout(linger, &mut writer).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(BeatwireError::Task(e)),
            Err(_) => {
                tracing::warn!("Dropping unsent messages after {:?} linger", linger);
                writer.abort();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("stream", &self.tasks.is_some())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Read bytes, assemble messages, forward them to the receiving side.
async fn read_loop<R>(mut reader: R, inbound: mpsc::Sender<Message>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(BeatwireError::Io(e)),
        };

        for message in frames.push(&buf[..n])? {
            if inbound.send(message).await.is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_pair_is_bidirectional() {
        let (mut a, mut b) = Channel::pair();

        a.send("beat").await.unwrap();
        assert_eq!(b.recv().await.unwrap().text(), "beat");

        b.send("beat:::ok").await.unwrap();
        assert_eq!(a.recv().await.unwrap().text(), "beat:::ok");
    }

    #[tokio::test]
    async fn test_oversized_message_not_queued() {
        let (a, mut b) = Channel::pair();
        let oversized = vec![b'x'; crate::protocol::DEFAULT_MAX_PART_SIZE as usize + 1];

        let result = a.send(Message::from_parts([b"beat".to_vec(), oversized])).await;
        assert!(matches!(result, Err(BeatwireError::Protocol(_))));

        a.send("beat").await.unwrap();
        assert_eq!(b.recv().await.unwrap().text(), "beat");
    }

    #[tokio::test]
    async fn test_pair_close_ends_peer() {
        let (a, mut b) = Channel::pair();
        a.close().await.unwrap();

        assert!(b.recv().await.is_none());
        assert!(matches!(
            b.send("beat").await,
            Err(BeatwireError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_stream_channel_preserves_parts() {
        let (left, right) = duplex(4096);
        let a = Channel::from_stream(left);
        let mut b = Channel::from_stream(right);

        a.send(Message::from_parts(["beat", "echo", "Hello"]))
            .await
            .unwrap();

        let msg = b.recv().await.unwrap();
        assert_eq!(msg.len(), 3);
        assert_eq!(msg.part_str(2), Some("Hello"));
    }

    #[tokio::test]
    async fn test_stream_close_flushes_queued_messages() {
        let (left, right) = duplex(4096);
        let a = Channel::from_stream(left);
        let mut b = Channel::from_stream(right);

        a.send("STOP").await.unwrap();
        a.close().await.unwrap();

        assert_eq!(b.recv().await.unwrap().text(), "STOP");
        assert!(b.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_protocol_error_closes_receiver() {
        let (left, right) = duplex(4096);
        let mut b = Channel::from_stream(right);

        let mut raw = left;
        tokio::io::AsyncWriteExt::write_all(&mut raw, &[0xff, 0, 0, 0, 1, b'x'])
            .await
            .unwrap();

        assert!(b.recv().await.is_none());
    }
}
