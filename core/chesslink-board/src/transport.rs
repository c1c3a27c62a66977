//! Framed transport over a duplex byte stream.
//!
//! Writers serialize through a single lock so each frame reaches the wire as
//! one unbroken write. The write itself runs on a detached task, so a caller
//! that is dropped mid-send never leaves half a frame on the wire. Reads
//! happen on a single consumer that takes ownership of the read half.

use crate::error::{BoardError, BoardResult};
use crate::frame::{write_frame, Frame, FrameReader};
use crate::protocol::{ClientToServerMessage, ServerToClientMessage};
use async_trait::async_trait;
use chesslink_types::BoardDevice;
use futures::stream::{self, BoxStream, StreamExt};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::debug;

/// A byte stream to the board (RFCOMM socket, TCP bridge, in-memory pipe).
pub trait BoardStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> BoardStream for T {}

/// Opens transport-level connections to a board.
#[async_trait]
pub trait BoardConnector: Send + Sync {
    /// Connects to the given device.
    async fn connect(&self, device: &BoardDevice) -> io::Result<Box<dyn BoardStream>>;
}

/// Connects to boards exposed as `host:port` (serial bridges, emulators).
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

#[async_trait]
impl BoardConnector for TcpConnector {
    async fn connect(&self, device: &BoardDevice) -> io::Result<Box<dyn BoardStream>> {
        let stream = tokio::net::TcpStream::connect(device.address.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

type BoxedStream = Box<dyn BoardStream>;
type SharedWriter = Arc<Mutex<Option<WriteHalf<BoxedStream>>>>;

/// A live framed connection to the board.
pub struct FramedTransport {
    writer: SharedWriter,
    reader: std::sync::Mutex<Option<FrameReader<ReadHalf<BoxedStream>>>>,
}

impl std::fmt::Debug for FramedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport").finish_non_exhaustive()
    }
}

impl FramedTransport {
    /// Wraps an established stream.
    pub fn new<S: BoardStream>(stream: S) -> Self {
        let boxed: BoxedStream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        Self {
            writer: Arc::new(Mutex::new(Some(write_half))),
            reader: std::sync::Mutex::new(Some(FrameReader::new(read_half))),
        }
    }

    /// Sends one message to the board.
    pub async fn send(&self, message: &ClientToServerMessage) -> BoardResult<()> {
        self.send_frame(&message.to_frame()).await
    }

    /// Sends one raw frame while holding the writer lock.
    ///
    /// Once started, the write runs to completion even if this future is
    /// dropped.
    pub async fn send_frame(&self, frame: &Frame) -> BoardResult<()> {
        let writer = Arc::clone(&self.writer);
        let frame = frame.clone();
        let write = tokio::spawn(async move {
            let mut guard = writer.lock_owned().await;
            let writer = guard.as_mut().ok_or(BoardError::NotConnected)?;
            write_frame(writer, &frame).await?;
            debug!(action = frame.action, len = frame.body.len(), "frame sent");
            Ok::<_, BoardError>(())
        });
        write.await.map_err(|e| BoardError::Io(io::Error::other(e)))?
    }

    /// Takes the inbound message stream.
    ///
    /// The stream is lazy and ends when the board closes the connection or
    /// after the first error. It can be taken only once.
    pub fn receive(&self) -> BoardResult<BoxStream<'static, BoardResult<ServerToClientMessage>>> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| BoardError::NotConnected)?
            .take()
            .ok_or(BoardError::NotConnected)?;

        let incoming = stream::unfold(Some(reader), |state| async move {
            let mut reader = state?;
            match reader.next_frame().await {
                Ok(Some(frame)) => match ServerToClientMessage::from_frame(frame) {
                    Ok(message) => Some((Ok(message), Some(reader))),
                    Err(e) => Some((Err(e), None)),
                },
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });

        Ok(incoming.boxed())
    }

    /// Shuts down the write half. Later sends fail with `NotConnected`.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}
