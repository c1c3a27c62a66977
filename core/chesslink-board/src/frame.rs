//! Length-prefixed, action-tagged frames.
//!
//! Wire layout: one action byte, a 4-byte big-endian body length, then the
//! body. Frames carry no delimiter, so a short read anywhere inside a frame
//! leaves the stream unrecoverable.

use crate::error::{BoardError, BoardResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Header size: action byte + length.
pub const HEADER_LEN: usize = 5;

/// Largest body accepted in either direction (4 MiB).
pub const MAX_FRAME_BODY: usize = 4 * 1024 * 1024;

/// One frame as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub action: u8,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(action: u8, body: impl Into<Vec<u8>>) -> Self {
        Self {
            action,
            body: body.into(),
        }
    }

    /// Encodes `action || length || body` into a single buffer.
    pub fn encode(&self) -> BoardResult<Vec<u8>> {
        if self.body.len() > MAX_FRAME_BODY {
            return Err(BoardError::Protocol(format!(
                "frame body too large: {} bytes",
                self.body.len()
            )));
        }

        let mut buf = Vec::with_capacity(HEADER_LEN + self.body.len());
        buf.push(self.action);
        buf.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }
}

/// Writes one frame with a single `write_all`, then flushes.
pub async fn write_frame<W: AsyncWrite + Unpin>(io: &mut W, frame: &Frame) -> BoardResult<()> {
    let data = frame.encode()?;
    io.write_all(&data).await?;
    io.flush().await?;
    Ok(())
}

/// Reads frames from a byte stream.
///
/// The body buffer grows to fit the largest frame seen so far and is never
/// shrunk.
#[derive(Debug)]
pub struct FrameReader<R> {
    io: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(io: R) -> Self {
        Self {
            io,
            buf: Vec::new(),
        }
    }

    /// Current size of the body buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.buf.len()
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly on a frame boundary.
    pub async fn next_frame(&mut self) -> BoardResult<Option<Frame>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self.io.read(&mut header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(BoardError::Protocol(format!(
                    "stream closed after {filled} of {HEADER_LEN} header bytes"
                )));
            }
            filled += n;
        }

        let action = header[0];
        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if len > MAX_FRAME_BODY {
            return Err(BoardError::Protocol(format!(
                "declared frame length {len} exceeds {MAX_FRAME_BODY}"
            )));
        }

        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }

        match self.io.read_exact(&mut self.buf[..len]).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(BoardError::Protocol(format!(
                    "stream closed inside a {len}-byte frame body"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(Frame {
            action,
            body: self.buf[..len].to_vec(),
        }))
    }
}
