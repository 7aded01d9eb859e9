// ABOUTME: Async framing of whole BSON root documents over tokio byte streams.
// ABOUTME: Frames are split on the int32 length prefix; decoding stays synchronous.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::decoder::DecoderConfig;
use crate::error::{Error, Result};
use crate::value::Bson;

/// Default upper bound on a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Smallest possible document: length prefix plus terminator.
const MIN_FRAME_LEN: usize = 5;

/// Reads length-prefixed BSON documents from an `AsyncRead` stream.
///
/// Each frame is returned whole, length prefix included, ready for
/// [`decode_bson`](crate::decode_bson) or a [`Decoder`](crate::Decoder).
///
/// The only await points are the reads that fill a frame. Nothing is decoded
/// until the whole frame has arrived, so up to `max_frame_len` bytes are held
/// in memory per document and the token-level decoder never suspends.
/// A future returned by [`read_frame`](Self::read_frame) that is dropped
/// before completion may leave a partial frame consumed; the reader must
/// then be discarded.
pub struct AsyncFrameReader<R> {
    reader: R,
    offset: u64,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> AsyncFrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Limit the size of a single frame.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Absolute stream offset of the next frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next complete frame. Returns `None` when the stream ends
    /// cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<BytesMut>> {
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            let n = self.reader.read(&mut header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::UnexpectedEof {
                    offset: self.offset + filled as u64,
                });
            }
            filled += n;
        }

        let length = i32::from_le_bytes(header);
        let frame_len = usize::try_from(length).unwrap_or(0);
        if frame_len < MIN_FRAME_LEN || frame_len > self.max_frame_len {
            return Err(Error::InvalidLength {
                what: "document",
                length: i64::from(length),
                offset: self.offset,
            });
        }

        let mut frame = BytesMut::with_capacity(frame_len);
        frame.extend_from_slice(&header);
        frame.resize(frame_len, 0);
        let mut read = header.len();
        while read < frame_len {
            let n = self.reader.read(&mut frame[read..]).await?;
            if n == 0 {
                return Err(Error::UnexpectedEof {
                    offset: self.offset + read as u64,
                });
            }
            read += n;
        }

        let declared = self.offset + frame_len as u64;
        if frame[frame_len - 1] != 0 {
            return Err(Error::FrameLengthMismatch {
                declared,
                actual: declared - 1,
            });
        }
        tracing::trace!(offset = self.offset, length = frame_len, "read BSON frame");
        self.offset = declared;
        Ok(Some(frame))
    }

    /// Read and decode the next frame.
    pub async fn read_document(&mut self, config: DecoderConfig) -> Result<Option<Bson>> {
        match self.read_frame().await? {
            Some(frame) => crate::decode_bson_with_config(&frame, config).map(Some),
            None => Ok(None),
        }
    }
}

/// Write one encoded document and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode a [`Bson`] tree and write it as one frame.
pub async fn write_document<W: AsyncWrite + Unpin>(writer: &mut W, value: &Bson) -> Result<()> {
    let frame = crate::encode_bson(value)?;
    write_frame(writer, &frame).await
}
