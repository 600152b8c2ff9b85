//! Wire protocol I/O
//!
//! Reads and writes handshakes and length-prefixed frames on any async
//! byte stream.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, trace};

use super::handshake::{Handshake, HANDSHAKE_LEN};
use super::message::Message;
use crate::error::{Result, TorrentError};

/// Largest frame body accepted from a peer, 2 MiB
pub const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// Read one length-prefixed message; a zero prefix yields [`Message::KeepAlive`]
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    let mut length_buf = [0u8; 4];
    reader
        .read_exact(&mut length_buf)
        .await
        .map_err(|e| frame_error(e, "length prefix"))?;
    let length = u32::from_be_bytes(length_buf) as usize;
    trace!("Frame length prefix: {}", length);

    if length == 0 {
        return Ok(Message::KeepAlive);
    }
    if length > MAX_FRAME_LEN {
        error!("Frame of {} bytes exceeds limit of {}", length, MAX_FRAME_LEN);
        return Err(TorrentError::protocol_error(format!(
            "frame of {} bytes exceeds limit of {}",
            length, MAX_FRAME_LEN
        )));
    }

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| frame_error(e, "frame body"))?;

    Message::from_frame(&body)
}

/// Write a message and flush
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Message) -> Result<()> {
    let serialized = message.serialize();
    trace!("Writing {} byte frame", serialized.len());
    writer.write_all(&serialized).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one 68-byte handshake
pub async fn read_handshake<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Handshake> {
    let mut buf = [0u8; HANDSHAKE_LEN];
    reader.read_exact(&mut buf).await.map_err(|e| {
        error!("Failed to read handshake: {}", e);
        if e.kind() == ErrorKind::UnexpectedEof {
            TorrentError::handshake_failed("connection closed before full handshake")
        } else {
            TorrentError::handshake_failed(e.to_string())
        }
    })?;
    Handshake::deserialize(&buf)
}

/// Write a handshake and flush
pub async fn write_handshake<W: AsyncWrite + Unpin>(writer: &mut W, handshake: &Handshake) -> Result<()> {
    let serialized = handshake.serialize();
    writer.write_all(&serialized).await.map_err(handshake_write_error)?;
    writer.flush().await.map_err(handshake_write_error)?;
    Ok(())
}

fn handshake_write_error(err: std::io::Error) -> TorrentError {
    error!("Failed to send handshake: {}", err);
    TorrentError::handshake_failed(err.to_string())
}

fn frame_error(err: std::io::Error, part: &str) -> TorrentError {
    if err.kind() == ErrorKind::UnexpectedEof {
        error!("Stream ended while reading {}", part);
        TorrentError::protocol_error(format!("stream ended while reading {}", part))
    } else {
        TorrentError::from(err)
    }
}
