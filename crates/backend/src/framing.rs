// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket framing shared by the udp and tcp backends.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON envelope. Payload
//! bodies are already JSON, so they ride along verbatim as a raw value.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use em_rpc::Status;

/// Refuse to allocate frames beyond this; nothing the runtime carries is
/// legitimately this large.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame length {0} exceeds limit")]
    TooLarge(usize),

    #[error("payload is not valid JSON text: {0}")]
    Payload(String),

    #[error("encode failure: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("decode failure: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that travels between two em processes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// One published message.
    Channel {
        topic: String,
        type_name: String,
        payload: Box<RawValue>,
    },
    /// An RPC request; `id` correlates the response on the same stream.
    Request {
        id: u64,
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        payload: Box<RawValue>,
    },
    /// The reply to `Request { id }`.
    Response {
        id: u64,
        status: Status,
        payload: Box<RawValue>,
    },
}

/// Wrap serialized message bytes as a raw JSON value.
pub fn raw_payload(bytes: &[u8]) -> Result<Box<RawValue>, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|err| ProtocolError::Payload(err.to_string()))?;
    RawValue::from_string(text.to_owned()).map_err(|err| ProtocolError::Payload(err.to_string()))
}

/// JSON-encode a frame, without the length prefix.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(frame).map_err(ProtocolError::Encode)
}

/// Decode a frame from prefix-stripped bytes.
pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
}

/// Write one frame with its length prefix.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), ProtocolError> {
    let body = encode(frame)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge(body.len()));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` is a clean EOF at a frame boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Frame>, ProtocolError> {
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(decode(&body)?))
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
