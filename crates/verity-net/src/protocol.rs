//! Wire messages and newline-delimited JSON framing.
//!
//! Every frame is one JSON object on its own line. Messages are tagged by a
//! `type` field:
//!
//! ```text
//! -> {"type":"join"}
//! <- {"type":"snapshot","snapshot":null}
//! -> {"type":"tick","input":{"pressed":["D"],"newly_pressed":["D"]},"checksum":"9f2c..."}
//! <- {"type":"error","kind":"checksum_mismatch","message":"..."}
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use verity_engine::prelude::*;

use crate::NetError;

/// Frames longer than this are rejected before parsing.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness probe. Does not claim the match.
    Ping,
    /// Collected items and the round number. Does not claim the match.
    Inventory,
    /// Claims the match. Answered with [`ServerMessage::Snapshot`].
    Join,
    /// One client tick: the input applied and the checksum of the state it
    /// produced.
    Tick { input: InputSample, checksum: String },
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Inventory {
        items: Vec<ItemRecord>,
        round: i64,
    },
    /// Start of a match. `None` means a fresh start.
    Snapshot { snapshot: Option<Snapshot> },
    /// Authoritative state of the focused sub-game after an accepted tick.
    SubGame { kind: SubGameKind, state: SubGameState },
    /// Sent right before the server closes the connection.
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Another client already holds the match.
    AlreadyConnected,
    ChecksumMismatch,
    ProtocolViolation,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::AlreadyConnected => "already connected",
            ErrorKind::ChecksumMismatch => "checksum mismatch",
            ErrorKind::ProtocolViolation => "protocol violation",
            ErrorKind::Internal => "internal error",
        })
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Won,
    Cheated,
    Disconnected,
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Reads one JSON document per line.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            line: String::new(),
        }
    }

    /// Next frame, or `None` once the peer has closed its side.
    ///
    /// Blank lines, oversized frames and documents that do not decode into
    /// `T` are protocol violations.
    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>, NetError> {
        self.line.clear();
        let limit = MAX_FRAME_BYTES as u64 + 1;
        let n = (&mut self.inner).take(limit).read_line(&mut self.line).await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_FRAME_BYTES {
            return Err(NetError::Protocol(format!("frame exceeds {MAX_FRAME_BYTES} bytes")));
        }
        let frame = self.line.trim();
        if frame.is_empty() {
            return Err(NetError::Protocol("empty frame".into()));
        }
        serde_json::from_str(frame)
            .map(Some)
            .map_err(|err| NetError::Protocol(format!("malformed frame: {err}")))
    }
}

/// Writes one JSON document per line and flushes after each.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), NetError> {
        let mut frame = serde_json::to_vec(message).map_err(NetError::Encode)?;
        frame.push(b'\n');
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Closes the write side.
    pub async fn shutdown(&mut self) -> Result<(), NetError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
