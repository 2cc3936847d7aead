//! Verity Net -- the checksum validation protocol over TCP.
//!
//! A [`GameServer`](server::GameServer) owns the authoritative copy of one
//! match. A [`Client`](client::Client) runs its own copy, and after every
//! local tick it sends the input it applied together with the checksum of the
//! resulting state. The server replays the input on its copy and compares
//! checksums. The first mismatch ends the session and marks the match as
//! cheated.
//!
//! Frames are newline-delimited JSON documents (see [`protocol`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use verity_net::prelude::*;
//! use verity_engine::prelude::*;
//!
//! # async fn run(level: LevelDef) -> Result<(), NetError> {
//! let config = ServerConfig::default();
//! let server = Arc::new(GameServer::with_level(config, level, Registry::new()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! server.serve(listener, shutdown).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;

use std::path::PathBuf;

use tokio::sync::watch;
use verity_engine::EngineError;

use protocol::ErrorKind;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by either side of a session.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode frame")]
    Encode(#[source] serde_json::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("connection closed by peer")]
    Closed,

    /// The peer ended the session with an error frame.
    #[error("{kind}: {message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl NetError {
    /// The error kind reported to the peer for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::Protocol(_) => ErrorKind::ProtocolViolation,
            NetError::Engine(EngineError::ChecksumMismatch { .. }) => ErrorKind::ChecksumMismatch,
            NetError::Rejected { kind, .. } => *kind,
            _ => ErrorKind::Internal,
        }
    }
}

/// Resolves once `shutdown` carries `true` or its sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::client::{inventory, ping, Client, ClientEngineFactory};
    pub use crate::config::{ClientConfig, DialogScript, ServerConfig};
    pub use crate::protocol::{ClientMessage, ErrorKind, FrameReader, FrameWriter, ServerMessage, SessionOutcome};
    pub use crate::server::{EngineFactory, GameServer, GameStatus};
    pub use crate::NetError;
}
