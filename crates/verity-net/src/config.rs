//! Server and client configuration.
//!
//! Both are plain serde structs. Every field has a default, so a config file
//! only needs to name what it changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use verity_engine::prelude::*;

use crate::NetError;

/// A question/answer dialog bound to an NPC id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogScript {
    pub greeting: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// JSON level definition served to every match.
    pub level_path: PathBuf,
    /// Reported alongside the inventory.
    pub round: i64,
    /// How long a fresh connection may take to send its first frame.
    pub handshake_timeout_ms: u64,
    /// Deadline for every read and write after the handshake.
    pub io_timeout_ms: u64,
    /// Dialogs served for the level's NPCs, keyed by NPC id.
    pub dialogs: BTreeMap<String, DialogScript>,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            level_path: PathBuf::from("level.json"),
            round: 0,
            handshake_timeout_ms: 5_000,
            io_timeout_ms: 5_000,
            dialogs: BTreeMap::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| NetError::File {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| NetError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and parses the level named by `level_path`.
    pub fn load_level(&self) -> Result<LevelDef, NetError> {
        let json = std::fs::read_to_string(&self.level_path).map_err(|source| NetError::File {
            path: self.level_path.clone(),
            source,
        })?;
        LevelDef::from_json(&json).map_err(|err| NetError::Engine(err.into()))
    }

    /// Sub-game registry built from the configured dialogs.
    pub fn registry(&self) -> Registry {
        self.dialogs.iter().fold(Registry::new(), |registry, (id, script)| {
            let script = script.clone();
            registry.with(SubGameKind::Dialog, id.clone(), move || {
                ScriptedDialog::new(script.greeting.clone(), script.answer.clone())
            })
        })
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long to wait for the start snapshot after joining.
    pub handshake_timeout_ms: u64,
    pub io_timeout_ms: u64,
    /// Server frames buffered between the reader task and the tick loop.
    pub event_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5_000,
            io_timeout_ms: 5_000,
            event_queue: 64,
        }
    }
}

impl ClientConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}
