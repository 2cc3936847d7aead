//! Verity Engine -- deterministic platformer simulation with checksummed state.
//!
//! This crate builds on [`verity_world`] to provide the tick simulator that
//! both sides of an authoritative-replay session run. The [`Engine`] consumes
//! one [`InputSample`](input::InputSample) per tick and advances the world in
//! a fixed order; [`Engine::checksum`] hashes everything that order can touch
//! so a server can prove that a client computed the same result.
//!
//! # Quick Start
//!
//! ```
//! use verity_engine::prelude::*;
//!
//! let level = LevelDef::new("demo", 32.0, 32.0, 8, 2)
//!     .with_layer(TileLayer::empty("ground", 8, 2, true).with_tile(8, 0, 1, 1))
//!     .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0));
//!
//! let config = EngineConfig::default();
//! let mut client = Engine::new(config.clone(), &level, &RemoteProvider).unwrap();
//! let mut server = Engine::new(config, &level, &RemoteProvider).unwrap();
//!
//! let input = InputSample::held([Key::D]);
//! client.update(&input).unwrap();
//! server.update(&input).unwrap();
//!
//! let claimed = client.checksum().unwrap();
//! assert!(server.validate_checksum(&claimed).is_ok());
//! ```

#![deny(unsafe_code)]

pub mod boss;
pub mod checksum;
pub mod collisions;
pub mod config;
pub mod engine;
pub mod input;
pub mod level;
pub mod player;
pub mod replay;
pub mod snapshot;
pub mod subgame;
mod tick;

pub use engine::Engine;

/// Re-export the world crate for convenience.
pub use verity_world;

use snapshot::PersistenceError;
use subgame::{SubGameError, SubGameKind};
use verity_world::WorldError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Content errors found while building a level. Raised before any tick runs.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("failed to parse level definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("level '{level}' has no player_spawn object")]
    NoPlayerSpawn { level: String },

    #[error("layer '{layer}' has {actual} tiles, expected {expected}")]
    LayerSize {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("property '{property}' of object '{object}' must be a {expected}")]
    BadProperty {
        object: String,
        property: String,
        expected: &'static str,
    },

    #[error("object '{object}' has an invalid path")]
    Path {
        object: String,
        #[source]
        source: WorldError,
    },

    #[error("item '{item}' not found for {kind} '{owner}'")]
    MissingItem {
        item: String,
        kind: SubGameKind,
        owner: String,
    },

    #[error("destination '{destination}' not found for portal '{portal}'")]
    MissingPortalDestination { portal: String, destination: String },

    #[error("sub-game '{id}' unavailable")]
    SubGame {
        id: String,
        #[source]
        source: SubGameError,
    },

    #[error("boss arena is incomplete: no {missing}")]
    IncompleteBossArena { missing: &'static str },

    #[error("unknown boss variant '{0}', expected v1 or v2")]
    UnknownBossVariant(String),
}

/// Errors surfaced by [`Engine`] operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Level(#[from] LevelError),

    #[error("failed to serialize state for checksum")]
    Checksum(#[source] serde_json::Error),

    #[error("checksum mismatch: computed {expected}, claimed {claimed}")]
    ChecksumMismatch { expected: String, claimed: String },

    #[error("sub-game '{id}' failed")]
    SubGame {
        id: String,
        #[source]
        source: SubGameError,
    },

    /// The tick itself completed; only the snapshot write failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl EngineError {
    /// Whether the tick that produced this error still completed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Persistence(_))
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use verity_world::prelude::*;

    pub use crate::boss::{Boss, BossEntity, BossV1, BossV2, HealthState, TickResult, TickState};
    pub use crate::checksum::ChecksumState;
    pub use crate::collisions::EntityRef;
    pub use crate::config::{EngineConfig, PhysicsConfig, Rules};
    pub use crate::engine::{ActiveInteraction, Notification};
    pub use crate::input::{InputSample, Key};
    pub use crate::level::{LevelDef, ObjectDef, TileLayer};
    pub use crate::player::{GroundRef, Inventory, Player};
    pub use crate::replay::{replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult};
    pub use crate::snapshot::{ItemRecord, PersistenceError, Snapshot, SnapshotStore};
    pub use crate::subgame::{
        Outcome, Registry, RemoteProvider, ScriptedDialog, SubGame, SubGameError, SubGameKind,
        SubGameProvider, SubGameState,
    };
    pub use crate::{Engine, EngineError, LevelError};
}

#[cfg(test)]
pub(crate) mod fixtures;
