//! State checksums.
//!
//! The checksum covers everything a tick can change that influences later
//! ticks. Presentation state (animation, camera, notifications, background
//! images) and the internal state of sub-games are left out: the former is
//! never simulated, the latter is owned by the server and pushed to clients
//! after each tick.

use serde::Serialize;
use verity_world::prelude::*;

use crate::boss::BossEntity;
use crate::engine::ActiveInteraction;
use crate::player::Player;
use crate::subgame::Trigger;
use crate::{Engine, EngineError};

/// Borrowed view of the checksummed state, serialized to canonical JSON.
#[derive(Debug, Serialize)]
pub struct ChecksumState<'a> {
    pub level: &'a str,
    /// Digest of the static tiles.
    pub level_digest: &'a str,
    pub tick: u64,
    pub paused: bool,
    pub is_win: bool,
    pub boss_entered: bool,
    pub player: &'a Player,
    pub items: &'a [Item],
    pub portals: &'a [Portal],
    pub spikes: &'a [Spike],
    pub platforms: &'a [Platform],
    pub npcs: &'a [Trigger],
    pub arcades: &'a [Trigger],
    pub slots: &'a [SlotMachine],
    pub enemy_bullets: &'a [Bullet],
    pub boss: Option<&'a BossEntity>,
    pub active: Option<ActiveInteraction>,
}

impl Engine {
    /// The view hashed by [`Engine::checksum`].
    pub fn checksum_state(&self) -> ChecksumState<'_> {
        ChecksumState {
            level: &self.config.level,
            level_digest: &self.level_digest,
            tick: self.tick,
            paused: self.paused,
            is_win: self.is_win,
            boss_entered: self.boss_entered,
            player: &self.player,
            items: &self.items,
            portals: &self.portals,
            spikes: &self.spikes,
            platforms: &self.platforms,
            npcs: &self.npcs,
            arcades: &self.arcades,
            slots: &self.slots,
            enemy_bullets: &self.enemy_bullets,
            boss: self.boss.as_ref(),
            active: self.active,
        }
    }

    /// Hex-encoded BLAKE3 hash of the current [`ChecksumState`].
    pub fn checksum(&self) -> Result<String, EngineError> {
        let json = serde_json::to_vec(&self.checksum_state()).map_err(EngineError::Checksum)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    /// Recomputes the checksum and compares it with `claimed`.
    pub fn validate_checksum(&self, claimed: &str) -> Result<(), EngineError> {
        let expected = self.checksum()?;
        if expected != claimed {
            return Err(EngineError::ChecksumMismatch {
                expected,
                claimed: claimed.to_string(),
            });
        }
        Ok(())
    }
}
