//! Engine configuration.
//!
//! Configuration is resolved once, before the engine is built, and handed to
//! [`Engine::new`](crate::Engine::new). Nothing in the simulation reads the
//! environment or global toggles mid-tick.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use verity_world::physics::GRAVITY_ACCELERATION;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Level name, used for snapshot file names and the checksum.
    pub level: String,
    /// Directory for persisted snapshots. `None` disables persistence.
    pub snapshots_dir: Option<PathBuf>,
    /// Camera viewport size.
    pub view_width: f64,
    pub view_height: f64,
    /// How long on-screen notifications last.
    pub notification_ticks: u64,
    pub physics: PhysicsConfig,
    pub rules: Rules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level: "level".to_string(),
            snapshots_dir: None,
            view_width: 1280.0,
            view_height: 720.0,
            notification_ticks: 120,
            physics: PhysicsConfig::default(),
            rules: Rules::default(),
        }
    }
}

/// Movement tuning. Both peers must agree on every value here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Horizontal speed while A or D is held.
    pub run_speed: f64,
    /// Upward speed of a jump.
    pub jump_speed: f64,
    /// Downward acceleration while airborne.
    pub gravity: f64,
    /// Ticks a jump is still accepted after walking off a ledge.
    pub coyote_ticks: u64,
    /// How far below the player the ground probe reaches.
    pub ground_probe: f64,
    /// Only the most recent enemy bullets are kept.
    pub max_enemy_bullets: usize,
    /// Reach of the interact key around the player.
    pub interact_radius: f64,
    /// Horizontal offset at which the player leaves a destination portal.
    pub portal_exit_offset: f64,
    /// An arcade game receives input on every n-th tick.
    pub arcade_feed_interval: u64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            run_speed: 5.0,
            jump_speed: 10.0,
            gravity: GRAVITY_ACCELERATION,
            coyote_ticks: 6,
            ground_probe: 1e-12,
            max_enemy_bullets: 1000,
            interact_radius: 40.0,
            portal_exit_offset: 32.0,
            arcade_feed_interval: 5,
        }
    }
}

/// Gameplay rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// When false, spikes and boss bullets deal no damage.
    pub hazards_enabled: bool,
    /// Damage per tick of spike overlap, unless a level overrides it.
    pub spike_damage: i32,
    /// Health on spawn and after a restart.
    pub player_health: i32,
}

impl Rules {
    /// `damage`, or zero when hazards are disabled.
    pub fn hazard(&self, damage: i32) -> i32 {
        if self.hazards_enabled {
            damage
        } else {
            0
        }
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            hazards_enabled: true,
            spike_damage: 100,
            player_health: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"level": "caves", "rules": {"hazards_enabled": false}}"#)
                .unwrap();
        assert_eq!(config.level, "caves");
        assert_eq!(config.physics, PhysicsConfig::default());
        assert!(!config.rules.hazards_enabled);
        assert_eq!(config.rules.spike_damage, 100);
        assert_eq!(config.rules.hazard(100), 0);
    }
}
