//! Small levels shared by the unit tests.

use crate::config::EngineConfig;
use crate::level::{LevelDef, ObjectDef, TileLayer};
use crate::subgame::{Registry, RemoteProvider, ScriptedDialog, SubGameKind};
use crate::Engine;

const WIDTH: usize = 32;

pub(crate) fn config() -> EngineConfig {
    EngineConfig {
        level: "fixture".to_string(),
        ..EngineConfig::default()
    }
}

fn spawn() -> ObjectDef {
    ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0)
}

fn floor(columns: usize) -> TileLayer {
    (0..columns).fold(TileLayer::empty("ground", WIDTH, 2, true), |layer, col| {
        layer.with_tile(WIDTH, col, 1, 1)
    })
}

/// Floor along row 1, spawn at the origin and one important "flag" item
/// 100 pixels to the right.
pub(crate) fn flat_level() -> LevelDef {
    LevelDef::new("fixture", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor(WIDTH))
        .with_object(spawn())
        .with_object(ObjectDef::new("item", "flag", 100.0, 0.0, 16.0, 16.0).with_property("important", true))
}

/// A single floor tile under the spawn.
pub(crate) fn ledge_level() -> LevelDef {
    LevelDef::new("fixture", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor(1))
        .with_object(spawn())
        .with_object(ObjectDef::new("item", "flag", 900.0, 0.0, 16.0, 16.0).with_property("important", true))
}

/// No floor; a horizontally moving platform carries the spawn.
pub(crate) fn platform_level() -> LevelDef {
    LevelDef::new("fixture", 32.0, 32.0, WIDTH, 2)
        .with_object(spawn())
        .with_object(
            ObjectDef::new("platform", "lift", 0.0, 32.0, 64.0, 8.0)
                .with_property("path", "horizontal")
                .with_property("distance", 128)
                .with_property("speed", 2),
        )
        .with_object(ObjectDef::new("item", "flag", 900.0, 0.0, 16.0, 16.0).with_property("important", true))
}

pub(crate) fn engine(level: &LevelDef) -> Engine {
    Engine::new(config(), level, &RemoteProvider).unwrap()
}

/// An NPC next to the spawn that hands over "gem" for the answer "yes".
pub(crate) fn dialog_engine() -> Engine {
    let level = LevelDef::new("fixture", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor(WIDTH))
        .with_object(spawn())
        .with_object(ObjectDef::new("item", "gem", 500.0, 0.0, 16.0, 16.0).with_property("important", true))
        .with_object(ObjectDef::new("npc", "sage", 40.0, 0.0, 32.0, 32.0).with_property("item", "gem"));
    let registry = Registry::new().with(SubGameKind::Dialog, "sage", || ScriptedDialog::new("Well?", "yes"));
    Engine::new(config(), &level, &registry).unwrap()
}

/// A slot machine within reach of the spawn.
pub(crate) fn slot_engine(probability: f64) -> Engine {
    let level = flat_level().with_object(
        ObjectDef::new("slot", "slot", 40.0, 0.0, 32.0, 32.0)
            .with_property("coins", 25)
            .with_property("cooldown", 600)
            .with_property("probability", probability)
            .with_property("seed", 7),
    );
    engine(&level)
}

/// The spawn stands in the boss portal, so the fight starts on the first tick.
pub(crate) fn boss_engine(variant: &str) -> Engine {
    let level = flat_level()
        .with_object(ObjectDef::new("item", "crown", 300.0, 0.0, 16.0, 16.0).with_property("boss", true))
        .with_object(ObjectDef::new("portal", "gate", 0.0, 0.0, 16.0, 16.0).with_property("boss", variant))
        .with_object(ObjectDef::new("boss-win", "", 400.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("boss", "boss", 200.0, -300.0, 64.0, 64.0).with_property("variant", variant));
    engine(&level)
}
