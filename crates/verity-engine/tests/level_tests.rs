//! Integration tests for loading levels from JSON.

use verity_engine::prelude::*;

const LEVEL_JSON: &str = r#"{
    "name": "meadow",
    "tile_width": 32,
    "tile_height": 32,
    "width": 4,
    "height": 2,
    "layers": [
        {"name": "sky", "tiles": [0, 7, 7, 0, 0, 0, 0, 0]},
        {"name": "ground", "collisions": true, "tiles": [0, 0, 0, 0, 1, 1, 1, 1]}
    ],
    "image_layers": [
        {"name": "hills", "x": 0, "y": 0, "width": 128, "height": 64}
    ],
    "objects": [
        {"type": "player_spawn", "x": 0, "y": 0},
        {"type": "item", "name": "flower", "x": 96, "y": 0, "width": 16, "height": 16,
         "properties": {"important": true}},
        {"type": "signpost", "name": "decor", "x": 10, "y": 10}
    ]
}"#;

fn config() -> EngineConfig {
    EngineConfig {
        level: "meadow".into(),
        ..EngineConfig::default()
    }
}

#[test]
fn json_level_builds_an_engine() {
    let def = LevelDef::from_json(LEVEL_JSON).unwrap();
    let engine = Engine::new(config(), &def, &RemoteProvider).unwrap();
    assert_eq!(engine.tiles().len(), 4);
    // Two decorative tiles plus the image layer.
    assert_eq!(engine.background().len(), 3);
    assert_eq!(engine.items().len(), 1);
    assert!(engine.items()[0].important);
}

#[test]
fn unknown_object_types_are_skipped() {
    let def = LevelDef::from_json(LEVEL_JSON).unwrap();
    assert!(Engine::new(config(), &def, &RemoteProvider).is_ok());
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = LevelDef::from_json("{\"name\": ").unwrap_err();
    assert!(matches!(err, LevelError::Parse(_)));
}

#[test]
fn unknown_boss_variant_is_rejected() {
    let def = LevelDef::from_json(LEVEL_JSON)
        .unwrap()
        .with_object(ObjectDef::new("item", "crown", 0.0, 0.0, 16.0, 16.0).with_property("boss", true))
        .with_object(ObjectDef::new("portal", "gate", 0.0, 0.0, 16.0, 16.0).with_property("boss", "v9"))
        .with_object(ObjectDef::new("boss-win", "", 64.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("boss", "boss", 64.0, -64.0, 64.0, 64.0).with_property("variant", "v9"));
    let err = Engine::new(config(), &def, &RemoteProvider).unwrap_err();
    assert!(matches!(err, LevelError::UnknownBossVariant(ref v) if v == "v9"));
}

#[test]
fn level_errors_convert_into_engine_errors() {
    fn load(json: &str) -> Result<Engine, EngineError> {
        let def = LevelDef::from_json(json)?;
        Ok(Engine::new(config(), &def, &RemoteProvider)?)
    }

    let without_spawn = LEVEL_JSON.replace("player_spawn", "nothing");
    let err = load(&without_spawn).unwrap_err();
    assert!(matches!(err, EngineError::Level(LevelError::NoPlayerSpawn { .. })));
    assert_eq!(err.to_string(), "level 'meadow' has no player_spawn object");
}

#[test]
fn hazards_toggle_applies_to_spikes() {
    let def = LevelDef::from_json(LEVEL_JSON)
        .unwrap()
        .with_object(ObjectDef::new("spike", "thorns", 0.0, 16.0, 32.0, 16.0).with_property("damage", 7));

    let armed = Engine::new(config(), &def, &RemoteProvider).unwrap();
    assert_eq!(armed.spikes()[0].damage, 7);

    let mut safe_config = config();
    safe_config.rules.hazards_enabled = false;
    let safe = Engine::new(safe_config, &def, &RemoteProvider).unwrap();
    assert_eq!(safe.spikes()[0].damage, 0);
}
