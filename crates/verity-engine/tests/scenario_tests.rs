//! End-to-end scenarios played through the public engine API.

use std::fs;
use std::path::PathBuf;

use verity_engine::prelude::*;

const WIDTH: usize = 32;

fn floor() -> TileLayer {
    (0..WIDTH).fold(TileLayer::empty("ground", WIDTH, 2, true), |l, c| l.with_tile(WIDTH, c, 1, 1))
}

fn corridor() -> LevelDef {
    LevelDef::new("corridor", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor())
        .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("item", "key", 200.0, 0.0, 16.0, 16.0).with_property("important", true))
        .with_object(ObjectDef::new("item", "coin", 100.0, 0.0, 16.0, 16.0))
}

fn config(level: &str) -> EngineConfig {
    EngineConfig {
        level: level.to_string(),
        ..EngineConfig::default()
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("verity-scenario-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn holding_right_collects_everything_and_wins() {
    let mut engine = Engine::new(config("corridor"), &corridor(), &RemoteProvider).unwrap();
    let mut ticks = 0;
    while !engine.is_win() && ticks < 200 {
        engine.update(&InputSample::held([Key::D])).unwrap();
        ticks += 1;
    }
    assert!(engine.is_win());
    assert_eq!(engine.player().inventory.items, vec!["coin".to_string(), "key".to_string()]);
}

#[test]
fn winning_freezes_the_world() {
    let mut engine = Engine::new(config("corridor"), &corridor(), &RemoteProvider).unwrap();
    while !engine.is_win() {
        engine.update(&InputSample::held([Key::D])).unwrap();
    }
    let origin = engine.player().body.origin;
    engine.update(&InputSample::held([Key::D])).unwrap();
    assert_eq!(engine.player().body.origin, origin);
}

#[test]
fn restart_returns_to_spawn_and_keeps_progress() {
    let mut engine = Engine::new(config("corridor"), &corridor(), &RemoteProvider).unwrap();
    for _ in 0..25 {
        engine.update(&InputSample::held([Key::D])).unwrap();
    }
    assert!(engine.player().inventory.contains("coin"));

    engine.update(&InputSample::tapped([Key::R])).unwrap();
    assert_eq!(engine.player().body.origin, engine.player_spawn());
    assert_eq!(engine.tick(), 0);
    assert!(engine.items()[1].collected);
}

#[test]
fn dialog_reward_reaches_client_through_state_pushes() {
    let level = LevelDef::new("village", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor())
        .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("item", "key", 600.0, 0.0, 16.0, 16.0).with_property("important", true))
        .with_object(ObjectDef::new("npc", "elder", 48.0, 0.0, 32.0, 32.0).with_property("item", "key"));
    let registry =
        Registry::new().with(SubGameKind::Dialog, "elder", || ScriptedDialog::new("Password?", "ok"));

    let mut server = Engine::new(config("village"), &level, &registry).unwrap();
    let mut client = Engine::new(config("village"), &level, &RemoteProvider).unwrap();

    let script = [
        InputSample::tapped([Key::E]),
        InputSample::tapped([Key::O]),
        InputSample::tapped([Key::K]),
        InputSample::tapped([Key::Enter]),
        InputSample::default(),
        InputSample::tapped([Key::Escape]),
        InputSample::default(),
    ];
    for input in &script {
        client.update(input).unwrap();
        let claimed = client.checksum().unwrap();
        server.update(input).unwrap();
        server.validate_checksum(&claimed).unwrap();
        if let Some((_, state)) = server.active_sub_game() {
            assert!(client.apply_sub_game_state(state));
        }
    }

    assert!(server.player().inventory.contains("key"));
    assert!(client.player().inventory.contains("key"));

    client.update(&InputSample::default()).unwrap();
    server.update(&InputSample::default()).unwrap();
    assert!(client.is_win() && server.is_win());
    server.validate_checksum(&client.checksum().unwrap()).unwrap();
}

#[test]
fn wrong_answer_keeps_reward() {
    let level = LevelDef::new("village", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor())
        .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("item", "key", 600.0, 0.0, 16.0, 16.0).with_property("important", true))
        .with_object(ObjectDef::new("npc", "elder", 48.0, 0.0, 32.0, 32.0).with_property("item", "key"));
    let registry =
        Registry::new().with(SubGameKind::Dialog, "elder", || ScriptedDialog::new("Password?", "ok"));
    let mut engine = Engine::new(config("village"), &level, &registry).unwrap();

    for key in [Key::E, Key::N, Key::O, Key::Enter] {
        engine.update(&InputSample::tapped([key])).unwrap();
    }
    engine.update(&InputSample::default()).unwrap();
    let (_, state) = engine.active_sub_game().unwrap();
    assert_eq!(state.outcome, Outcome::Lost);
    assert_eq!(engine.items()[0].body.origin, Point::new(600.0, 0.0));
}

#[test]
fn pickups_are_persisted_and_restored() {
    let dir = scratch_dir("persist");
    let engine_config = EngineConfig {
        snapshots_dir: Some(dir.clone()),
        ..config("corridor")
    };
    let mut engine = Engine::new(engine_config.clone(), &corridor(), &RemoteProvider).unwrap();
    for _ in 0..25 {
        engine.update(&InputSample::held([Key::D])).unwrap();
    }

    let store = SnapshotStore::new(&dir);
    let latest = store.latest("corridor").unwrap().unwrap();
    assert_eq!(latest.collected().collect::<Vec<_>>(), vec!["coin"]);

    let resumed = Engine::from_snapshot(engine_config, &corridor(), &RemoteProvider, latest).unwrap();
    assert!(resumed.items()[1].collected);
    assert!(!resumed.items()[0].collected);
    assert_eq!(resumed.player().body.origin, resumed.player_spawn());
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn failed_snapshot_write_is_recoverable() {
    let dir = scratch_dir("blocked");
    fs::create_dir_all(&dir).unwrap();
    let blocker = dir.join("not-a-dir");
    fs::write(&blocker, "file").unwrap();

    let engine_config = EngineConfig {
        snapshots_dir: Some(blocker),
        ..config("corridor")
    };
    let mut engine = Engine::new(engine_config, &corridor(), &RemoteProvider).unwrap();

    let mut failure = None;
    for _ in 0..25 {
        if let Err(err) = engine.update(&InputSample::held([Key::D])) {
            failure = Some(err);
            break;
        }
    }
    let err = failure.expect("pickup should fail to persist");
    assert!(err.is_recoverable());
    // The tick still completed.
    assert!(engine.player().inventory.contains("coin"));
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn ordered_collisions_cover_the_player() {
    let engine = Engine::new(config("corridor"), &corridor(), &RemoteProvider).unwrap();
    let hits = engine.collisions(engine.player().rectangle());
    assert!(hits.iter().any(|h| matches!(h, EntityRef::Player(_))));
}
