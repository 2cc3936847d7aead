//! Sessions played over real TCP connections.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use verity_engine::prelude::*;
use verity_net::prelude::*;

const WIDTH: usize = 32;
const WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn floor() -> TileLayer {
    (0..WIDTH).fold(TileLayer::empty("ground", WIDTH, 2, true), |l, c| l.with_tile(WIDTH, c, 1, 1))
}

fn corridor() -> LevelDef {
    LevelDef::new("corridor", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor())
        .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("item", "coin", 100.0, 0.0, 16.0, 16.0))
        .with_object(ObjectDef::new("item", "key", 200.0, 0.0, 16.0, 16.0).with_property("important", true))
}

fn spiked() -> LevelDef {
    corridor().with_object(ObjectDef::new("spike", "thorns", 60.0, 16.0, 32.0, 16.0))
}

fn village() -> LevelDef {
    LevelDef::new("village", 32.0, 32.0, WIDTH, 2)
        .with_layer(floor())
        .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0))
        .with_object(ObjectDef::new("item", "key", 600.0, 0.0, 16.0, 16.0).with_property("important", true))
        .with_object(ObjectDef::new("npc", "elder", 48.0, 0.0, 32.0, 32.0).with_property("item", "key"))
}

fn engine_config(level: &str) -> EngineConfig {
    EngineConfig {
        level: level.to_string(),
        ..EngineConfig::default()
    }
}

fn server_config(level: &str) -> ServerConfig {
    ServerConfig {
        engine: engine_config(level),
        ..ServerConfig::default()
    }
}

fn factory(config: EngineConfig, level: LevelDef) -> ClientEngineFactory {
    Box::new(move |snapshot| {
        let engine = match snapshot {
            Some(snapshot) => Engine::from_snapshot(config, &level, &RemoteProvider, snapshot)?,
            None => Engine::new(config, &level, &RemoteProvider)?,
        };
        Ok(engine)
    })
}

struct Harness {
    server: Arc<GameServer>,
    addr: SocketAddr,
    stop: watch::Sender<bool>,
    task: JoinHandle<Result<(), NetError>>,
}

async fn start<P>(config: ServerConfig, level: LevelDef, provider: P) -> Harness
where
    P: SubGameProvider + Send + Sync + 'static,
{
    let server = Arc::new(GameServer::with_level(config, level, provider));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(Arc::clone(&server).serve(listener, shutdown));
    Harness { server, addr, stop, task }
}

impl Harness {
    async fn join(&self, config: EngineConfig, level: LevelDef) -> Result<Client<TcpStream>, NetError> {
        Client::connect(self.addr, ClientConfig::default(), factory(config, level)).await
    }

    async fn raw(&self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        let (read, write) = TcpStream::connect(self.addr).await.unwrap().into_split();
        (FrameReader::new(read), FrameWriter::new(write))
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("verity-net-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn honest_client_wins() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let mut client = harness.join(engine_config("corridor"), corridor()).await.unwrap();

    let mut ticks = 0;
    while !client.engine().is_win() && ticks < 200 {
        client.step(&InputSample::held([Key::D])).await.unwrap();
        ticks += 1;
    }
    assert!(client.engine().is_win());

    let server = Arc::clone(&harness.server);
    wait_until(|| server.status().is_win).await;
    assert_eq!(harness.server.status().outcome(), Some(SessionOutcome::Won));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_loop_stops_on_win() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let mut client = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    let (_keep, shutdown) = watch::channel(false);

    let ticker = tokio::time::interval(Duration::from_millis(1));
    let outcome = client
        .run(ticker, |_| InputSample::held([Key::D]), shutdown)
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::Won);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_without_hazards_is_caught() {
    let harness = start(server_config("corridor"), spiked(), RemoteProvider).await;
    let mut cheat = engine_config("corridor");
    cheat.rules.hazards_enabled = false;
    let mut client = harness.join(cheat, spiked()).await.unwrap();

    let mut failure = None;
    for _ in 0..200 {
        if let Err(err) = client.step(&InputSample::held([Key::D])).await {
            failure = Some(err);
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(failure.is_some(), "server never ended the session");

    let server = Arc::clone(&harness.server);
    wait_until(|| !server.is_connected()).await;
    assert_eq!(harness.server.status().outcome(), Some(SessionOutcome::Cheated));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forged_checksum_gets_an_error_frame() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let (mut reader, mut writer) = harness.raw().await;

    writer.send(&ClientMessage::Join).await.unwrap();
    assert!(matches!(
        reader.read::<ServerMessage>().await.unwrap(),
        Some(ServerMessage::Snapshot { snapshot: None })
    ));
    writer
        .send(&ClientMessage::Tick {
            input: InputSample::held([Key::D]),
            checksum: "0".repeat(64),
        })
        .await
        .unwrap();

    match reader.read::<ServerMessage>().await.unwrap() {
        Some(ServerMessage::Error { kind, .. }) => assert_eq!(kind, ErrorKind::ChecksumMismatch),
        other => panic!("expected error frame, got {other:?}"),
    }
    assert_eq!(reader.read::<ServerMessage>().await.unwrap(), None);
    assert!(harness.server.status().was_cheating);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_join_is_rejected_while_first_plays() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let mut first = harness.join(engine_config("corridor"), corridor()).await.unwrap();

    let err = harness.join(engine_config("corridor"), corridor()).await.unwrap_err();
    assert!(matches!(err, NetError::Rejected { kind: ErrorKind::AlreadyConnected, .. }));

    for _ in 0..10 {
        first.step(&InputSample::held([Key::D])).await.unwrap();
    }
    assert!(harness.server.is_connected());
    assert!(!harness.server.status().was_cheating);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slot_is_released_on_disconnect() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let mut first = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    first.step(&InputSample::default()).await.unwrap();
    drop(first);

    let server = Arc::clone(&harness.server);
    wait_until(|| !server.is_connected()).await;

    let mut second = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    second.step(&InputSample::default()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ping_and_inventory_do_not_need_the_slot() {
    let config = ServerConfig {
        round: 3,
        ..server_config("corridor")
    };
    let harness = start(config, corridor(), RemoteProvider).await;
    let mut client = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    for _ in 0..25 {
        client.step(&InputSample::held([Key::D])).await.unwrap();
    }
    let server = Arc::clone(&harness.server);
    wait_until(|| server.inventory().iter().any(|i| i.name == "coin")).await;

    assert!(ping(harness.addr, WAIT).await.is_ok());
    let (items, round) = inventory(harness.addr, WAIT).await.unwrap();
    assert_eq!(round, 3);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "coin");
    assert!(!items[0].important);
    assert!(harness.server.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dialog_state_is_pushed_to_the_client() {
    let mut config = server_config("village");
    config.dialogs = BTreeMap::from([(
        "elder".to_string(),
        DialogScript {
            greeting: "Password?".into(),
            answer: "ok".into(),
        },
    )]);
    let registry = config.registry();
    let harness = start(config, village(), registry).await;
    let mut client = harness.join(engine_config("village"), village()).await.unwrap();

    client.step(&InputSample::tapped([Key::E])).await.unwrap();
    let (kind, state) = client.engine().active_sub_game().unwrap();
    assert_eq!(kind, SubGameKind::Dialog);
    assert_eq!(state.outcome, Outcome::Pending);

    for input in [
        InputSample::tapped([Key::O]),
        InputSample::tapped([Key::K]),
        InputSample::tapped([Key::Enter]),
        InputSample::default(),
        InputSample::tapped([Key::Escape]),
        InputSample::default(),
    ] {
        client.step(&input).await.unwrap();
    }
    assert!(client.engine().player().inventory.contains("key"));

    client.step(&InputSample::default()).await.unwrap();
    assert!(client.engine().is_win());
    let server = Arc::clone(&harness.server);
    wait_until(|| server.status().is_win).await;
    assert!(!harness.server.status().was_cheating);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn saved_progress_is_served_to_the_next_client() {
    let dir = scratch_dir("resume");
    let mut config = server_config("corridor");
    config.engine.snapshots_dir = Some(dir.clone());
    let harness = start(config, corridor(), RemoteProvider).await;

    let mut first = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    for _ in 0..25 {
        first.step(&InputSample::held([Key::D])).await.unwrap();
    }
    first.step(&InputSample::tapped([Key::Slash])).await.unwrap();
    drop(first);
    let server = Arc::clone(&harness.server);
    wait_until(|| !server.is_connected()).await;

    let mut second = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    let start = second.engine().start_snapshot().cloned().expect("restored from snapshot");
    assert_eq!(start.collected().collect::<Vec<_>>(), vec!["coin"]);
    assert!(second.engine().player().inventory.contains("coin"));
    for _ in 0..5 {
        second.step(&InputSample::held([Key::A])).await.unwrap();
    }
    assert!(!harness.server.status().was_cheating);
    std::fs::remove_dir_all(dir).unwrap();
}

// ---------------------------------------------------------------------------
// Protocol errors and lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn garbage_frame_is_a_protocol_violation() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let mut stream = TcpStream::connect(harness.addr).await.unwrap();
    stream.write_all(b"definitely not json\n").await.unwrap();

    let (read, _write) = stream.into_split();
    let mut reader = FrameReader::new(read);
    match reader.read::<ServerMessage>().await.unwrap() {
        Some(ServerMessage::Error { kind, .. }) => assert_eq!(kind, ErrorKind::ProtocolViolation),
        other => panic!("expected error frame, got {other:?}"),
    }
    assert!(!harness.server.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_connection_times_out() {
    let config = ServerConfig {
        handshake_timeout_ms: 100,
        ..server_config("corridor")
    };
    let harness = start(config, corridor(), RemoteProvider).await;
    let (mut reader, _writer) = harness.raw().await;

    let closed = tokio::time::timeout(WAIT, reader.read::<ServerMessage>()).await.unwrap();
    assert_eq!(closed.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_closes_listener_and_sessions() {
    let harness = start(server_config("corridor"), corridor(), RemoteProvider).await;
    let mut client = harness.join(engine_config("corridor"), corridor()).await.unwrap();
    client.step(&InputSample::default()).await.unwrap();

    harness.stop.send(true).unwrap();
    let served = tokio::time::timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert!(served.is_ok());

    assert!(matches!(client.recv().await, Err(NetError::Closed)));
    let server = Arc::clone(&harness.server);
    wait_until(|| !server.is_connected()).await;
}
