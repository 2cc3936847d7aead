//! Authoritative side of the protocol.
//!
//! The server holds at most one match at a time. A connection claims it with
//! [`ClientMessage::Join`]; from then on every [`ClientMessage::Tick`] is
//! applied to the server's engine and the client's claimed checksum is
//! compared with the recomputed one. The slot is released when the
//! connection ends, however it ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use verity_engine::prelude::*;

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, ErrorKind, FrameReader, FrameWriter, ServerMessage, SessionOutcome};
use crate::{shutdown_requested, NetError};

/// Builds the server's engine, restoring progress from a snapshot if given.
pub type EngineFactory = Box<dyn Fn(Option<Snapshot>) -> Result<Engine, EngineError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Match state
// ---------------------------------------------------------------------------

/// Flags observable from outside the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GameStatus {
    pub is_win: bool,
    /// Sticky: set by the first checksum mismatch and never cleared.
    pub was_cheating: bool,
}

impl GameStatus {
    pub fn outcome(&self) -> Option<SessionOutcome> {
        if self.was_cheating {
            Some(SessionOutcome::Cheated)
        } else if self.is_win {
            Some(SessionOutcome::Won)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct MatchState {
    engine: Option<Engine>,
    status: GameStatus,
    /// Last known inventory. Survives the end of a session.
    inventory: Vec<ItemRecord>,
}

impl MatchState {
    fn refresh_inventory(&mut self) {
        if let Some(engine) = &self.engine {
            self.inventory = inventory_records(engine);
        }
    }
}

fn inventory_records(engine: &Engine) -> Vec<ItemRecord> {
    engine
        .player()
        .inventory
        .items
        .iter()
        .map(|name| ItemRecord {
            name: name.clone(),
            important: engine.items().iter().any(|i| &i.name == name && i.important),
            collected: true,
        })
        .collect()
}

/// Holds the single match slot until dropped.
struct SlotGuard<'a> {
    server: &'a GameServer,
}

impl<'a> SlotGuard<'a> {
    fn claim(server: &'a GameServer) -> Option<Self> {
        server
            .connected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { server })
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.server.state.lock().engine = None;
        self.server.connected.store(false, Ordering::Release);
        debug!("match slot released");
    }
}

// ---------------------------------------------------------------------------
// GameServer
// ---------------------------------------------------------------------------

pub struct GameServer {
    config: ServerConfig,
    factory: EngineFactory,
    connected: AtomicBool,
    state: Mutex<MatchState>,
}

impl GameServer {
    pub fn new<F>(config: ServerConfig, factory: F) -> Self
    where
        F: Fn(Option<Snapshot>) -> Result<Engine, EngineError> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            connected: AtomicBool::new(false),
            state: Mutex::new(MatchState::default()),
        }
    }

    /// Server whose matches are built from `level`, with sub-games created
    /// by `provider`.
    pub fn with_level<P>(config: ServerConfig, level: LevelDef, provider: P) -> Self
    where
        P: SubGameProvider + Send + Sync + 'static,
    {
        let engine_config = config.engine.clone();
        Self::new(config, move |snapshot| {
            let engine = match snapshot {
                Some(snapshot) => Engine::from_snapshot(engine_config.clone(), &level, &provider, snapshot),
                None => Engine::new(engine_config.clone(), &level, &provider),
            };
            Ok(engine?)
        })
    }

    /// Loads the level and dialogs named by `config`.
    pub fn from_config(config: ServerConfig) -> Result<Self, NetError> {
        let level = config.load_level()?;
        let registry = config.registry();
        Ok(Self::with_level(config, level, registry))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn status(&self) -> GameStatus {
        self.state.lock().status
    }

    /// Whether a client currently holds the match.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Items the player holds, or held when the last session ended.
    pub fn inventory(&self) -> Vec<ItemRecord> {
        let mut state = self.state.lock();
        state.refresh_inventory();
        state.inventory.clone()
    }

    /// Accepts connections until `shutdown` turns true. Open sessions are
    /// cancelled at the same time.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<(), NetError> {
        info!(addr = ?listener.local_addr().ok(), "accepting connections");
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    info!("shutdown requested");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    debug!(%peer, "connection accepted");
                    let server = Arc::clone(&self);
                    let mut cancel = shutdown.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            result = server.handle_connection(stream) => match result {
                                Ok(()) => debug!(%peer, "connection closed"),
                                Err(err) => warn!(%peer, error = %err, "connection ended with error"),
                            },
                            _ = shutdown_requested(&mut cancel) => debug!(%peer, "connection cancelled"),
                        }
                    });
                }
            }
        }
    }

    /// Runs the protocol on one connection until it closes.
    ///
    /// `Ping` and `Inventory` are answered any number of times. `Join`
    /// claims the match and turns the connection into a session.
    pub async fn handle_connection<S>(&self, stream: S) -> Result<(), NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read, write) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read);
        let mut writer = FrameWriter::new(write);

        loop {
            let frame = timeout(self.config.handshake_timeout(), reader.read::<ClientMessage>())
                .await
                .map_err(|_| NetError::Timeout("first frame"))?;
            let message = match frame {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(()),
                Err(err) => return self.fail(&mut writer, err).await,
            };
            match message {
                ClientMessage::Ping => self.send(&mut writer, &ServerMessage::Pong).await?,
                ClientMessage::Inventory => {
                    let reply = self.inventory_message();
                    self.send(&mut writer, &reply).await?;
                }
                ClientMessage::Join => return self.run_session(&mut reader, &mut writer).await,
                ClientMessage::Tick { .. } => {
                    return self.fail(&mut writer, NetError::Protocol("tick before join".into())).await;
                }
            }
        }
    }

    // -- session ------------------------------------------------------------

    async fn run_session<R, W>(&self, reader: &mut FrameReader<R>, writer: &mut FrameWriter<W>) -> Result<(), NetError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some(_slot) = SlotGuard::claim(self) else {
            warn!("join rejected, match already has a client");
            let err = NetError::Rejected {
                kind: ErrorKind::AlreadyConnected,
                message: "only one client connection allowed".into(),
            };
            return self.fail(writer, err).await;
        };

        let start = match self.start_match() {
            Ok(start) => start,
            Err(err) => {
                error!(error = %err, "failed to start match");
                return self.fail(writer, err).await;
            }
        };
        self.send(writer, &ServerMessage::Snapshot { snapshot: start }).await?;
        info!("client joined");

        loop {
            let frame = match timeout(self.config.io_timeout(), reader.read::<ClientMessage>()).await {
                Ok(frame) => frame,
                Err(_) => return self.fail(writer, NetError::Timeout("next tick")).await,
            };
            match frame {
                Ok(None) => {
                    info!(status = ?self.status(), "client disconnected");
                    return Ok(());
                }
                Err(err) => return self.fail(writer, err).await,
                Ok(Some(ClientMessage::Ping)) => self.send(writer, &ServerMessage::Pong).await?,
                Ok(Some(ClientMessage::Inventory)) => {
                    let reply = self.inventory_message();
                    self.send(writer, &reply).await?;
                }
                Ok(Some(ClientMessage::Join)) => {
                    return self.fail(writer, NetError::Protocol("already joined".into())).await;
                }
                Ok(Some(ClientMessage::Tick { input, checksum })) => match self.process_tick(&input, &checksum) {
                    Ok(Some(push)) => self.send(writer, &push).await?,
                    Ok(None) => {}
                    Err(err) => return self.fail(writer, err).await,
                },
            }
        }
    }

    /// Builds the engine for a new session. Returns the snapshot it was
    /// restored from.
    fn start_match(&self) -> Result<Option<Snapshot>, NetError> {
        let restored = match &self.config.engine.snapshots_dir {
            Some(dir) => SnapshotStore::new(dir)
                .latest(&self.config.engine.level)
                .map_err(EngineError::from)?,
            None => None,
        };
        let engine = (self.factory)(restored)?;
        let start = engine.start_snapshot().cloned();

        let mut state = self.state.lock();
        state.inventory = inventory_records(&engine);
        state.status.is_win = engine.is_win();
        state.engine = Some(engine);
        Ok(start)
    }

    /// Applies one client tick. Returns the sub-game push owed to the client,
    /// if a sub-game has focus afterwards.
    fn process_tick(&self, input: &InputSample, checksum: &str) -> Result<Option<ServerMessage>, NetError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let engine = state
            .engine
            .as_mut()
            .ok_or_else(|| NetError::Protocol("no match in progress".into()))?;

        if input.is_newly_pressed(Key::Slash) {
            let snapshot = engine.make_snapshot();
            match engine.save_snapshot(&snapshot) {
                Ok(Some(path)) => info!(path = %path.display(), "progress saved on request"),
                Ok(None) => debug!("save requested but persistence is disabled"),
                Err(err) => warn!(error = %err, "requested save failed"),
            }
        }

        match engine.update(input) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => warn!(error = %err, "tick completed with a persistence failure"),
            Err(err) => return Err(err.into()),
        }

        if let Err(err) = engine.validate_checksum(checksum) {
            state.status.was_cheating = true;
            error!(tick = engine.tick(), error = %err, "client state diverged");
            return Err(err.into());
        }

        state.status.is_win = engine.is_win();
        state.inventory = inventory_records(engine);
        Ok(engine
            .active_sub_game()
            .map(|(kind, sub)| ServerMessage::SubGame { kind, state: sub }))
    }

    fn inventory_message(&self) -> ServerMessage {
        let mut state = self.state.lock();
        state.refresh_inventory();
        ServerMessage::Inventory {
            items: state.inventory.clone(),
            round: self.config.round,
        }
    }

    // -- framing helpers ----------------------------------------------------

    async fn send<W: AsyncWrite + Unpin>(&self, writer: &mut FrameWriter<W>, message: &ServerMessage) -> Result<(), NetError> {
        timeout(self.config.io_timeout(), writer.send(message))
            .await
            .map_err(|_| NetError::Timeout("send"))?
    }

    /// Reports `err` to the client, then returns it.
    async fn fail<W: AsyncWrite + Unpin>(&self, writer: &mut FrameWriter<W>, err: NetError) -> Result<(), NetError> {
        let report = ServerMessage::Error {
            kind: err.kind(),
            message: err.to_string(),
        };
        if let Err(send_err) = self.send(writer, &report).await {
            debug!(error = %send_err, "could not report error to client");
        }
        Err(err)
    }
}

impl std::fmt::Debug for GameServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameServer")
            .field("listen_addr", &self.config.listen_addr)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
