//! Client side of the protocol.
//!
//! The client runs its own [`Engine`] and reports every tick. A background
//! task reads server frames into a bounded queue so that an error frame can
//! be noticed between ticks without blocking the tick loop.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Interval};
use tracing::{debug, info, warn};
use verity_engine::prelude::*;

use crate::config::ClientConfig;
use crate::protocol::{ClientMessage, ErrorKind, FrameReader, FrameWriter, ServerMessage, SessionOutcome};
use crate::{shutdown_requested, NetError};

/// Builds the client's engine from the server's start snapshot.
pub type ClientEngineFactory = Box<dyn FnOnce(Option<Snapshot>) -> Result<Engine, EngineError> + Send>;

type Event = Result<ServerMessage, NetError>;

pub struct Client<S> {
    config: ClientConfig,
    engine: Engine,
    writer: FrameWriter<WriteHalf<S>>,
    events: mpsc::Receiver<Event>,
    reader_task: JoinHandle<()>,
}

impl Client<TcpStream> {
    /// Connects to `addr` and joins the match.
    pub async fn connect(addr: impl ToSocketAddrs, config: ClientConfig, factory: ClientEngineFactory) -> Result<Self, NetError> {
        let stream = timeout(config.handshake_timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| NetError::Timeout("connect"))??;
        stream.set_nodelay(true)?;
        Self::handshake(stream, config, factory).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Joins the match over an established stream and builds the local
    /// engine from the start snapshot.
    pub async fn handshake(stream: S, config: ClientConfig, factory: ClientEngineFactory) -> Result<Self, NetError> {
        let (read, write) = tokio::io::split(stream);
        let mut reader = FrameReader::new(read);
        let mut writer = FrameWriter::new(write);

        timeout(config.io_timeout(), writer.send(&ClientMessage::Join))
            .await
            .map_err(|_| NetError::Timeout("join"))??;
        let first = timeout(config.handshake_timeout(), reader.read::<ServerMessage>())
            .await
            .map_err(|_| NetError::Timeout("start snapshot"))??;
        let snapshot = match first {
            Some(ServerMessage::Snapshot { snapshot }) => snapshot,
            Some(ServerMessage::Error { kind, message }) => return Err(NetError::Rejected { kind, message }),
            Some(other) => return Err(NetError::Protocol(format!("expected snapshot, got {other:?}"))),
            None => return Err(NetError::Closed),
        };

        let restored = snapshot.is_some();
        let engine = factory(snapshot)?;
        info!(restored, level = engine.level(), "joined match");

        let (tx, events) = mpsc::channel(config.event_queue.max(1));
        let reader_task = tokio::spawn(read_events(reader, tx));
        Ok(Self {
            config,
            engine,
            writer,
            events,
            reader_task,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Runs one tick locally and reports it.
    ///
    /// While a sub-game has focus the server answers every tick with the
    /// sub-game's state, and this waits for it before returning.
    pub async fn step(&mut self, input: &InputSample) -> Result<(), NetError> {
        self.drain_events()?;

        match self.engine.update(input) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => warn!(error = %err, "local tick completed with a persistence failure"),
            Err(err) => return Err(err.into()),
        }
        let checksum = self.engine.checksum()?;
        let tick = ClientMessage::Tick {
            input: input.clone(),
            checksum,
        };
        timeout(self.config.io_timeout(), self.writer.send(&tick))
            .await
            .map_err(|_| NetError::Timeout("send tick"))??;

        if self.engine.active_sub_game().is_some() {
            match self.recv().await? {
                ServerMessage::SubGame { state, .. } => {
                    self.engine.apply_sub_game_state(state);
                }
                other => return Err(NetError::Protocol(format!("expected sub-game state, got {other:?}"))),
            }
        }
        Ok(())
    }

    /// Next server frame. Error frames are returned as
    /// [`NetError::Rejected`].
    pub async fn recv(&mut self) -> Result<ServerMessage, NetError> {
        let event = timeout(self.config.io_timeout(), self.events.recv())
            .await
            .map_err(|_| NetError::Timeout("server frame"))?
            .ok_or(NetError::Closed)?;
        into_message(event)
    }

    /// Steps once per `ticker` tick with input chosen by `inputs`, until the
    /// match is won, the server ends the session or `shutdown` turns true.
    pub async fn run<F>(
        &mut self,
        mut ticker: Interval,
        mut inputs: F,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SessionOutcome, NetError>
    where
        F: FnMut(&Engine) -> InputSample,
    {
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => return Ok(SessionOutcome::Disconnected),
                _ = ticker.tick() => {
                    let input = inputs(&self.engine);
                    match self.step(&input).await {
                        Ok(()) if self.engine.is_win() => return Ok(SessionOutcome::Won),
                        Ok(()) => {}
                        Err(NetError::Rejected { kind: ErrorKind::ChecksumMismatch, .. }) => {
                            return Ok(SessionOutcome::Cheated)
                        }
                        Err(NetError::Closed) => return Ok(SessionOutcome::Disconnected),
                        Err(err) => return Err(err),
                    }
                }
            }
        }
    }

    /// Surfaces frames that arrived since the last tick. Only error frames
    /// matter here.
    fn drain_events(&mut self) -> Result<(), NetError> {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    let message = into_message(event)?;
                    debug!(?message, "ignoring unsolicited frame");
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(NetError::Closed),
            }
        }
    }
}

impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("level", &self.engine.level())
            .field("tick", &self.engine.tick())
            .finish_non_exhaustive()
    }
}

impl<S> Drop for Client<S> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn into_message(event: Event) -> Result<ServerMessage, NetError> {
    match event? {
        ServerMessage::Error { kind, message } => Err(NetError::Rejected { kind, message }),
        message => Ok(message),
    }
}

/// Forwards server frames until the connection ends. The last event is
/// always an error.
async fn read_events<R: AsyncRead + Unpin>(mut reader: FrameReader<R>, tx: mpsc::Sender<Event>) {
    loop {
        let event = match reader.read::<ServerMessage>().await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(NetError::Closed),
            Err(err) => Err(err),
        };
        let last = event.is_err();
        if tx.send(event).await.is_err() || last {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// One-shot requests
// ---------------------------------------------------------------------------

async fn request(addr: impl ToSocketAddrs, wait: Duration, message: ClientMessage) -> Result<ServerMessage, NetError> {
    let stream = timeout(wait, TcpStream::connect(addr))
        .await
        .map_err(|_| NetError::Timeout("connect"))??;
    let (read, write) = stream.into_split();
    let mut reader = FrameReader::new(read);
    let mut writer = FrameWriter::new(write);
    timeout(wait, writer.send(&message))
        .await
        .map_err(|_| NetError::Timeout("request"))??;
    let reply = timeout(wait, reader.read::<ServerMessage>())
        .await
        .map_err(|_| NetError::Timeout("reply"))??
        .ok_or(NetError::Closed)?;
    into_message(Ok(reply))
}

/// Round-trip time of a ping.
pub async fn ping(addr: impl ToSocketAddrs, wait: Duration) -> Result<Duration, NetError> {
    let started = Instant::now();
    match request(addr, wait, ClientMessage::Ping).await? {
        ServerMessage::Pong => Ok(started.elapsed()),
        other => Err(NetError::Protocol(format!("expected pong, got {other:?}"))),
    }
}

/// Collected items and the round number.
pub async fn inventory(addr: impl ToSocketAddrs, wait: Duration) -> Result<(Vec<ItemRecord>, i64), NetError> {
    match request(addr, wait, ClientMessage::Inventory).await? {
        ServerMessage::Inventory { items, round } => Ok((items, round)),
        other => Err(NetError::Protocol(format!("expected inventory, got {other:?}"))),
    }
}
