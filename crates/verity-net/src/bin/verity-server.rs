//! Authoritative match server.
//!
//! Usage: `verity-server <config.json>`
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use verity_net::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args().nth(1).context("usage: verity-server <config.json>")?;
    let config = ServerConfig::load(&path).with_context(|| format!("loading config {path}"))?;
    let listen_addr = config.listen_addr.clone();
    let server = Arc::new(GameServer::from_config(config).context("building game server")?);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    info!(addr = %listener.local_addr()?, level = %server.config().engine.level, "server started");

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = stop.send(true);
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for ctrl-c, stop the process to exit");
                // Dropping the sender stops the server.
                std::future::pending::<()>().await;
                drop(stop);
            }
        }
    });

    Arc::clone(&server).serve(listener, shutdown).await?;

    let status = server.status();
    info!(
        is_win = status.is_win,
        was_cheating = status.was_cheating,
        items = server.inventory().len(),
        "server stopped"
    );
    Ok(())
}
