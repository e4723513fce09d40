use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use happymac_companion::{Companion, HostChannel, HostCommand, HostEvent};
use happymac_core::{AppError, Config, FileStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

#[tokio::main]
async fn main() -> Result<()> {
    happymac_core::init()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (config, _validation) =
        Config::load_validated(config_path.as_deref()).map_err(|e| startup_error(e.into()))?;

    let store =
        FileStore::open(config.state_path()).map_err(|e| startup_error(AppError::from(e)))?;
    tracing::info!("State stored at {}", store.path().display());

    let (tx, rx) = unbounded_channel::<HostCommand>();
    let writer = tokio::spawn(write_commands(rx));

    let companion = Companion::from_config(&config, Arc::new(store), HostChannel::new(tx))
        .map_err(startup_error)?;
    tracing::info!("HappyMac companion started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read host event")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => {
                companion.handle_event(event);
            }
            Err(e) => tracing::warn!("Skipping malformed host event: {}", e),
        }
    }

    // Host went away; let in-flight relays finish writing before exit
    tracing::info!("Host input closed, shutting down");
    drop(companion);
    writer.await.context("Command writer panicked")??;

    Ok(())
}

/// Tell the person running the companion what went wrong, then hand the
/// full error back for the exit report.
fn startup_error(err: AppError) -> anyhow::Error {
    tracing::error!("{} ({})", err.user_message(), err);
    anyhow::Error::new(err)
}

/// Print each host command as one JSON line on stdout.
async fn write_commands(mut rx: UnboundedReceiver<HostCommand>) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(command) = rx.recv().await {
        let mut line = serde_json::to_vec(&command).context("Failed to encode host command")?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }

    Ok(())
}
