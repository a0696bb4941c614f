//! Pipe command: live coalescing of stdin

use anyhow::{Context, Result};
use bounce_cli::{render, Overrides};
use bounce_watcher::spawn_coalescer;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

/// Buffered lines between the stdin reader and the coalescer
const LINE_BUFFER: usize = 1024;

pub async fn run(config: Option<&Path>, overrides: &Overrides, json: bool) -> Result<()> {
    let settings = super::effective_settings(config, overrides)?;
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let mut output = spawn_coalescer(rx, &settings.bounce)?.into_output();

    info!(
        "Coalescing stdin (throttle: {}ms, max delay: {:?})",
        settings.bounce.throttle_wait_ms, settings.bounce.max_delay_ms
    );

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if tx.send(line).await.is_err() {
                break;
            }
        }
        Ok::<_, std::io::Error>(())
    });

    while let Some(bounce) = output.recv().await {
        if json {
            println!("{}", render::json_line(&bounce)?);
        } else {
            println!("{}", render::bounce_line(&bounce));
        }
    }

    reader
        .await
        .context("stdin reader panicked")?
        .context("Failed to read stdin")?;
    Ok(())
}
