//! Sync commands.

use anyhow::{bail, Context, Result};
use catalog_core::timestamp;
use catalog_sync::{SyncEvent, SyncOutcome};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::{describe_outcome, print_json};
use crate::context::AppContext;

pub async fn pending(ctx: &AppContext, all: bool, limit: u32) -> Result<()> {
    let changes = if all {
        ctx.store.recent_changes(limit).await?
    } else {
        ctx.store.get_unsynced_changes().await?
    };

    if changes.is_empty() {
        println!("No queued changes");
        return Ok(());
    }

    for change in &changes {
        let state = match change.synced_at {
            Some(at) => format!("synced {}", timestamp::format_utc(&at)),
            None => "pending".to_string(),
        };
        println!(
            "#{:<5} {:<6}  {:<16}  {}  {}",
            change.id,
            change.action.as_str(),
            change.payload.barcode,
            timestamp::format_utc(&change.created_at),
            state
        );
    }
    Ok(())
}

pub async fn sync_once(ctx: &AppContext) -> Result<()> {
    if ctx.offline {
        bail!("--offline given, not contacting the server");
    }

    if !ctx.refresh_connectivity().await {
        bail!("Server at {} is not reachable", ctx.config.api.base_url);
    }

    let outcome = ctx.engine.sync_now().await;
    println!("{}", describe_outcome(&outcome));

    match outcome {
        SyncOutcome::Failed { .. } => bail!("Sync failed"),
        _ => Ok(()),
    }
}

pub async fn status(ctx: &AppContext, json: bool) -> Result<()> {
    if !ctx.offline {
        ctx.refresh_connectivity().await;
    }

    let status = ctx.engine.status().await?;
    if json {
        return print_json(&status);
    }

    println!("Server:       {}", ctx.config.api.base_url);
    println!("Online:       {}", if status.online { "yes" } else { "no" });
    println!("Pending:      {}", status.pending_count);
    match status.last_sync {
        Some(at) => println!("Last sync:    {}", timestamp::format_utc(&at)),
        None => println!("Last sync:    never"),
    }
    println!("Products:     {}", ctx.store.product_count().await?);
    Ok(())
}

pub async fn reset(ctx: &AppContext, yes: bool) -> Result<()> {
    let pending = ctx.store.pending_count().await?;
    if !yes {
        bail!(
            "Refusing to reset without --yes ({} unsynced change(s) would be lost)",
            pending
        );
    }

    ctx.store.reset().await.context("Reset failed")?;
    println!("Local store reset ({} unsynced change(s) discarded)", pending);
    Ok(())
}

pub async fn run(ctx: &AppContext) -> Result<()> {
    if ctx.offline {
        bail!("--offline given, nothing to run");
    }

    ctx.refresh_connectivity().await;

    let probe = ctx
        .config
        .sync
        .probe_interval()
        .map(|interval| ctx.connectivity.spawn_probe(ctx.remote.clone(), interval));

    let mut events = ctx.engine.subscribe();
    let handle = ctx.engine.clone().spawn();

    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SyncEvent::Completed { report }) => info!(
                    pushed = report.pushed,
                    push_failures = report.push_failures,
                    pulled = report.pulled(),
                    "Sync completed"
                ),
                Ok(SyncEvent::Failed {
                    error,
                    consecutive_failures,
                }) => warn!(%error, consecutive_failures, "Sync failed"),
                Ok(SyncEvent::StoreReset) => {
                    warn!("Local store was reset after repeated sync failures")
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed sync events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!(
        server = %ctx.config.api.base_url,
        interval_secs = ctx.config.sync.interval_secs,
        "Syncing in the background, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Stopping");
    if let Some(probe) = probe {
        probe.abort();
    }
    handle.shutdown().await?;
    reporter.abort();
    Ok(())
}
