//! # CLI Commands
//!
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (shared output helpers)
//! ├── product.rs  ◄─── list, show, scan, add, update, delete
//! └── sync.rs     ◄─── pending, sync, status, reset, run
//! ```

pub mod product;
pub mod sync;

use anyhow::Result;
use catalog_core::{timestamp, Product};
use catalog_sync::SyncOutcome;
use serde::Serialize;

use crate::context::AppContext;

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_product_row(product: &Product) {
    let origin = if product.from_remote { "remote" } else { "local" };
    println!(
        "{:>6}  {:<16}  {:>10}  {:<6}  {}",
        product.id.unwrap_or_default(),
        product.barcode,
        product.price.to_string(),
        origin,
        product.name
    );
}

pub(crate) fn print_product_detail(product: &Product) {
    println!("Id:          {}", product.id.unwrap_or_default());
    match product.remote_id {
        Some(remote_id) => println!("Server id:   {}", remote_id),
        None => println!("Server id:   (not synced)"),
    }
    println!("Name:        {}", product.name);
    println!("Price:       {}", product.price);
    println!("Barcode:     {}", product.barcode);
    if let Some(description) = &product.description {
        println!("Description: {}", description);
    }
    println!("Created:     {}", timestamp::format_utc(&product.created_at));
    println!("Updated:     {}", timestamp::format_utc(&product.updated_at));
    println!(
        "Origin:      {}",
        if product.from_remote { "server" } else { "local edit" }
    );
}

pub(crate) fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Skipped(reason) => format!("Sync skipped ({:?})", reason),
        SyncOutcome::Completed(report) => format!(
            "Sync completed: {} pushed, {} failed to push, {} pulled, {} kept local",
            report.pushed,
            report.push_failures,
            report.pulled(),
            report.kept_local
        ),
        SyncOutcome::Failed {
            error,
            consecutive_failures,
            reset_triggered,
        } => {
            let mut line = format!(
                "Sync failed ({} in a row): {}",
                consecutive_failures, error
            );
            if *reset_triggered {
                line.push_str("\nLocal store was reset after repeated failures");
            }
            line
        }
    }
}

/// Pushes a fresh local change right away when auto sync is on. Sync
/// problems are reported but never fail the command.
pub(crate) async fn sync_after_mutation(ctx: &AppContext) {
    if ctx.offline || !ctx.config.sync.auto_sync {
        return;
    }

    if !ctx.refresh_connectivity().await {
        println!("Offline: change queued for the next sync");
        return;
    }

    println!("{}", describe_outcome(&ctx.engine.sync_now().await));
}
