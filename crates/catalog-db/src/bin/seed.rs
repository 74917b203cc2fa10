//! # Seed Data Generator
//!
//! Populates a local store with the development catalog.
//!
//! ## Usage
//! ```bash
//! # Sample catalog only (4 products)
//! cargo run -p catalog-db --bin seed
//!
//! # Sample catalog plus 500 generated products
//! cargo run -p catalog-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p catalog-db --bin seed -- --db ./data/catalog.db
//! ```
//!
//! Every seeded row is written as a remote-origin product, the same way a
//! first pull from the development API would store it, so seeding never
//! fills the change queue.

use catalog_core::{timestamp, Money, Product};
use catalog_db::{Database, DbConfig};
use std::env;
use tracing_subscriber::EnvFilter;

/// The development API's sample catalog: (remote id, name, cents, barcode, description).
const SAMPLE_PRODUCTS: &[(i64, &str, i64, &str, &str)] = &[
    (1, "Widget A", 1999, "123456789012", "A high quality widget for all your needs."),
    (2, "Widget B", 2499, "223456789013", "Premium widget with enhanced features."),
    (3, "Gadget X", 4999, "323456789014", "Advanced gadget with smart technology."),
    (4, "Test Product", 999, "12313", "Test product for barcode scanning."),
];

/// Name stems for generated products.
const STEMS: &[&str] = &[
    "Widget", "Gadget", "Gizmo", "Sprocket", "Doohickey", "Bracket", "Fastener", "Coupler",
];

/// Variants appended to generated names, with a price addon in cents.
const VARIANTS: &[(&str, i64)] = &[
    ("Mini", 0),
    ("Standard", 250),
    ("Plus", 500),
    ("Pro", 1000),
    ("Max", 2000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 0;
    let mut db_path = String::from("./catalog_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Product Catalog Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Extra generated products (default: 0)");
                println!("  -d, --db <PATH>    Database file path (default: ./catalog_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Product Catalog Seed Data Generator");
    println!("======================================");
    println!("Database: {}", db_path);
    println!("Extra products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let store = db.store();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = store.product_count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let now = timestamp::now();
    let mut seeded = 0;

    for (remote_id, name, cents, barcode, description) in SAMPLE_PRODUCTS {
        let mut product = Product::new(*name, Money::from_cents(*cents), *barcode)
            .with_description(*description);
        product.remote_id = Some(*remote_id);
        product.created_at = now;
        product.updated_at = now;

        store.save_remote(&product).await?;
        seeded += 1;
    }
    println!("✓ Sample catalog stored ({} products)", seeded);

    for n in 0..count {
        let stem = STEMS[n % STEMS.len()];
        let (variant, addon) = VARIANTS[(n / STEMS.len()) % VARIANTS.len()];

        let mut product = Product::new(
            format!("{} {} #{}", stem, variant, n + 1),
            Money::from_cents(199 + addon + (n as i64 % 7) * 100),
            format!("9{:011}", n + 1),
        );
        product.remote_id = Some(1000 + n as i64);

        if let Err(e) = store.save_remote(&product).await {
            eprintln!("Failed to insert {}: {}", product.barcode, e);
            continue;
        }

        seeded += 1;
        if seeded % 100 == 0 {
            println!("  Stored {} products...", seeded);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Stored {} products in {:?}", seeded, elapsed);

    let sample = store.get_by_barcode("12313").await?;
    match sample {
        Some(p) => println!("✓ Barcode lookup works: 12313 → {} ({})", p.name, p.price),
        None => println!("⚠ Barcode lookup failed for 12313"),
    }

    println!();
    println!("🎉 Seed complete!");

    Ok(())
}
