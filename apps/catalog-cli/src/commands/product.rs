//! Product commands: everything here reads and writes the local store and
//! works offline.

use anyhow::{bail, Context, Result};
use catalog_core::{Money, ProductDraft, ProductUpdate};

use super::{print_json, print_product_detail, print_product_row, sync_after_mutation};
use crate::context::AppContext;

pub async fn list(ctx: &AppContext, search: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let products = match search {
        Some(query) => ctx.catalog.search_products(query, limit).await?,
        None => ctx.catalog.list_products().await?,
    };

    if json {
        return print_json(&products);
    }

    if products.is_empty() {
        println!("No products. Use 'catalog add' or 'catalog sync' to fill the catalog.");
        return Ok(());
    }

    for product in &products {
        print_product_row(product);
    }
    println!("{} product(s)", products.len());
    Ok(())
}

pub async fn show(ctx: &AppContext, id: i64, json: bool) -> Result<()> {
    let Some(product) = ctx.catalog.get_product(id).await? else {
        bail!("Product {} not found", id);
    };

    if json {
        print_json(&product)
    } else {
        print_product_detail(&product);
        Ok(())
    }
}

pub async fn scan(ctx: &AppContext, barcode: &str, json: bool) -> Result<()> {
    if !ctx.offline && ctx.store.get_by_barcode(barcode).await?.is_none() {
        ctx.refresh_connectivity().await;
    }

    match ctx.catalog.find_by_barcode(barcode).await? {
        Some(product) if json => print_json(&product),
        Some(product) => {
            print_product_detail(&product);
            Ok(())
        }
        None => bail!("No product with barcode '{}'", barcode.trim()),
    }
}

fn parse_price(price: f64) -> Result<Money> {
    let money = Money::from_decimal(price).context("Invalid price")?;
    if money.is_negative() {
        bail!("Price cannot be negative");
    }
    Ok(money)
}

pub async fn add(
    ctx: &AppContext,
    name: String,
    price: f64,
    barcode: String,
    description: Option<String>,
) -> Result<()> {
    let draft = ProductDraft {
        name,
        price: parse_price(price)?,
        barcode,
        description,
    };

    let product = ctx.catalog.add_product(draft).await?;
    println!(
        "Added product {} ({})",
        product.id.unwrap_or_default(),
        product.barcode
    );

    sync_after_mutation(ctx).await;
    Ok(())
}

pub async fn update(
    ctx: &AppContext,
    id: i64,
    name: Option<String>,
    price: Option<f64>,
    barcode: Option<String>,
    description: Option<String>,
) -> Result<()> {
    let patch = ProductUpdate {
        name,
        price: price.map(parse_price).transpose()?,
        barcode,
        description,
    };

    if patch.is_empty() {
        bail!("Nothing to update: pass at least one of --name, --price, --barcode, --description");
    }

    let product = ctx.catalog.update_product(id, patch).await?;
    println!("Updated product {} ({})", id, product.barcode);

    sync_after_mutation(ctx).await;
    Ok(())
}

pub async fn delete(ctx: &AppContext, id: i64) -> Result<()> {
    ctx.catalog.delete_product(id).await?;
    println!("Deleted product {}", id);

    sync_after_mutation(ctx).await;
    Ok(())
}
