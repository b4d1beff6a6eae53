//! # Seed Data Generator
//!
//! Populates the database with catalog and invoice data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default) plus a demo invoice
//! cargo run -p tukar-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tukar-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p tukar-db --bin seed -- --db ./data/tukar.db
//! ```
//!
//! ## Generated Data
//! Beverage catalog across brands and packagings, each product with:
//! - Unique SKU: `{BRAND}-{PACK}-{INDEX}`
//! - Cost and selling price in realistic rupiah ranges
//! - Random stock: 0 - 100
//!
//! Plus one demo invoice with a few lines, so the exchange forms have
//! something to work against immediately.

use chrono::Utc;
use std::env;
use tukar_core::{DiscountKind, Invoice, InvoiceLine, Product};
use tukar_db::{Database, DbConfig};
use uuid::Uuid;

/// Beverage brands for realistic test data
const BRANDS: &[&str] = &[
    "Teh Botol Sosro",
    "Aqua",
    "Sprite",
    "Coca-Cola",
    "Fanta",
    "Pocari Sweat",
    "Teh Pucuk Harum",
    "Le Minerale",
    "Floridina",
    "Good Day Coffee",
    "Ultra Milk",
    "Yakult",
    "Mizone",
    "Frestea",
    "Ale-Ale",
    "Okky Jelly Drink",
    "Big Cola",
    "Club",
    "S-Tee",
    "Tebs",
];

/// Packaging variants with a price addon in rupiah
const PACKS: &[(&str, i64)] = &[
    ("250ml", 0),
    ("330ml", 500),
    ("600ml", 1_500),
    ("1L", 4_000),
    ("1.5L", 6_000),
    ("crate-12", 30_000),
    ("crate-24", 55_000),
    ("carton-6", 18_000),
    ("carton-12", 32_000),
    ("gallon", 12_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./tukar_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
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
                println!("Tukar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./tukar_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tukar Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("Connected to database, migrations applied");

    // Check existing products
    let existing = db.products().list_active().await?;
    if !existing.is_empty() {
        println!("Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Generate products
    println!();
    println!("Generating products...");

    let mut generated = 0;
    let mut first_products: Vec<Product> = Vec::new();
    let start = std::time::Instant::now();

    'outer: for (brand_idx, brand) in BRANDS.iter().enumerate() {
        for (pack_idx, (pack, price_addon)) in PACKS.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }

            let product = generate_product(brand, pack, *price_addon, brand_idx * 10 + pack_idx);

            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.sku, e);
                continue;
            }

            if first_products.len() < 3 {
                first_products.push(product);
            }

            generated += 1;

            if generated % 50 == 0 {
                println!("  Generated {} products...", generated);
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("Generated {} products in {:?}", generated, elapsed);

    // Demo invoice over the first few products, so the exchange forms
    // have lines to substitute right away.
    println!();
    println!("Creating demo invoice...");

    let invoice = seed_invoice(&db, &first_products).await?;
    println!("  Invoice {} with {} lines", invoice.code, first_products.len());

    println!();
    println!("Seed complete!");

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(brand: &str, pack: &str, price_addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    // Unique SKU from brand initials and packaging
    let initials: String = brand
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:03}", initials, pack.to_uppercase(), seed);

    // Cost: base Rp2.000 - Rp9.999 + packaging addon
    let cost_rupiah = 2_000 + ((seed * 317) % 8_000) as i64 + price_addon;

    // Selling price: 10-25% margin; every fifth product has no price set
    // and falls back to cost in exchange math
    let margin_pct = 10 + (seed % 16) as i64;
    let selling_price_rupiah = if seed % 5 == 4 {
        None
    } else {
        Some(cost_rupiah + cost_rupiah * margin_pct / 100)
    };

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} {}", brand, pack),
        cost_rupiah,
        selling_price_rupiah,
        current_stock: (seed % 101) as i64,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Inserts a demo invoice billing a few units of each given product.
async fn seed_invoice(db: &Database, products: &[Product]) -> Result<Invoice, Box<dyn std::error::Error>> {
    let now = Utc::now();

    let mut subtotal = 0;
    let mut lines = Vec::with_capacity(products.len());
    for (idx, product) in products.iter().enumerate() {
        let quantity = (idx as i64 + 1) * 5;
        let unit_price = product.selling_price_rupiah.unwrap_or(product.cost_rupiah);
        subtotal += unit_price * quantity;
        lines.push(InvoiceLine {
            id: Uuid::new_v4().to_string(),
            invoice_id: String::new(), // filled below
            product_id: product.id.clone(),
            quantity,
            unit_price_rupiah: unit_price,
            unit_cost_rupiah: product.cost_rupiah,
            created_at: now,
        });
    }

    let shipping = 15_000;
    let discount_bps = 500; // 5%
    let discount = subtotal * discount_bps / 10_000;

    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        code: format!("INV-{}-0001", now.format("%Y%m%d")),
        customer_name: "Toko Sumber Rejeki".to_string(),
        subtotal_rupiah: subtotal,
        discount_kind: DiscountKind::Percentage,
        discount_value: discount_bps,
        shipping_rupiah: shipping,
        total_rupiah: subtotal - discount + shipping,
        created_at: now,
        updated_at: now,
    };

    db.invoices().insert(&invoice).await?;
    for mut line in lines {
        line.invoice_id = invoice.id.clone();
        db.invoices().insert_line(&line).await?;
    }

    Ok(invoice)
}
