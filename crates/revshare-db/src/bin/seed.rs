//! # Seed Data Generator
//!
//! Populates the database with development data: the built-in roles come
//! from migrations; this adds users, sites, products, distribution rules,
//! and a handful of recorded transactions.
//!
//! ## Usage
//! ```bash
//! # Default database path
//! cargo run -p revshare-db --bin seed
//!
//! # Specify database path
//! cargo run -p revshare-db --bin seed -- --db ./data/revshare.db
//! ```

use chrono::{NaiveDate, Utc};
use std::env;
use uuid::Uuid;

use revshare_core::access::Actor;
use revshare_core::rules::NewRule;
use revshare_core::tier::{Share, TierShares};
use revshare_core::types::{Product, RegionType, Site, SiteStatus, SiteType, User};
use revshare_db::{Database, DbConfig};

const SITES: &[(&str, &str, SiteType)] = &[
    ("SITE-001", "Sunrise Care Facility", SiteType::CareFacility),
    ("SITE-002", "Riverside Senior Center", SiteType::SeniorCenter),
    ("SITE-003", "St. Jude General Hospital", SiteType::Hospital),
    ("SITE-004", "Hillcrest Care Facility", SiteType::CareFacility),
    ("SITE-005", "Lakeview Hospital", SiteType::Hospital),
];

/// (code, name, cost_qty, cost_unit, supply, sale, deposit)
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64, i64)] = &[
    ("MAT-100", "Pressure Relief Mattress", 10, 45_000, 70_000, 95_000, 20_000),
    ("BED-200", "Adjustable Care Bed", 5, 180_000, 260_000, 320_000, 50_000),
    ("LFT-300", "Patient Lift", 2, 320_000, 450_000, 550_000, 80_000),
    ("WCH-400", "Standard Wheelchair", 20, 28_000, 42_000, 55_000, 10_000),
    ("OXY-500", "Oxygen Concentrator", 4, 95_000, 140_000, 175_000, 30_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./revshare_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Revenue Distribution Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./revshare_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Revenue Distribution Seed Data Generator");
    println!("===========================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied (roles and permissions seeded)");

    // Check existing data
    let existing = db.catalog().list_active_products().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let grants = db.access().load_grants().await?;
    let admin = Actor::new("seed-admin", "hq_admin");
    let now = Utc::now();

    // Users, one per built-in role
    println!();
    println!("Creating users...");
    for role in ["hq_admin", "regional_manager", "branch_operator", "site_coordinator", "viewer"] {
        db.access()
            .insert_user(&User {
                id: Uuid::new_v4().to_string(),
                email: format!("{role}@example.com"),
                role: Some(role.to_string()),
                is_active: true,
                created_at: now,
            })
            .await?;
    }
    println!("✓ 5 users created");

    // Sites
    println!("Creating sites...");
    let mut site_ids = Vec::new();
    for (code, name, site_type) in SITES {
        let site = Site {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            site_type: *site_type,
            address: None,
            contact_name: None,
            contact_phone: None,
            population: Some(120),
            rooms: Some(60),
            beds: Some(80),
            contract_start: NaiveDate::from_ymd_opt(2024, 1, 1),
            contract_end: None,
            status: SiteStatus::Active,
            created_at: now,
            updated_at: now,
        };
        db.catalog().insert_site(&site, &admin, &grants).await?;
        site_ids.push(site.id);
    }
    println!("✓ {} sites created", SITES.len());

    // Products
    println!("Creating products...");
    let mut product_ids = Vec::new();
    for (code, name, cost_qty, cost_unit, supply, sale, deposit) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            cost_qty: *cost_qty,
            cost_unit_cents: *cost_unit,
            cost_total_cents: 0,
            supply_cents: *supply,
            sale_cents: *sale,
            deposit_cents: *deposit,
            one_time_fee: false,
            default_rule_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let stored = db.catalog().insert_product(&product, &admin, &grants).await?;
        product_ids.push(stored.id);
    }
    println!("✓ {} products created", PRODUCTS.len());

    // Distribution rules: a company-wide default plus a hospital split
    println!("Creating distribution rules...");
    db.rules()
        .create(
            NewRule {
                name: "company default".to_string(),
                product_id: None,
                site_type: None,
                region_type: RegionType::Nationwide,
                shares: TierShares {
                    factory: Share::from_bps(3000),
                    hq: Share::from_bps(300),
                    regional: Share::from_bps(2500),
                    branch: Share::from_bps(200),
                    nationwide: Share::from_bps(200),
                    local: Share::from_bps(300),
                    area: Share::from_bps(500),
                    hospital: Share::from_bps(3000),
                },
                applies_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                applies_to: None,
            },
            &admin,
            &grants,
        )
        .await?;
    db.rules()
        .create(
            NewRule {
                name: "hospital split".to_string(),
                product_id: None,
                site_type: Some(SiteType::Hospital),
                region_type: RegionType::Nationwide,
                shares: TierShares {
                    factory: Share::from_bps(2500),
                    hq: Share::from_bps(500),
                    regional: Share::from_bps(2000),
                    branch: Share::from_bps(500),
                    nationwide: Share::from_bps(200),
                    local: Share::from_bps(300),
                    area: Share::from_bps(500),
                    hospital: Share::from_bps(3500),
                },
                applies_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                applies_to: None,
            },
            &admin,
            &grants,
        )
        .await?;
    println!("✓ 2 distribution rules created");

    // A few recorded sales across sites and products
    println!("Recording sample transactions...");
    let operator = Actor::new("seed-operator", "branch_operator");
    let mut recorded = 0;
    for (i, site_id) in site_ids.iter().enumerate() {
        let product_id = &product_ids[i % product_ids.len()];
        let on = NaiveDate::from_ymd_opt(2024, 6, 1 + i as u32).unwrap();
        db.ledger()
            .record_site_sale(site_id, product_id, 1 + i as i64, RegionType::Branch, on, &operator)
            .await?;
        recorded += 1;
    }
    println!("✓ {} transactions recorded", recorded);

    // Summary
    let totals = db
        .ledger()
        .tier_totals_between(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .await?;
    println!();
    println!("Tier totals for 2024:");
    for (tier, amount) in totals.iter() {
        println!("  {:<12} {:>14}", tier.name(), amount.to_string());
    }
    println!("  {:<12} {:>14}", "TOTAL", totals.total().to_string());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
