//! # Seed Data Generator
//!
//! Populates a development database with sample medications, intake
//! history and a diary entry, then prints a JSON summary.
//!
//! ## Usage
//! ```bash
//! # Seed ./pillbox_dev.db
//! cargo run -p pillbox-db --bin seed
//!
//! # Specify database path
//! cargo run -p pillbox-db --bin seed -- --db ./data/pillbox.db
//!
//! # Use the configured database (pillbox.toml / PILLBOX_DB_PATH)
//! cargo run -p pillbox-db --bin seed -- --from-config
//! ```

use std::env;

use pillbox_core::{DosageForm, IntakeRecord, MedicationColor, MedicationRecord, StockLevel};
use pillbox_db::config::DEFAULT_LOG_FILTER;
use pillbox_db::{AppConfig, Database, DbConfig, InsertOutcome};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// (name, color, form, total, remaining, dosage, threshold)
const MEDICATIONS: &[(&str, MedicationColor, DosageForm, u32, u32, u32, u32)] = &[
    ("Aspirin 100mg", MedicationColor::White, DosageForm::Tablet, 30, 22, 1, 5),
    ("Metformin 500mg", MedicationColor::White, DosageForm::Tablet, 60, 4, 2, 6),
    ("Omega-3", MedicationColor::Yellow, DosageForm::Capsule, 90, 71, 1, 10),
    ("Vitamin D3", MedicationColor::Orange, DosageForm::Liquid, 20, 0, 1, 3),
    ("Amlodipine 5mg", MedicationColor::Pink, DosageForm::Tablet, 28, 12, 1, 5),
    ("Cough Syrup", MedicationColor::Brown, DosageForm::Liquid, 10, 9, 1, 2),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./pillbox_dev.db");
    let mut from_config = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--from-config" => from_config = true,
            "--help" | "-h" => {
                println!("Pillbox Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pillbox_dev.db)");
                println!("      --from-config  Use the database from pillbox.toml");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let app_config = AppConfig::load_or_default(None);
    init_logging(&app_config.logging.filter);

    let config = if from_config {
        app_config.to_db_config()
    } else {
        DbConfig::new(&db_path)
    };
    let path = config.database_path.display().to_string();
    let db = Database::new(config).await?;
    info!(path = %path, "Connected to database");

    let existing = db.medications().count().next().await.unwrap_or(0);
    if existing > 0 {
        warn!(existing, "Database already has medications, skipping seed");
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "database": path, "skipped": true, "existing": existing }))?
        );
        db.close().await;
        return Ok(());
    }

    let medications = db.medications();
    let mut seeded = Vec::new();

    for &(name, color, form, total, remaining, dosage, threshold) in MEDICATIONS {
        let mut record = MedicationRecord::new(name, color, form);
        record.total_quantity = total;
        record.remaining_quantity = remaining;
        record.dosage_per_intake = dosage;
        record.low_stock_threshold = threshold;
        let stock_level = record.stock_level();

        match medications.insert(record, false).await {
            InsertOutcome::Success(id) => seeded.push((id, name, stock_level)),
            InsertOutcome::DuplicateFound(name) => warn!(name = %name, "Already present"),
            InsertOutcome::Error(e) => warn!(name = %name, error = %e, "Failed to insert"),
        }
    }

    // Historical intakes for the first medication, then one live dose
    let intake = db.intake_records();
    let now = chrono::Utc::now().timestamp_millis();
    let mut intakes = 0;
    for hours_ago in [72, 48, 24] {
        let record = IntakeRecord::new(MEDICATIONS[0].0, now - hours_ago * HOUR_MS, 1);
        match intake.add(record).await {
            Ok(_) => intakes += 1,
            Err(e) => warn!(error = %e, "Failed to add intake record"),
        }
    }
    if let Some(&(id, _, _)) = seeded.first() {
        match medications.take_dose(id).await {
            Ok(dose) => {
                intakes += 1;
                info!(remaining = dose.remaining, "Dose taken");
            }
            Err(e) => warn!(error = %e, "Failed to take dose"),
        }
    }

    let user_id = db.users().create("demo", Some("Demo User".to_string())).await?;
    let diary_id = db
        .health_diary()
        .add(user_id, "Blood pressure 128/82 this morning. Slept well.")
        .await?;

    let refill = db.medications().needing_refill(20).next().await.unwrap_or_default();
    let summary = json!({
        "database": path,
        "medications": seeded
            .iter()
            .map(|(id, name, level)| json!({ "id": id, "name": name, "stock": stock_label(*level) }))
            .collect::<Vec<_>>(),
        "intake_records": intakes,
        "needing_refill": refill.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        "user_id": user_id,
        "diary_entry_id": diary_id,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    Ok(())
}

fn init_logging(configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn stock_label(level: StockLevel) -> &'static str {
    match level {
        StockLevel::Sufficient => "sufficient",
        StockLevel::Low => "low",
        StockLevel::OutOfStock => "out_of_stock",
    }
}
