//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use slp::config::SlpConfig;
use slp::db;
use slp::embedding::configured_model_id;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &SlpConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `slp serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn).context("failed to run health check")?;
    let configured = configured_model_id(&config.embedding);

    println!("SLP Health Report");
    println!("=================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!(
        "  Stored:          {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Configured:      {configured} ({})", config.embedding.provider);
    if let Some(ref stored) = report.embedding_model {
        if stored != configured {
            println!("  WARNING: model mismatch! Run `slp re-embed` to update vectors.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Row counts:");
    println!("  Programs:        {}", report.program_count);
    println!("  Live programs:   {}", report.live_program_count);
    println!("  Vectors:         {}", report.vector_count);
    println!("  Executions:      {}", report.execution_count);
    println!("  Audit log:       {}", report.log_count);
    if report.vector_count != report.live_program_count {
        println!("  WARNING: vector count differs from live program count. Run `slp re-embed`.");
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or export from a good copy and import into a fresh database:");
        println!("     slp export > backup.json");
        println!("     SLP_DB=/tmp/fresh.db slp import backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
