use anyhow::Result;

use slp::config::SlpConfig;
use slp::program::store::list_programs;
use slp::program::truncate_preview;
use slp::program::types::ProgramStatus;

/// List stored programs, most recently updated first.
pub fn list(config: &SlpConfig, status: Option<ProgramStatus>, limit: usize) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = slp::db::open_database(&db_path)?;

    let programs = list_programs(&conn, status, limit)?;
    if programs.is_empty() {
        println!("No programs found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<13} {:<18} {:>5} {:>7} {:>6}  {}",
        "ID", "Status", "Intent", "Uses", "Success", "Conf", "Query"
    );
    println!("{}", "-".repeat(120));
    for p in &programs {
        println!(
            "{:<38} {:<13} {:<18} {:>5} {:>6.0}% {:>6.2}  {}",
            p.id,
            p.status,
            p.signature.primary_intent,
            p.usage_count,
            p.success_rate * 100.0,
            p.confidence,
            truncate_preview(&p.query_text, 40),
        );
    }
    Ok(())
}
