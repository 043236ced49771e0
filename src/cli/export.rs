use anyhow::Result;

use slp::config::SlpConfig;
use slp::program::transfer::export_programs;

/// Export all programs as JSON to stdout.
pub fn export(config: &SlpConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = slp::db::open_database(&db_path)?;

    let data = export_programs(&conn)?;

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!("Exported {} programs.", data.programs.len());

    Ok(())
}
