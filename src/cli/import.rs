use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use slp::config::SlpConfig;
use slp::program::transfer::{import_programs, ExportData};

/// Import programs from a JSON file produced by `slp export`.
///
/// Re-embeds each program's query with the configured provider. Skips programs
/// whose ID already exists or whose signature already has a live owner.
pub async fn import(config: &SlpConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ExportData =
        serde_json::from_str(&json).context("failed to parse import JSON")?;

    let db_path = config.resolved_db_path();
    let mut conn = slp::db::open_database(&db_path)?;

    let provider: Arc<dyn slp::embedding::EmbeddingProvider> =
        Arc::from(slp::embedding::create_provider(&config.embedding)?);

    println!("Importing {} programs...", data.programs.len());

    // Embedding inference and SQLite writes are blocking work
    let summary = tokio::task::spawn_blocking(move || {
        import_programs(&mut conn, provider.as_ref(), &data)
    })
    .await??;

    println!("Import complete:");
    println!("  Programs imported: {}", summary.imported);
    println!("  Programs skipped:  {} (already present or signature owned)", summary.skipped);

    Ok(())
}
