//! CLI `re-embed` command: regenerate all query vectors with the current provider.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use slp::config::SlpConfig;
use slp::db;
use slp::embedding;
use slp::program::embedding_to_bytes;

/// Re-embed the query text of every live program with the configured provider.
pub async fn re_embed(config: &SlpConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let mut conn = db::open_database(&db_path).context("failed to open database")?;

    let provider: Arc<dyn embedding::EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );
    let model_id = provider.model_id().to_string();

    let programs: Vec<(String, String)> = {
        let mut stmt = conn.prepare(
            "SELECT id, query_text FROM latent_programs WHERE status != 'retired'",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let total = programs.len();
    if total == 0 {
        db::migrations::set_embedding_model(&conn, &model_id)?;
        println!("No programs to re-embed. Model set to '{model_id}'.");
        return Ok(());
    }

    println!("Re-embedding {total} programs with model '{model_id}'...");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    const BATCH_SIZE: usize = 32;
    for chunk in programs.chunks(BATCH_SIZE) {
        let texts: Vec<String> = chunk.iter().map(|(_, query)| query.clone()).collect();
        let provider = Arc::clone(&provider);

        let embeddings = tokio::task::spawn_blocking(move || {
            let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
            provider.embed_batch(&text_refs)
        })
        .await?
        .context("embedding batch failed")?;

        let tx = conn.transaction()?;
        for ((id, _), emb) in chunk.iter().zip(embeddings.iter()) {
            tx.execute("DELETE FROM programs_vec WHERE id = ?1", [id])?;
            tx.execute(
                "INSERT INTO programs_vec (id, embedding) VALUES (?1, ?2)",
                rusqlite::params![id, embedding_to_bytes(emb)],
            )?;
        }
        tx.commit()?;

        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();

    db::migrations::set_embedding_model(&conn, &model_id)?;

    println!("Re-embedded {total} programs with model '{model_id}'.");
    Ok(())
}
