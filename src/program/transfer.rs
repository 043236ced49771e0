//! JSON export and import of the program store.
//!
//! Vectors are not exported: import re-embeds each program's query text with
//! the current provider, so a dump moves cleanly between embedding models.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::store::{import_program, list_programs};
use super::types::LatentProgram;
use crate::db::migrations;
use crate::embedding::EmbeddingProvider;

const BATCH_SIZE: usize = 32;

/// Export format.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub exported_at: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    pub programs: Vec<LatentProgram>,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Already present by ID, or a live program already owns the signature.
    pub skipped: usize,
}

/// Every program, oldest first.
pub fn export_programs(conn: &Connection) -> Result<ExportData> {
    let mut programs = list_programs(conn, None, usize::MAX)?;
    programs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(ExportData {
        exported_at: chrono::Utc::now().to_rfc3339(),
        embedding_model: migrations::get_embedding_model(conn)?,
        programs,
    })
}

/// Import programs verbatim, re-embedding their query text.
pub fn import_programs(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    data: &ExportData,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for chunk in data.programs.chunks(BATCH_SIZE) {
        let texts: Vec<&str> = chunk.iter().map(|p| p.query_text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts)?;

        for (program, embedding) in chunk.iter().zip(embeddings.iter()) {
            if import_program(conn, program, embedding)? {
                summary.imported += 1;
            } else {
                summary.skipped += 1;
            }
        }
    }

    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "import complete"
    );
    Ok(summary)
}
