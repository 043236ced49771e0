#![allow(dead_code)]

use rusqlite::Connection;
use slp::db;
use slp::program::embedding_to_bytes;
use slp::program::types::{ExecutionOutcome, NewProgram, ProgramConfig};
use slp::signature::{generate_signature, ProgramSignature, QueryContext};

/// Default dedup threshold used by capture.
pub const DEDUP_SIMILARITY: f64 = 0.97;
/// Default semantic weight used by lookup and dedup.
pub const SEMANTIC_WEIGHT: f64 = 0.30;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Generate a deterministic 384-dim embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[seed as usize % 384] = 1.0;
    v
}

/// Generate an embedding similar to `base` with small perturbation.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..5 {
        v[(i * 37) % 384] += 0.05;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Signature of a bare query with no documents.
pub fn signature(query: &str) -> ProgramSignature {
    generate_signature(query, &QueryContext::default(), None).unwrap()
}

pub fn program_config(template: &str) -> ProgramConfig {
    ProgramConfig {
        prompt_template: template.to_string(),
        ..ProgramConfig::default()
    }
}

/// Insert a program directly via the store module. Returns the program ID.
pub fn insert_program(
    conn: &mut Connection,
    query: &str,
    confidence: f64,
    embedding: &[f32],
) -> String {
    insert_with(conn, &signature(query), query, confidence, embedding, None)
}

/// Insert with an explicit signature and optional supersession target.
pub fn insert_with(
    conn: &mut Connection,
    sig: &ProgramSignature,
    query: &str,
    confidence: f64,
    embedding: &[f32],
    supersedes: Option<&str>,
) -> String {
    let config = program_config(&format!("Answer: {query}"));
    slp::program::store::store_program(
        conn,
        &NewProgram {
            signature: sig,
            query_text: query,
            config: &config,
            confidence,
            supersedes,
        },
        embedding,
        DEDUP_SIMILARITY,
        SEMANTIC_WEIGHT,
    )
    .unwrap()
    .id
}

pub fn outcome(success: bool) -> ExecutionOutcome {
    ExecutionOutcome {
        success,
        latency_ms: 800,
        token_count: 250,
        quality_score: Some(if success { 0.9 } else { 0.2 }),
    }
}

/// Backdate a program's timestamps by `days`.
pub fn backdate(conn: &Connection, id: &str, days: i64) {
    let ts = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
    conn.execute(
        "UPDATE latent_programs SET created_at = ?1, updated_at = ?1, \
         last_used = CASE WHEN last_used IS NULL THEN NULL ELSE ?1 END WHERE id = ?2",
        rusqlite::params![ts, id],
    )
    .unwrap();
}

pub fn status_of(conn: &Connection, id: &str) -> String {
    conn.query_row(
        "SELECT status FROM latent_programs WHERE id = ?1",
        [id],
        |row| row.get(0),
    )
    .unwrap()
}

/// Convert embedding to raw bytes (convenience wrapper for tests).
pub fn emb_bytes(embedding: &[f32]) -> &[u8] {
    embedding_to_bytes(embedding)
}
