//! SQL DDL for all SLP tables.
//!
//! Defines `latent_programs`, `programs_vec` (vec0), `program_executions`,
//! `program_lookups`, `program_log`, and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the program store.
const SCHEMA_SQL: &str = r#"
-- Captured latent programs
CREATE TABLE IF NOT EXISTS latent_programs (
    id TEXT PRIMARY KEY,
    signature_hash TEXT NOT NULL,
    primary_intent TEXT NOT NULL,
    signature TEXT NOT NULL,
    query_text TEXT NOT NULL,
    config TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'experimental' CHECK(status IN ('experimental','active','retired')),
    version INTEGER NOT NULL DEFAULT 1,
    parent_id TEXT,
    usage_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0.0 CHECK(success_rate >= 0.0 AND success_rate <= 1.0),
    avg_latency_ms REAL NOT NULL DEFAULT 0.0,
    avg_token_count REAL NOT NULL DEFAULT 0.0,
    avg_quality REAL NOT NULL DEFAULT 0.0,
    feedback_score REAL,
    feedback_count INTEGER NOT NULL DEFAULT 0,
    confidence REAL NOT NULL DEFAULT 0.5 CHECK(confidence >= 0.0 AND confidence <= 1.0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_used TEXT
);

CREATE INDEX IF NOT EXISTS idx_programs_intent ON latent_programs(primary_intent);
CREATE INDEX IF NOT EXISTS idx_programs_status ON latent_programs(status);
CREATE INDEX IF NOT EXISTS idx_programs_confidence ON latent_programs(confidence);

-- One live owner per signature
CREATE UNIQUE INDEX IF NOT EXISTS idx_programs_owner
    ON latent_programs(signature_hash) WHERE status != 'retired';

-- Reported executions of a program
CREATE TABLE IF NOT EXISTS program_executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id TEXT NOT NULL REFERENCES latent_programs(id) ON DELETE CASCADE,
    success INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL,
    token_count INTEGER NOT NULL,
    quality_score REAL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_executions_program ON program_executions(program_id);

-- Lookup outcomes, for hit-rate accounting
CREATE TABLE IF NOT EXISTS program_lookups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signature_hash TEXT NOT NULL,
    program_id TEXT,
    similarity REAL,
    created_at TEXT NOT NULL
);

-- Audit log
CREATE TABLE IF NOT EXISTS program_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('create','update','supersede','promote','retire','decay','evict','delete','feedback')),
    program_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS programs_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[384]
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(VEC_TABLE_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
