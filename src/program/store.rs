//! Write path: ownership check, deduplication, storage, supersession, and audit logging.
//!
//! [`store_program`] is the capture entry point. It runs the full pipeline inside a
//! transaction: signature-owner check, near-duplicate check, optional supersession of
//! a parent program, insert into `latent_programs`, insert the query vector, and write
//! an audit log entry.

use anyhow::{bail, Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;

use super::search::score_candidates;
use super::types::{LatentProgram, NewProgram, ProgramStatus};

/// Confidence added to an existing program when a capture lands on it.
const DEDUP_CONFIDENCE_BOOST: f64 = 0.05;

/// Near-duplicate candidates examined during capture.
const DEDUP_CANDIDATES: usize = 20;

/// Column list matching [`row_to_program`].
pub(crate) const PROGRAM_COLUMNS: &str = "id, signature, query_text, config, status, version, \
     parent_id, usage_count, success_count, success_rate, avg_latency_ms, avg_token_count, \
     avg_quality, feedback_score, feedback_count, confidence, created_at, updated_at, last_used";

/// Result returned from a store operation.
#[derive(Debug, Clone, Serialize)]
pub struct StoreProgramResult {
    /// ID of the stored program, or of the existing program the capture landed on.
    pub id: String,
    /// `true` if an existing owner or near-duplicate was refreshed instead of inserting.
    pub deduplicated: bool,
    /// ID of the program retired in favor of this one, if any.
    pub superseded: Option<String>,
    pub version: u32,
}

/// Full write path: owner check → dedup check → supersede → insert → vec insert → audit log.
///
/// `semantic_weight` must match the one used for lookups so dedup and matching
/// agree on what "similar" means.
pub fn store_program(
    conn: &mut Connection,
    program: &NewProgram<'_>,
    embedding: &[f32],
    dedup_similarity: f64,
    semantic_weight: f64,
) -> Result<StoreProgramResult> {
    let tx = conn.transaction()?;
    let supersedes = program.supersedes;

    // 1. Signature owner gate
    let owner = find_owner(&tx, &program.signature.signature_hash)?;
    if let Some((owner_id, owner_version)) = owner.as_ref() {
        if Some(owner_id.as_str()) != supersedes {
            refresh_existing(&tx, owner_id, "signature_owner")?;
            tx.commit()?;
            tracing::debug!(program_id = %owner_id, "capture landed on signature owner");
            return Ok(StoreProgramResult {
                id: owner_id.clone(),
                deduplicated: true,
                superseded: None,
                version: *owner_version,
            });
        }
    }

    // 2. Near-duplicate gate
    let candidates = score_candidates(
        &tx,
        program.signature,
        embedding,
        semantic_weight,
        DEDUP_CANDIDATES,
    )?;
    if let Some(dup) = candidates
        .iter()
        .filter(|c| Some(c.program.id.as_str()) != supersedes)
        .find(|c| c.similarity >= dedup_similarity)
    {
        refresh_existing(&tx, &dup.program.id, "near_duplicate")?;
        tx.commit()?;
        tracing::debug!(
            program_id = %dup.program.id,
            similarity = dup.similarity,
            "capture landed on near-duplicate"
        );
        return Ok(StoreProgramResult {
            id: dup.program.id.clone(),
            deduplicated: true,
            superseded: None,
            version: dup.program.version,
        });
    }

    let id = uuid::Uuid::now_v7().to_string();

    // 3. Supersession: retire the parent first so its signature is free
    let version = match supersedes {
        Some(parent_id) => {
            let parent_version = retire_for_supersession(&tx, parent_id, &id)?;
            parent_version + 1
        }
        None => 1,
    };

    // 4. Insert program row
    insert_program(&tx, &id, program, version)?;

    // 5. Insert query vector
    insert_vec(&tx, &id, embedding)?;

    // 6. Audit
    write_audit_log(
        &tx,
        "create",
        &id,
        Some(&serde_json::json!({
            "intent": program.signature.primary_intent.as_str(),
            "version": version,
        })),
    )?;

    tx.commit()?;

    Ok(StoreProgramResult {
        id,
        deduplicated: false,
        superseded: supersedes.map(String::from),
        version,
    })
}

/// Insert a complete program record as-is (used by import).
///
/// Returns `false` without writing when the ID exists or a live program already
/// owns the signature.
pub fn import_program(
    conn: &mut Connection,
    program: &LatentProgram,
    embedding: &[f32],
) -> Result<bool> {
    let tx = conn.transaction()?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM latent_programs WHERE id = ?1",
        params![program.id],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }
    if program.status.is_live() && find_owner(&tx, &program.signature.signature_hash)?.is_some() {
        return Ok(false);
    }

    tx.execute(
        &format!(
            "INSERT INTO latent_programs (signature_hash, primary_intent, {PROGRAM_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            program.signature.signature_hash,
            program.signature.primary_intent.as_str(),
            program.id,
            serde_json::to_string(&program.signature)?,
            program.query_text,
            serde_json::to_string(&program.config)?,
            program.status.as_str(),
            program.version,
            program.parent_id,
            program.usage_count,
            program.success_count,
            program.success_rate.clamp(0.0, 1.0),
            program.avg_latency_ms,
            program.avg_token_count,
            program.avg_quality,
            program.feedback_score,
            program.feedback_count,
            program.confidence.clamp(0.0, 1.0),
            program.created_at,
            program.updated_at,
            program.last_used,
        ],
    )?;
    if program.status.is_live() {
        insert_vec(&tx, &program.id, embedding)?;
    }
    write_audit_log(
        &tx,
        "create",
        &program.id,
        Some(&serde_json::json!({"reason": "import"})),
    )?;

    tx.commit()?;
    Ok(true)
}

/// Fetch one program by ID.
pub fn get_program(conn: &Connection, program_id: &str) -> Result<Option<LatentProgram>> {
    let program = conn
        .query_row(
            &format!("SELECT {PROGRAM_COLUMNS} FROM latent_programs WHERE id = ?1"),
            params![program_id],
            row_to_program,
        )
        .optional()?;
    Ok(program)
}

/// List programs, most recently updated first.
pub fn list_programs(
    conn: &Connection,
    status: Option<ProgramStatus>,
    limit: usize,
) -> Result<Vec<LatentProgram>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let programs = match status {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROGRAM_COLUMNS} FROM latent_programs WHERE status = ?1 \
                 ORDER BY updated_at DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![status.as_str(), limit], row_to_program)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROGRAM_COLUMNS} FROM latent_programs ORDER BY updated_at DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], row_to_program)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(programs)
}

/// Map a row selected with [`PROGRAM_COLUMNS`] to a [`LatentProgram`].
pub(crate) fn row_to_program(row: &Row<'_>) -> rusqlite::Result<LatentProgram> {
    let signature_json: String = row.get(1)?;
    let config_json: String = row.get(3)?;
    let status_str: String = row.get(4)?;

    Ok(LatentProgram {
        id: row.get(0)?,
        signature: serde_json::from_str(&signature_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        query_text: row.get(2)?,
        config: serde_json::from_str(&config_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        status: status_str
            .parse()
            .map_err(|_| rusqlite::Error::InvalidColumnType(4, "status".into(), Type::Text))?,
        version: row.get(5)?,
        parent_id: row.get(6)?,
        usage_count: row.get(7)?,
        success_count: row.get(8)?,
        success_rate: row.get(9)?,
        avg_latency_ms: row.get(10)?,
        avg_token_count: row.get(11)?,
        avg_quality: row.get(12)?,
        feedback_score: row.get(13)?,
        feedback_count: row.get(14)?,
        confidence: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        last_used: row.get(18)?,
    })
}

/// The live program owning a signature hash, with its version.
fn find_owner(conn: &Connection, signature_hash: &str) -> Result<Option<(String, u32)>> {
    let owner = conn
        .query_row(
            "SELECT id, version FROM latent_programs \
             WHERE signature_hash = ?1 AND status != 'retired'",
            params![signature_hash],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(owner)
}

/// Bump an existing program's confidence when a capture lands on it.
fn refresh_existing(tx: &Transaction, program_id: &str, reason: &str) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE latent_programs SET updated_at = ?1, confidence = MIN(confidence + ?2, 1.0) \
         WHERE id = ?3",
        params![now, DEDUP_CONFIDENCE_BOOST, program_id],
    )?;
    write_audit_log(
        tx,
        "update",
        program_id,
        Some(&serde_json::json!({"reason": reason})),
    )?;
    Ok(())
}

/// Retire `parent_id` in favor of `new_id`. Returns the parent's version.
fn retire_for_supersession(tx: &Transaction, parent_id: &str, new_id: &str) -> Result<u32> {
    let version: Option<u32> = tx
        .query_row(
            "SELECT version FROM latent_programs WHERE id = ?1",
            params![parent_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(version) = version else {
        bail!("supersedes target not found: {parent_id}");
    };

    tx.execute(
        "UPDATE latent_programs SET status = 'retired', updated_at = ?1 WHERE id = ?2",
        params![chrono::Utc::now().to_rfc3339(), parent_id],
    )?;
    drop_vector(tx, parent_id)?;
    write_audit_log(
        tx,
        "supersede",
        parent_id,
        Some(&serde_json::json!({"superseded_by": new_id})),
    )?;
    Ok(version)
}

fn insert_program(
    tx: &Transaction,
    id: &str,
    program: &NewProgram<'_>,
    version: u32,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let signature_json =
        serde_json::to_string(program.signature).context("failed to serialize signature")?;
    let config_json =
        serde_json::to_string(program.config).context("failed to serialize program config")?;

    tx.execute(
        "INSERT INTO latent_programs (id, signature_hash, primary_intent, signature, query_text, \
         config, status, version, parent_id, confidence, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'experimental', ?7, ?8, ?9, ?10, ?10)",
        params![
            id,
            program.signature.signature_hash,
            program.signature.primary_intent.as_str(),
            signature_json,
            program.query_text,
            config_json,
            version,
            program.supersedes,
            program.confidence.clamp(0.0, 1.0),
            now,
        ],
    )?;
    Ok(())
}

/// Insert a query vector into the vec0 virtual table.
fn insert_vec(tx: &Transaction, id: &str, embedding: &[f32]) -> Result<()> {
    tx.execute(
        "INSERT INTO programs_vec (id, embedding) VALUES (?1, ?2)",
        params![id, super::embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

/// Remove a program's query vector. Retired programs keep no vector so they
/// never occupy KNN slots.
pub(crate) fn drop_vector(conn: &Connection, program_id: &str) -> Result<()> {
    conn.execute("DELETE FROM programs_vec WHERE id = ?1", params![program_id])?;
    Ok(())
}

/// Write an entry to the program_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    program_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO program_log (operation, program_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, program_id, details_json, now],
    )?;
    Ok(())
}
