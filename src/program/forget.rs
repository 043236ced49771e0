//! Explicit program removal.
//!
//! Retiring keeps the row (and its history) but frees the signature for a new
//! owner. Hard delete removes the program row and its vector; execution rows
//! cascade via the foreign key.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::store::{drop_vector, write_audit_log};

/// Result returned from a forget operation.
#[derive(Debug, Serialize)]
pub struct ForgetResult {
    pub id: String,
    /// `true` if the program was permanently removed; `false` when retired.
    pub hard_deleted: bool,
}

/// Retire or permanently delete a program by ID.
pub fn forget_program(
    conn: &mut Connection,
    program_id: &str,
    reason: Option<&str>,
    hard_delete: bool,
) -> Result<ForgetResult> {
    if hard_delete {
        delete_program(conn, program_id, reason)
    } else {
        retire_program(conn, program_id, reason)
    }
}

/// Mark a program retired. Retiring an already-retired program is a no-op.
pub fn retire_program(
    conn: &mut Connection,
    program_id: &str,
    reason: Option<&str>,
) -> Result<ForgetResult> {
    let tx = conn.transaction()?;

    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM latent_programs WHERE id = ?1",
            params![program_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(status) = status else {
        bail!("program not found: {program_id}");
    };

    if status != "retired" {
        tx.execute(
            "UPDATE latent_programs SET status = 'retired', updated_at = ?1 WHERE id = ?2",
            params![chrono::Utc::now().to_rfc3339(), program_id],
        )?;
        drop_vector(&tx, program_id)?;
        write_audit_log(
            &tx,
            "retire",
            program_id,
            Some(&serde_json::json!({"reason": reason, "manual": true})),
        )?;
    }

    tx.commit()?;
    Ok(ForgetResult {
        id: program_id.to_string(),
        hard_deleted: false,
    })
}

/// Permanently remove a program.
pub fn delete_program(
    conn: &mut Connection,
    program_id: &str,
    reason: Option<&str>,
) -> Result<ForgetResult> {
    let tx = conn.transaction()?;
    if !hard_delete(&tx, program_id, "delete", reason)? {
        bail!("program not found: {program_id}");
    }
    tx.commit()?;
    Ok(ForgetResult {
        id: program_id.to_string(),
        hard_deleted: true,
    })
}

/// Remove a program row and its vector, logging `operation`. Returns `false` if absent.
pub(crate) fn hard_delete(
    conn: &Connection,
    program_id: &str,
    operation: &str,
    reason: Option<&str>,
) -> Result<bool> {
    conn.execute("DELETE FROM programs_vec WHERE id = ?1", params![program_id])?;
    let removed = conn.execute(
        "DELETE FROM latent_programs WHERE id = ?1",
        params![program_id],
    )?;
    if removed > 0 {
        // The log references the id as text, so it outlives the row.
        write_audit_log(
            conn,
            operation,
            program_id,
            Some(&serde_json::json!({"reason": reason, "hard_delete": true})),
        )?;
    }
    Ok(removed > 0)
}
