use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::forget::hard_delete;
use super::store::{drop_vector, write_audit_log};
use super::types::ProgramStatus;
use crate::config::LifecycleConfig;

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EvictResult {
    pub candidates: Vec<EvictCandidate>,
    pub deleted: usize,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct EvictCandidate {
    pub id: String,
    pub status: String,
    pub confidence: f64,
    pub success_rate: f64,
    pub query_preview: String,
    /// `"retired_expired"` or `"over_capacity"`.
    pub reason: String,
    pub last_used: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MaintenanceReport {
    pub promoted: Vec<String>,
    pub retired: Vec<String>,
    pub decayed: usize,
    pub eviction: EvictResult,
}

// ── Promotion / retirement ───────────────────────────────────────────────────

/// Experimental programs with enough successful uses become active.
pub fn promote_programs(conn: &mut Connection, config: &LifecycleConfig) -> Result<Vec<String>> {
    let tx = conn.transaction()?;
    let ids = select_ids(
        &tx,
        "SELECT id FROM latent_programs WHERE status = 'experimental' \
         AND usage_count >= ?1 AND success_rate >= ?2",
        params![config.promotion_min_uses, config.promotion_min_success_rate],
    )?;
    for id in &ids {
        set_status(&tx, id, ProgramStatus::Active, "promote", "usage_threshold")?;
    }
    tx.commit()?;
    Ok(ids)
}

/// Live programs that keep failing, or whose confidence collapsed, are retired.
pub fn retire_programs(conn: &mut Connection, config: &LifecycleConfig) -> Result<Vec<String>> {
    let tx = conn.transaction()?;
    let ids = select_ids(
        &tx,
        "SELECT id FROM latent_programs WHERE status != 'retired' \
         AND ((usage_count >= ?1 AND success_rate < ?2) OR confidence < ?3)",
        params![
            config.retirement_min_uses,
            config.retirement_success_floor,
            config.confidence_floor
        ],
    )?;
    for id in &ids {
        set_status(&tx, id, ProgramStatus::Retired, "retire", "underperforming")?;
    }
    tx.commit()?;
    Ok(ids)
}

/// Apply promotion/retirement rules to one program right after it was used.
///
/// Returns the new status when it changed.
pub fn evaluate_program(
    conn: &mut Connection,
    program_id: &str,
    config: &LifecycleConfig,
) -> Result<Option<ProgramStatus>> {
    let tx = conn.transaction()?;
    let row: Option<(String, u32, f64, f64)> = tx
        .query_row(
            "SELECT status, usage_count, success_rate, confidence FROM latent_programs WHERE id = ?1",
            params![program_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    let Some((status, uses, success_rate, confidence)) = row else {
        bail!("program not found: {program_id}");
    };

    let changed = match status.as_str() {
        "retired" => None,
        _ if (uses >= config.retirement_min_uses
            && success_rate < config.retirement_success_floor)
            || confidence < config.confidence_floor =>
        {
            set_status(&tx, program_id, ProgramStatus::Retired, "retire", "underperforming")?;
            Some(ProgramStatus::Retired)
        }
        "experimental"
            if uses >= config.promotion_min_uses
                && success_rate >= config.promotion_min_success_rate =>
        {
            set_status(&tx, program_id, ProgramStatus::Active, "promote", "usage_threshold")?;
            Some(ProgramStatus::Active)
        }
        _ => None,
    };
    tx.commit()?;

    if let Some(new_status) = changed {
        tracing::info!(program_id, status = %new_status, "program status changed");
    }
    Ok(changed)
}

// ── Confidence decay ─────────────────────────────────────────────────────────

/// Multiply confidence of idle live programs by `decay_factor`.
///
/// A program is idle when its last use (or creation, if never used) and its
/// last decay are both older than `decay_idle_days`, so each idle window
/// decays a program once however often maintenance runs.
pub fn apply_decay(conn: &mut Connection, config: &LifecycleConfig) -> Result<usize> {
    let now = chrono::Utc::now();
    let cutoff = (now - chrono::Duration::days(config.decay_idle_days as i64)).to_rfc3339();

    let tx = conn.transaction()?;
    let affected = tx.execute(
        "UPDATE latent_programs SET confidence = confidence * ?1, updated_at = ?2, \
         last_decayed_at = ?2 \
         WHERE status != 'retired' AND confidence > 0.0 \
         AND MAX(COALESCE(last_used, created_at), COALESCE(last_decayed_at, created_at)) < ?3",
        params![config.decay_factor.clamp(0.0, 1.0), now.to_rfc3339(), cutoff],
    )?;

    if affected > 0 {
        // Batch operation, logged under a synthetic id
        write_audit_log(
            &tx,
            "decay",
            "batch:decay",
            Some(&serde_json::json!({
                "factor": config.decay_factor,
                "idle_days": config.decay_idle_days,
                "affected": affected,
            })),
        )?;
    }
    tx.commit()?;
    Ok(affected)
}

// ── Eviction ─────────────────────────────────────────────────────────────────

/// Hard-delete expired retired programs, then the lowest-value live programs
/// beyond `max_programs`.
///
/// Value is `confidence * max(success_rate, 0.1)`; ties evict the longest idle first.
pub fn evict_programs(
    conn: &mut Connection,
    config: &LifecycleConfig,
    dry_run: bool,
) -> Result<EvictResult> {
    let cutoff = (chrono::Utc::now()
        - chrono::Duration::days(config.evict_retired_after_days as i64))
    .to_rfc3339();

    let tx = conn.transaction()?;
    let mut candidates = fetch_candidates(
        &tx,
        "SELECT id, status, confidence, success_rate, query_text, last_used \
         FROM latent_programs WHERE status = 'retired' AND updated_at < ?1 \
         ORDER BY updated_at",
        params![cutoff],
        "retired_expired",
    )?;

    let live: i64 = tx.query_row(
        "SELECT COUNT(*) FROM latent_programs WHERE status != 'retired'",
        [],
        |row| row.get(0),
    )?;
    let overflow = live - i64::try_from(config.max_programs).unwrap_or(i64::MAX);
    if overflow > 0 {
        candidates.extend(fetch_candidates(
            &tx,
            "SELECT id, status, confidence, success_rate, query_text, last_used \
             FROM latent_programs WHERE status != 'retired' \
             ORDER BY confidence * MAX(success_rate, 0.1) ASC, \
             COALESCE(last_used, created_at) ASC LIMIT ?1",
            params![overflow],
            "over_capacity",
        )?);
    }

    let mut deleted = 0;
    if !dry_run {
        for candidate in &candidates {
            if hard_delete(&tx, &candidate.id, "evict", Some(&candidate.reason))? {
                deleted += 1;
            }
        }
    }
    tx.commit()?;

    Ok(EvictResult {
        candidates,
        deleted,
        dry_run,
    })
}

/// Promote → retire → decay → evict. `dry_run` only holds back eviction.
pub fn run_maintenance(
    conn: &mut Connection,
    config: &LifecycleConfig,
    dry_run: bool,
) -> Result<MaintenanceReport> {
    let promoted = promote_programs(conn, config)?;
    let retired = retire_programs(conn, config)?;
    let decayed = apply_decay(conn, config)?;
    let eviction = evict_programs(conn, config, dry_run)?;

    tracing::info!(
        promoted = promoted.len(),
        retired = retired.len(),
        decayed,
        evicted = eviction.deleted,
        dry_run,
        "maintenance complete"
    );

    Ok(MaintenanceReport {
        promoted,
        retired,
        decayed,
        eviction,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn select_ids(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params, |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn set_status(
    conn: &Connection,
    program_id: &str,
    status: ProgramStatus,
    operation: &str,
    reason: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE latent_programs SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), chrono::Utc::now().to_rfc3339(), program_id],
    )?;
    if !status.is_live() {
        drop_vector(conn, program_id)?;
    }
    write_audit_log(
        conn,
        operation,
        program_id,
        Some(&serde_json::json!({"reason": reason})),
    )?;
    Ok(())
}

fn fetch_candidates(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    reason: &str,
) -> Result<Vec<EvictCandidate>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            let query: String = row.get(4)?;
            Ok(EvictCandidate {
                id: row.get(0)?,
                status: row.get(1)?,
                confidence: row.get(2)?,
                success_rate: row.get(3)?,
                query_preview: super::truncate_preview(&query, 80),
                reason: reason.to_string(),
                last_used: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
