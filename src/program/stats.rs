use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Response from program_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_programs: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_intent: BTreeMap<String, u64>,
    pub total_executions: u64,
    /// Share of reported executions that succeeded; 0 with no executions.
    pub execution_success_rate: f64,
    pub lookups: u64,
    pub hits: u64,
    pub hit_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_hit_similarity: Option<f64>,
    pub top_programs: Vec<TopProgram>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_program: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TopProgram {
    pub id: String,
    pub intent: String,
    pub status: String,
    pub usage_count: u32,
    pub success_rate: f64,
    pub confidence: f64,
}

/// Number of most-used programs listed when the caller doesn't say.
pub const DEFAULT_TOP_PROGRAMS: usize = 5;

/// Compute program store statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
/// `top` caps the most-used program list.
pub fn program_stats(conn: &Connection, db_path: Option<&Path>, top: usize) -> Result<StatsResponse> {
    let mut by_status: BTreeMap<String, u64> = ["experimental", "active", "retired"]
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect();
    for (status, count) in group_count(conn, "status")? {
        by_status.insert(status, count);
    }
    let by_intent: BTreeMap<String, u64> = group_count(conn, "primary_intent")?.into_iter().collect();
    let total_programs = by_status.values().sum();

    let (total_executions, successes): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM program_executions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let (lookups, hits, avg_hit_similarity): (i64, i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), COUNT(program_id), AVG(similarity) FROM program_lookups",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let top_programs = top_programs(conn, top)?;
    let (oldest_program, newest_program) = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM latent_programs",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_programs,
        by_status,
        by_intent,
        total_executions: total_executions as u64,
        execution_success_rate: ratio(successes, total_executions),
        lookups: lookups as u64,
        hits: hits as u64,
        hit_rate: ratio(hits, lookups),
        avg_hit_similarity,
        top_programs,
        db_size_bytes,
        oldest_program,
        newest_program,
    })
}

/// Record the outcome of a lookup. `program_id` is `None` on a miss.
pub fn record_lookup(
    conn: &Connection,
    signature_hash: &str,
    program_id: Option<&str>,
    similarity: Option<f64>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO program_lookups (signature_hash, program_id, similarity, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            signature_hash,
            program_id,
            similarity,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn group_count(conn: &Connection, column: &str) -> Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM latent_programs GROUP BY {column}"
    ))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn top_programs(conn: &Connection, limit: usize) -> Result<Vec<TopProgram>> {
    let mut stmt = conn.prepare(
        "SELECT id, primary_intent, status, usage_count, success_rate, confidence \
         FROM latent_programs WHERE usage_count > 0 \
         ORDER BY usage_count DESC, confidence DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(TopProgram {
                id: row.get(0)?,
                intent: row.get(1)?,
                status: row.get(2)?,
                usage_count: row.get(3)?,
                success_rate: row.get(4)?,
                confidence: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn ratio(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::db;
    use crate::program::store::store_program;
    use crate::program::types::{ExecutionOutcome, NewProgram, ProgramConfig};
    use crate::program::usage::record_execution;
    use crate::signature::{generate_signature, QueryContext};

    fn insert(conn: &mut Connection, query: &str, dim: usize) -> String {
        let sig = generate_signature(query, &QueryContext::default(), None).unwrap();
        let config = ProgramConfig::default();
        let mut embedding = vec![0.0f32; 384];
        embedding[dim] = 1.0;
        store_program(
            conn,
            &NewProgram {
                signature: &sig,
                query_text: query,
                config: &config,
                confidence: 0.6,
                supersedes: None,
            },
            &embedding,
            1.1,
            0.3,
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_empty_stats() {
        let conn = db::open_memory_database().unwrap();
        let stats = program_stats(&conn, None, DEFAULT_TOP_PROGRAMS).unwrap();
        assert_eq!(stats.total_programs, 0);
        assert_eq!(stats.by_status["active"], 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert!(stats.avg_hit_similarity.is_none());
        assert!(stats.oldest_program.is_none());
        assert!(stats.top_programs.is_empty());
    }

    #[test]
    fn test_counts_and_rates() {
        let mut conn = db::open_memory_database().unwrap();
        let a = insert(&mut conn, "Summarize this report", 0);
        insert(&mut conn, "Compare the two contracts", 1);
        let learning = LearningConfig::default();
        for success in [true, true, false, true] {
            record_execution(
                &mut conn,
                &a,
                &ExecutionOutcome {
                    success,
                    latency_ms: 50,
                    token_count: 10,
                    quality_score: None,
                },
                &learning,
            )
            .unwrap();
        }
        record_lookup(&conn, "h1", Some(&a), Some(0.9)).unwrap();
        record_lookup(&conn, "h2", None, None).unwrap();
        record_lookup(&conn, "h3", Some(&a), Some(0.8)).unwrap();
        record_lookup(&conn, "h4", None, None).unwrap();

        let stats = program_stats(&conn, None, DEFAULT_TOP_PROGRAMS).unwrap();
        assert_eq!(stats.total_programs, 2);
        assert_eq!(stats.by_status["experimental"], 2);
        assert_eq!(stats.by_intent["summarization"], 1);
        assert_eq!(stats.total_executions, 4);
        assert!((stats.execution_success_rate - 0.75).abs() < 1e-9);
        assert_eq!(stats.lookups, 4);
        assert_eq!(stats.hits, 2);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
        assert!((stats.avg_hit_similarity.unwrap() - 0.85).abs() < 1e-9);
        assert_eq!(stats.top_programs.len(), 1);
        assert_eq!(stats.top_programs[0].id, a);
        assert_eq!(stats.top_programs[0].usage_count, 4);
    }
}
