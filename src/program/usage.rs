//! Usage statistics and confidence learning from reported outcomes.

use anyhow::{bail, ensure, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use super::store::{get_program, write_audit_log};
use super::types::{ExecutionOutcome, ProgramStatus};
use crate::config::LearningConfig;

/// Program state after an execution report.
#[derive(Debug, Clone, Serialize)]
pub struct UsageUpdate {
    pub program_id: String,
    pub usage_count: u32,
    pub success_count: u32,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub avg_quality: f64,
    pub previous_confidence: f64,
    pub confidence: f64,
    pub status: ProgramStatus,
}

/// Program state after a feedback report.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackUpdate {
    pub program_id: String,
    pub feedback_score: f64,
    pub feedback_count: u32,
    pub confidence: f64,
}

/// Record one execution of a program and update its running statistics.
///
/// Success moves confidence toward 1 by `success_rate` scaled by quality;
/// failure scales it down by `failure_penalty`.
pub fn record_execution(
    conn: &mut Connection,
    program_id: &str,
    outcome: &ExecutionOutcome,
    learning: &LearningConfig,
) -> Result<UsageUpdate> {
    let tx = conn.transaction()?;
    let Some(program) = get_program(&tx, program_id)? else {
        bail!("program not found: {program_id}");
    };

    let quality = outcome.effective_quality();
    let usage_count = program.usage_count + 1;
    let success_count = program.success_count + u32::from(outcome.success);
    let n = f64::from(usage_count);
    let success_rate = f64::from(success_count) / n;
    let avg_latency_ms = running_mean(program.avg_latency_ms, outcome.latency_ms as f64, n);
    let avg_token_count =
        running_mean(program.avg_token_count, f64::from(outcome.token_count), n);
    let avg_quality = running_mean(program.avg_quality, quality, n);

    let c = program.confidence;
    let confidence = if outcome.success {
        c + learning.success_rate * quality * (1.0 - c)
    } else {
        c * (1.0 - learning.failure_penalty)
    }
    .clamp(0.0, 1.0);

    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE latent_programs SET usage_count = ?1, success_count = ?2, success_rate = ?3, \
         avg_latency_ms = ?4, avg_token_count = ?5, avg_quality = ?6, confidence = ?7, \
         last_used = ?8, updated_at = ?8 WHERE id = ?9",
        params![
            usage_count,
            success_count,
            success_rate.clamp(0.0, 1.0),
            avg_latency_ms,
            avg_token_count,
            avg_quality,
            confidence,
            now,
            program_id,
        ],
    )?;
    tx.execute(
        "INSERT INTO program_executions (program_id, success, latency_ms, token_count, \
         quality_score, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            program_id,
            outcome.success,
            i64::try_from(outcome.latency_ms)?,
            outcome.token_count,
            outcome.quality_score,
            now,
        ],
    )?;
    write_audit_log(
        &tx,
        "update",
        program_id,
        Some(&serde_json::json!({
            "reason": "execution",
            "success": outcome.success,
            "confidence": confidence,
        })),
    )?;
    tx.commit()?;

    tracing::debug!(
        program_id,
        success = outcome.success,
        usage_count,
        confidence,
        "execution recorded"
    );

    Ok(UsageUpdate {
        program_id: program_id.to_string(),
        usage_count,
        success_count,
        success_rate,
        avg_latency_ms,
        avg_quality,
        previous_confidence: c,
        confidence,
        status: program.status,
    })
}

/// Blend a user feedback score in `[0, 1]` into the program.
///
/// Confidence moves toward the score by `feedback_weight`.
pub fn record_feedback(
    conn: &mut Connection,
    program_id: &str,
    score: f64,
    learning: &LearningConfig,
) -> Result<FeedbackUpdate> {
    ensure!(
        (0.0..=1.0).contains(&score),
        "feedback score must be in [0, 1], got {score}"
    );

    let tx = conn.transaction()?;
    let Some(program) = get_program(&tx, program_id)? else {
        bail!("program not found: {program_id}");
    };

    let feedback_count = program.feedback_count + 1;
    let feedback_score = running_mean(
        program.feedback_score.unwrap_or(0.0),
        score,
        f64::from(feedback_count),
    );
    let confidence = (program.confidence
        + learning.feedback_weight * (score - program.confidence))
        .clamp(0.0, 1.0);

    tx.execute(
        "UPDATE latent_programs SET feedback_score = ?1, feedback_count = ?2, confidence = ?3, \
         updated_at = ?4 WHERE id = ?5",
        params![
            feedback_score,
            feedback_count,
            confidence,
            chrono::Utc::now().to_rfc3339(),
            program_id,
        ],
    )?;
    write_audit_log(
        &tx,
        "feedback",
        program_id,
        Some(&serde_json::json!({"score": score, "confidence": confidence})),
    )?;
    tx.commit()?;

    Ok(FeedbackUpdate {
        program_id: program_id.to_string(),
        feedback_score,
        feedback_count,
        confidence,
    })
}

/// Incremental mean after the `n`th sample.
fn running_mean(previous: f64, sample: f64, n: f64) -> f64 {
    previous + (sample - previous) / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::program::store::store_program;
    use crate::program::types::{NewProgram, ProgramConfig};
    use crate::signature::{generate_signature, QueryContext};

    fn setup() -> (Connection, String) {
        let mut conn = db::open_memory_database().unwrap();
        let sig = generate_signature("Summarize this report", &QueryContext::default(), None)
            .unwrap();
        let config = ProgramConfig::default();
        let mut embedding = vec![0.0f32; 384];
        embedding[0] = 1.0;
        let id = store_program(
            &mut conn,
            &NewProgram {
                signature: &sig,
                query_text: "Summarize this report",
                config: &config,
                confidence: 0.6,
                supersedes: None,
            },
            &embedding,
            0.97,
            0.3,
        )
        .unwrap()
        .id;
        (conn, id)
    }

    fn outcome(success: bool, latency_ms: u64, quality: Option<f64>) -> ExecutionOutcome {
        ExecutionOutcome {
            success,
            latency_ms,
            token_count: 100,
            quality_score: quality,
        }
    }

    #[test]
    fn test_success_raises_confidence() {
        let (mut conn, id) = setup();
        let learning = LearningConfig::default();

        let update = record_execution(&mut conn, &id, &outcome(true, 200, Some(1.0)), &learning)
            .unwrap();
        assert_eq!(update.usage_count, 1);
        assert_eq!(update.success_count, 1);
        assert_eq!(update.success_rate, 1.0);
        // 0.6 + 0.1 * 1.0 * 0.4
        assert!((update.confidence - 0.64).abs() < 1e-9);
        assert_eq!(update.avg_latency_ms, 200.0);

        let program = get_program(&conn, &id).unwrap().unwrap();
        assert!(program.last_used.is_some());
        assert_eq!(program.avg_token_count, 100.0);
    }

    #[test]
    fn test_failure_applies_penalty() {
        let (mut conn, id) = setup();
        let learning = LearningConfig::default();

        let update = record_execution(&mut conn, &id, &outcome(false, 100, None), &learning)
            .unwrap();
        assert_eq!(update.success_rate, 0.0);
        // 0.6 * 0.8
        assert!((update.confidence - 0.48).abs() < 1e-9);
        assert_eq!(update.avg_quality, 0.0);
    }

    #[test]
    fn test_running_means_over_several_executions() {
        let (mut conn, id) = setup();
        let learning = LearningConfig::default();

        record_execution(&mut conn, &id, &outcome(true, 100, Some(0.9)), &learning).unwrap();
        record_execution(&mut conn, &id, &outcome(true, 300, Some(0.7)), &learning).unwrap();
        let update =
            record_execution(&mut conn, &id, &outcome(false, 200, None), &learning).unwrap();

        assert_eq!(update.usage_count, 3);
        assert_eq!(update.success_count, 2);
        assert!((update.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((update.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((update.avg_quality - (0.9 + 0.7) / 3.0).abs() < 1e-9);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM program_executions WHERE program_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_confidence_stays_bounded() {
        let (mut conn, id) = setup();
        let learning = LearningConfig {
            success_rate: 1.0,
            failure_penalty: 1.0,
            feedback_weight: 1.0,
        };

        let up = record_execution(&mut conn, &id, &outcome(true, 1, Some(1.0)), &learning).unwrap();
        assert_eq!(up.confidence, 1.0);
        let down =
            record_execution(&mut conn, &id, &outcome(false, 1, None), &learning).unwrap();
        assert_eq!(down.confidence, 0.0);
    }

    #[test]
    fn test_unknown_program_errors() {
        let (mut conn, _) = setup();
        let err = record_execution(
            &mut conn,
            "missing",
            &outcome(true, 1, None),
            &LearningConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("program not found"));
    }

    #[test]
    fn test_feedback_blends_and_nudges() {
        let (mut conn, id) = setup();
        let learning = LearningConfig::default();

        let first = record_feedback(&mut conn, &id, 1.0, &learning).unwrap();
        assert_eq!(first.feedback_count, 1);
        assert_eq!(first.feedback_score, 1.0);
        // 0.6 + 0.3 * (1.0 - 0.6)
        assert!((first.confidence - 0.72).abs() < 1e-9);

        let second = record_feedback(&mut conn, &id, 0.0, &learning).unwrap();
        assert_eq!(second.feedback_count, 2);
        assert!((second.feedback_score - 0.5).abs() < 1e-9);
        assert!(second.confidence < first.confidence);

        let op: String = conn
            .query_row(
                "SELECT operation FROM program_log WHERE program_id = ?1 ORDER BY id DESC LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(op, "feedback");
    }

    #[test]
    fn test_feedback_out_of_range_rejected() {
        let (mut conn, id) = setup();
        assert!(record_feedback(&mut conn, &id, 1.5, &LearningConfig::default()).is_err());
        assert!(record_feedback(&mut conn, &id, -0.1, &LearningConfig::default()).is_err());
    }
}
