use anyhow::{ensure, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

use super::store::{get_program, row_to_program, PROGRAM_COLUMNS};
use super::types::{LatentProgram, ProgramStatus};
use crate::config::MatchingConfig;
use crate::embedding::{cosine_similarity, EMBEDDING_DIM};
use crate::signature::{signature_similarity, ProgramSignature};

// ── Public types ──────────────────────────────────────────────────────────────

/// Matching knobs, usually taken from `[matching]`.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub similarity_threshold: f64,
    pub min_confidence: f64,
    pub semantic_weight: f64,
    pub max_candidates: usize,
    pub max_results: usize,
    pub allow_experimental: bool,
}

impl From<&MatchingConfig> for SearchParams {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            min_confidence: config.min_confidence,
            semantic_weight: config.semantic_weight,
            max_candidates: config.max_candidates,
            max_results: config.max_results,
            allow_experimental: config.allow_experimental,
        }
    }
}

/// A program that cleared the similarity and confidence thresholds.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramMatch {
    pub program: LatentProgram,
    /// Combined structural + semantic similarity.
    pub similarity: f64,
    pub structural_similarity: f64,
    pub semantic_similarity: f64,
    /// `similarity * confidence`, the ranking key.
    pub rank_score: f64,
}

/// Full inspection response for a single program.
#[derive(Debug, Serialize)]
pub struct InspectResponse {
    pub program: LatentProgram,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executions: Option<Vec<ExecutionEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<LogEntry>>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionEntry {
    pub success: bool,
    pub latency_ms: u64,
    pub token_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub created_at: String,
}

/// A live candidate with its similarity components, before thresholds.
#[derive(Debug, Clone)]
pub(crate) struct ScoredCandidate {
    pub program: LatentProgram,
    pub structural: f64,
    pub semantic: f64,
    pub similarity: f64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Candidates (KNN ∪ same intent ∪ hash owner) → score → filter → rank → truncate.
pub fn find_similar_programs(
    conn: &Connection,
    signature: &ProgramSignature,
    query_embedding: &[f32],
    params: &SearchParams,
) -> Result<Vec<ProgramMatch>> {
    let candidates = score_candidates(
        conn,
        signature,
        query_embedding,
        params.semantic_weight,
        params.max_candidates,
    )?;
    let considered = candidates.len();

    let mut matches: Vec<ProgramMatch> = candidates
        .into_iter()
        .filter(|c| c.similarity >= params.similarity_threshold)
        .filter(|c| c.program.confidence >= params.min_confidence)
        .filter(|c| params.allow_experimental || c.program.status == ProgramStatus::Active)
        .map(|c| ProgramMatch {
            rank_score: c.similarity * c.program.confidence,
            similarity: c.similarity,
            structural_similarity: c.structural,
            semantic_similarity: c.semantic,
            program: c.program,
        })
        .collect();

    matches.sort_by(|a, b| {
        b.rank_score
            .total_cmp(&a.rank_score)
            .then_with(|| b.program.usage_count.cmp(&a.program.usage_count))
    });
    matches.truncate(params.max_results);

    tracing::debug!(
        considered,
        matched = matches.len(),
        intent = %signature.primary_intent,
        "program search complete"
    );
    Ok(matches)
}

/// Gather live candidates and score each against the query.
pub(crate) fn score_candidates(
    conn: &Connection,
    signature: &ProgramSignature,
    query_embedding: &[f32],
    semantic_weight: f64,
    max_candidates: usize,
) -> Result<Vec<ScoredCandidate>> {
    ensure!(
        query_embedding.len() == EMBEDDING_DIM,
        "query embedding has {} dimensions, expected {EMBEDDING_DIM}",
        query_embedding.len()
    );
    let weight = semantic_weight.clamp(0.0, 1.0);
    // A query with no embeddable tokens has no direction to compare
    let has_direction = query_embedding.iter().any(|x| *x != 0.0);

    // 1. Vector KNN
    let knn = vector_search(conn, query_embedding, max_candidates)?;
    let distances: HashMap<&str, f64> = knn.iter().map(|(id, d)| (id.as_str(), *d)).collect();

    let mut programs: HashMap<String, LatentProgram> = HashMap::new();
    for (id, _) in &knn {
        if let Some(program) = get_program(conn, id)? {
            programs.insert(program.id.clone(), program);
        }
    }

    // 2. Same primary intent
    for program in intent_candidates(conn, signature, max_candidates)? {
        programs.entry(program.id.clone()).or_insert(program);
    }

    // 3. Exact signature owner
    if let Some(owner) = conn
        .query_row(
            &format!(
                "SELECT {PROGRAM_COLUMNS} FROM latent_programs \
                 WHERE signature_hash = ?1 AND status != 'retired'"
            ),
            params![signature.signature_hash],
            row_to_program,
        )
        .optional()?
    {
        programs.entry(owner.id.clone()).or_insert(owner);
    }

    let mut scored = Vec::with_capacity(programs.len());
    for program in programs.into_values() {
        if !program.status.is_live() {
            continue;
        }
        let semantic = if !has_direction {
            0.0
        } else {
            match distances.get(program.id.as_str()) {
                Some(distance) => super::l2_to_cosine(*distance),
                None => match stored_embedding(conn, &program.id)? {
                    Some(stored) => cosine_similarity(query_embedding, &stored),
                    None => 0.0,
                },
            }
        }
        .clamp(0.0, 1.0);
        let structural = signature_similarity(signature, &program.signature);
        scored.push(ScoredCandidate {
            similarity: (1.0 - weight) * structural + weight * semantic,
            structural,
            semantic,
            program,
        });
    }
    Ok(scored)
}

/// Full program record plus optional execution history and audit log.
pub fn inspect_program(
    conn: &Connection,
    program_id: &str,
    include_executions: bool,
    include_log: bool,
) -> Result<InspectResponse> {
    let program = get_program(conn, program_id)?
        .ok_or_else(|| anyhow::anyhow!("program not found: {program_id}"))?;

    let executions = if include_executions {
        let mut stmt = conn.prepare(
            "SELECT success, latency_ms, token_count, quality_score, created_at \
             FROM program_executions WHERE program_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![program_id], |row| {
                let latency_ms: i64 = row.get(1)?;
                Ok(ExecutionEntry {
                    success: row.get(0)?,
                    latency_ms: u64::try_from(latency_ms).unwrap_or_default(),
                    token_count: row.get(2)?,
                    quality_score: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Some(rows)
    } else {
        None
    };

    let log = if include_log {
        let mut stmt = conn.prepare(
            "SELECT operation, details, created_at \
             FROM program_log WHERE program_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![program_id], |row| {
                let details_str: Option<String> = row.get(1)?;
                Ok(LogEntry {
                    operation: row.get(0)?,
                    details: details_str.and_then(|s| serde_json::from_str(&s).ok()),
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Some(rows)
    } else {
        None
    };

    Ok(InspectResponse {
        program,
        executions,
        log,
    })
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// KNN over `programs_vec`. Returns `(id, l2_distance)` pairs, nearest first.
fn vector_search(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<(String, f64)>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT id, distance FROM programs_vec \
         WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
    )?;
    let rows = stmt
        .query_map(
            params![
                super::embedding_to_bytes(query_embedding),
                i64::try_from(limit).unwrap_or(i64::MAX)
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Live programs sharing the primary intent, most confident first.
fn intent_candidates(
    conn: &Connection,
    signature: &ProgramSignature,
    limit: usize,
) -> Result<Vec<LatentProgram>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROGRAM_COLUMNS} FROM latent_programs \
         WHERE primary_intent = ?1 AND status != 'retired' \
         ORDER BY confidence DESC, usage_count DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(
            params![
                signature.primary_intent.as_str(),
                i64::try_from(limit).unwrap_or(i64::MAX)
            ],
            row_to_program,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn stored_embedding(conn: &Connection, program_id: &str) -> Result<Option<Vec<f32>>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT embedding FROM programs_vec WHERE id = ?1",
            params![program_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(bytes.map(|b| super::bytes_to_embedding(&b)))
}
