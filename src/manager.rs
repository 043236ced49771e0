//! Program manager: lookup, capture gating, and the post-execution flow.
//!
//! A host calls [`find_matching_program`] when a query arrives. On a hit it
//! reuses the returned configuration; either way it later reports the outcome
//! through [`complete_interaction`], which updates usage statistics for the
//! reused program or considers capturing a new one.

use anyhow::{Context, Result};
use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{CaptureConfig, MatchingConfig, SlpConfig};
use crate::embedding::EmbeddingProvider;
use crate::program::lifecycle::evaluate_program;
use crate::program::search::{find_similar_programs, ProgramMatch, SearchParams};
use crate::program::stats::record_lookup;
use crate::program::store::store_program;
use crate::program::types::{ExecutionOutcome, NewProgram, ProgramConfig, ProgramStatus};
use crate::program::usage::{record_execution, UsageUpdate};
use crate::program::validate::validate_config;
use crate::signature::{generate_signature, ProgramSignature, QueryContext};

/// An incoming request as the host sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub context: QueryContext,
    #[serde(default)]
    pub user_profile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LookupResult {
    pub signature: ProgramSignature,
    /// Highest-ranked match, if any cleared the thresholds.
    pub best: Option<ProgramMatch>,
    /// Remaining matches, in rank order.
    pub candidates: Vec<ProgramMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureDecision {
    pub capture: bool,
    /// Why capture was refused; empty when `capture` is true.
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub program_id: String,
    pub deduplicated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded: Option<String>,
    pub version: u32,
    pub signature_hash: String,
}

/// What the host reports once a request has been handled.
#[derive(Debug, Clone)]
pub struct CompletionReport<'a> {
    pub request: &'a QueryRequest,
    /// Program the host reused, or `None` if it handled the request from scratch.
    pub program_id: Option<&'a str>,
    pub outcome: &'a ExecutionOutcome,
    pub response_text: &'a str,
    /// Configuration the host used; needed to capture on a miss.
    pub program_config: Option<&'a ProgramConfig>,
    /// Existing program the capture should replace.
    pub supersedes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InteractionOutcome {
    /// A reused program's statistics were updated.
    Recorded {
        usage: UsageUpdate,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_change: Option<ProgramStatus>,
    },
    /// A new program was captured (or an existing one refreshed).
    Captured { capture: CaptureResult },
    Skipped { reasons: Vec<String> },
}

/// Generate a signature for the request and search the store for a reusable program.
///
/// Every lookup is recorded for hit-rate accounting.
pub fn find_matching_program(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    matching: &MatchingConfig,
    request: &QueryRequest,
) -> Result<LookupResult> {
    let result = preview_matching_program(conn, embedder, matching, request)?;
    let best = result.best.as_ref();
    record_lookup(
        conn,
        &result.signature.signature_hash,
        best.map(|m| m.program.id.as_str()),
        best.map(|m| m.similarity),
    )?;

    match best {
        Some(hit) => tracing::info!(
            program_id = %hit.program.id,
            similarity = hit.similarity,
            confidence = hit.program.confidence,
            "program hit"
        ),
        None => tracing::info!(intent = %result.signature.primary_intent, "program miss"),
    }
    Ok(result)
}

/// Same search as [`find_matching_program`] without touching lookup statistics.
pub fn preview_matching_program(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    matching: &MatchingConfig,
    request: &QueryRequest,
) -> Result<LookupResult> {
    let signature = generate_signature(
        &request.query,
        &request.context,
        request.user_profile.as_deref(),
    )?;
    let embedding = embedder
        .embed(&request.query)
        .context("failed to embed query")?;

    let mut matches =
        find_similar_programs(conn, &signature, &embedding, &SearchParams::from(matching))?;
    let best = if matches.is_empty() {
        None
    } else {
        Some(matches.remove(0))
    };

    Ok(LookupResult {
        signature,
        best,
        candidates: matches,
    })
}

/// Decide whether a handled request is worth caching.
pub fn should_capture(
    capture: &CaptureConfig,
    outcome: &ExecutionOutcome,
    response_text: &str,
) -> CaptureDecision {
    let mut reasons = Vec::new();

    if !capture.enabled {
        reasons.push("capture disabled".to_string());
    }
    if !outcome.success {
        reasons.push("execution failed".to_string());
    }
    let quality = outcome.effective_quality();
    if quality < capture.min_quality {
        reasons.push(format!(
            "quality {quality:.2} below minimum {:.2}",
            capture.min_quality
        ));
    }
    if outcome.latency_ms > capture.max_latency_ms {
        reasons.push(format!(
            "latency {}ms above maximum {}ms",
            outcome.latency_ms, capture.max_latency_ms
        ));
    }
    let chars = response_text.trim().chars().count();
    if chars < capture.min_response_chars {
        reasons.push(format!(
            "response has {chars} characters, minimum is {}",
            capture.min_response_chars
        ));
    }

    CaptureDecision {
        capture: reasons.is_empty(),
        reasons,
    }
}

/// Validate, embed, and store a configuration as an experimental program.
///
/// Initial confidence is `capture.initial_confidence`, lowered to the reported
/// quality when that is smaller.
pub fn capture_program(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    config: &SlpConfig,
    request: &QueryRequest,
    program_config: &ProgramConfig,
    quality: Option<f64>,
    supersedes: Option<&str>,
) -> Result<CaptureResult> {
    validate_config(program_config, &config.validation)
        .context("program configuration rejected")?;

    let signature = generate_signature(
        &request.query,
        &request.context,
        request.user_profile.as_deref(),
    )?;
    let embedding = embedder
        .embed(&request.query)
        .context("failed to embed query")?;

    let initial = config.capture.initial_confidence;
    let confidence = quality.map_or(initial, |q| initial.min(q)).clamp(0.0, 1.0);

    let result = store_program(
        conn,
        &NewProgram {
            signature: &signature,
            query_text: request.query.trim(),
            config: program_config,
            confidence,
            supersedes,
        },
        &embedding,
        config.capture.dedup_similarity,
        config.matching.semantic_weight,
    )?;

    tracing::info!(
        program_id = %result.id,
        deduplicated = result.deduplicated,
        intent = %signature.primary_intent,
        "program captured"
    );

    Ok(CaptureResult {
        program_id: result.id,
        deduplicated: result.deduplicated,
        superseded: result.superseded,
        version: result.version,
        signature_hash: signature.signature_hash,
    })
}

/// Update a reused program's statistics, then promote or retire it if it now qualifies.
pub fn record_reuse(
    conn: &mut Connection,
    config: &SlpConfig,
    program_id: &str,
    outcome: &ExecutionOutcome,
) -> Result<InteractionOutcome> {
    let usage = record_execution(conn, program_id, outcome, &config.learning)?;
    let status_change = evaluate_program(conn, program_id, &config.lifecycle)?;
    Ok(InteractionOutcome::Recorded {
        usage,
        status_change,
    })
}

/// Apply a host's report: update a reused program, or consider capturing a new one.
pub fn complete_interaction(
    conn: &mut Connection,
    embedder: &dyn EmbeddingProvider,
    config: &SlpConfig,
    report: &CompletionReport<'_>,
) -> Result<InteractionOutcome> {
    if let Some(program_id) = report.program_id {
        return record_reuse(conn, config, program_id, report.outcome);
    }

    let mut decision = should_capture(&config.capture, report.outcome, report.response_text);
    let Some(program_config) = report.program_config else {
        decision
            .reasons
            .push("no program configuration supplied".to_string());
        return Ok(InteractionOutcome::Skipped {
            reasons: decision.reasons,
        });
    };
    if !decision.capture {
        tracing::debug!(reasons = ?decision.reasons, "capture skipped");
        return Ok(InteractionOutcome::Skipped {
            reasons: decision.reasons,
        });
    }

    let capture = capture_program(
        conn,
        embedder,
        config,
        report.request,
        program_config,
        report.outcome.quality_score,
        report.supersedes,
    )?;
    Ok(InteractionOutcome::Captured { capture })
}
