//! Core latent-program type definitions.
//!
//! Defines [`ProgramStatus`] (lifecycle stage), [`ProgramConfig`] (the cached
//! execution configuration a host reuses), [`LatentProgram`] (a full record),
//! and [`ExecutionOutcome`] (what the host reports back after running).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::signature::ProgramSignature;

/// Lifecycle stage of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    /// Freshly captured, not yet proven by repeated successful use.
    Experimental,
    /// Promoted after enough successful executions.
    Active,
    /// No longer matched. Frees its signature for a new owner.
    Retired,
}

impl ProgramStatus {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Experimental => "experimental",
            Self::Active => "active",
            Self::Retired => "retired",
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Retired)
    }
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProgramStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "experimental" => Ok(Self::Experimental),
            "active" => Ok(Self::Active),
            "retired" => Ok(Self::Retired),
            _ => Err(format!("unknown program status: {s}")),
        }
    }
}

/// How the host assembled context for the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ContextAssembly {
    pub max_documents: u32,
    pub max_chunks_per_document: u32,
    /// Chunk ordering strategy, e.g. `"relevance"` or `"document_order"`.
    pub ordering: String,
    pub include_conversation_history: bool,
}

impl Default for ContextAssembly {
    fn default() -> Self {
        Self {
            max_documents: 5,
            max_chunks_per_document: 3,
            ordering: "relevance".into(),
            include_conversation_history: true,
        }
    }
}

/// Generation settings the host used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReasoningConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    pub tpv_enabled: bool,
    /// Free-form depth label, e.g. `"shallow"`, `"standard"`, `"deep"`.
    pub depth: String,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            tpv_enabled: false,
            depth: "standard".into(),
        }
    }
}

/// The cached execution configuration. Opaque to matching; validated on capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProgramConfig {
    pub prompt_template: String,
    pub context: ContextAssembly,
    pub reasoning: ReasoningConfig,
    /// Expected response shape, e.g. `"bullet_summary"`.
    pub response_pattern: Option<String>,
    /// Host-specific settings carried through untouched.
    pub extra: Option<serde_json::Value>,
}

/// What a host reports after executing a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub latency_ms: u64,
    #[serde(default)]
    pub token_count: u32,
    /// Host-assessed response quality in `[0, 1]`.
    #[serde(default)]
    pub quality_score: Option<f64>,
}

impl ExecutionOutcome {
    /// Quality used for statistics: the reported score, else 1 for success and 0 for failure.
    pub fn effective_quality(&self) -> f64 {
        self.quality_score
            .unwrap_or(if self.success { 1.0 } else { 0.0 })
            .clamp(0.0, 1.0)
    }
}

/// A latent program record, matching the `latent_programs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentProgram {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    pub signature: ProgramSignature,
    /// Query the program was captured from; re-embedded on model change.
    pub query_text: String,
    pub config: ProgramConfig,
    pub status: ProgramStatus,
    pub version: u32,
    /// Program this one superseded, if any.
    pub parent_id: Option<String>,
    pub usage_count: u32,
    pub success_count: u32,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub avg_token_count: f64,
    pub avg_quality: f64,
    pub feedback_score: Option<f64>,
    pub feedback_count: u32,
    /// Confidence in `[0.0, 1.0]`; moves with outcomes and decays when idle.
    pub confidence: f64,
    pub created_at: String,
    pub updated_at: String,
    pub last_used: Option<String>,
}

/// Input to [`super::store::store_program`].
#[derive(Debug, Clone)]
pub struct NewProgram<'a> {
    pub signature: &'a ProgramSignature,
    pub query_text: &'a str,
    pub config: &'a ProgramConfig,
    pub confidence: f64,
    /// Program to retire and replace with this one.
    pub supersedes: Option<&'a str>,
}
