use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use slp::program::types::{ExecutionOutcome, ProgramConfig};
use slp::signature::QueryContext;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CaptureProgramParams {
    #[schemars(description = "The query that was handled without a cached program")]
    pub query: String,

    #[schemars(description = "Documents and TPV flag, as passed to find_program")]
    pub context: Option<QueryContext>,

    #[schemars(description = "Optional user profile label")]
    pub user_profile: Option<String>,

    #[schemars(
        description = "Execution configuration the host used: prompt_template, context assembly, reasoning settings, response_pattern, extra"
    )]
    pub config: ProgramConfig,

    #[schemars(description = "How the execution went: success, latency_ms, token_count, quality_score (0-1)")]
    pub outcome: ExecutionOutcome,

    #[schemars(description = "The response text produced; used to judge whether the result is worth caching")]
    pub response_text: String,

    #[schemars(description = "ID of a program this configuration replaces. The old program is retired.")]
    pub supersedes: Option<String>,
}
