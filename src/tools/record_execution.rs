use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use slp::program::types::ExecutionOutcome;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordExecutionParams {
    #[schemars(description = "ID of the program returned by find_program and reused")]
    pub program_id: String,

    #[schemars(description = "How the execution went: success, latency_ms, token_count, quality_score (0-1)")]
    pub outcome: ExecutionOutcome,
}
