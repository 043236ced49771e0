//! MCP `program_stats` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `program_stats` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProgramStatsParams {
    #[schemars(description = "Number of most-used programs to list. Defaults to 5.")]
    pub top: Option<usize>,
}
