//! MCP `program_inspect` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `program_inspect` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProgramInspectParams {
    #[schemars(description = "The program ID to inspect")]
    pub id: String,

    #[schemars(description = "Include reported executions. Defaults to false.")]
    pub include_executions: Option<bool>,

    #[schemars(description = "Include the audit log. Defaults to false.")]
    pub include_log: Option<bool>,
}
