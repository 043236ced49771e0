//! MCP `find_program` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use slp::signature::QueryContext;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindProgramParams {
    #[schemars(description = "The user's query, verbatim")]
    pub query: String,

    #[schemars(
        description = "Attached documents (name, optional content_type, optional text excerpt) and whether TPV reasoning is enabled"
    )]
    pub context: Option<QueryContext>,

    #[schemars(description = "Optional user profile label, e.g. 'analyst' or 'developer'")]
    pub user_profile: Option<String>,

    #[schemars(description = "Also return runner-up matches. Defaults to false.")]
    pub include_candidates: Option<bool>,
}
