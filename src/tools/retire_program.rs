use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RetireProgramParams {
    #[schemars(description = "The program ID to retire")]
    pub id: String,

    #[schemars(description = "Why the program is being retired (recorded in the audit log)")]
    pub reason: Option<String>,

    #[schemars(description = "Permanently delete instead of retiring. Defaults to false.")]
    pub hard_delete: Option<bool>,
}
