use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecordFeedbackParams {
    #[schemars(description = "ID of the program the feedback is about")]
    pub program_id: String,

    #[schemars(description = "User satisfaction from 0.0 (bad) to 1.0 (good)")]
    pub score: f64,
}
