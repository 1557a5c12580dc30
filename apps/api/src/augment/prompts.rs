// Prompt constants and output schemas for the job-search middleware.

use serde_json::{json, Value};

use crate::models::job::{Classification, JobType};

/// System prompt for the job-search classifier.
pub const CLASSIFY_SYSTEM: &str = "classify if the user message is a job search query";

/// System prompt for search-parameter extraction.
pub const EXTRACT_SYSTEM: &str = "Extract job search parameters from the query";

pub const CLASSIFY_SCHEMA_NAME: &str = "classification";
pub const EXTRACT_SCHEMA_NAME: &str = "search_params";

/// Enum output wrapped in an object, since structured outputs require an object root.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "result": {
                "type": "string",
                "enum": Classification::LABELS,
            }
        },
        "required": ["result"],
        "additionalProperties": false,
    })
}

pub fn search_params_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "keywords": { "type": "string" },
            "location": { "type": "string" },
            "jobType": {
                "type": "string",
                "enum": JobType::VALUES,
            }
        },
        "required": ["keywords"],
        "additionalProperties": false,
    })
}
