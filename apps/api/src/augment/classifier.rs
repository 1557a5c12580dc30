//! Query classifier: labels a user message as a job search or not.

use serde::Deserialize;

use crate::augment::prompts::{classification_schema, CLASSIFY_SCHEMA_NAME, CLASSIFY_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::{JsonRequest, LanguageModel, LlmError};
use crate::models::job::Classification;

#[derive(Debug, Deserialize)]
struct ClassifierOutput {
    result: Classification,
}

/// Asks `model` to classify `text`. Output that is not one of the two labels is
/// rejected as a schema violation.
pub async fn classify_query(
    llm: &dyn LanguageModel,
    model: &str,
    text: &str,
) -> Result<Classification, AppError> {
    let value = llm
        .generate_json(JsonRequest {
            model,
            system: CLASSIFY_SYSTEM,
            prompt: text,
            schema_name: CLASSIFY_SCHEMA_NAME,
            schema: classification_schema(),
            strict: true,
        })
        .await
        .map_err(|e| AppError::from_llm("classification", e))?;

    let output: ClassifierOutput = serde_json::from_value(value).map_err(|e| {
        AppError::from_llm(
            "classification",
            LlmError::Schema(format!("unexpected classifier output: {e}")),
        )
    })?;

    Ok(output.result)
}
