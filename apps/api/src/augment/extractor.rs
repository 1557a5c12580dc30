//! Parameter extractor: turns a job-search query into `SearchParams`.

use crate::augment::prompts::{search_params_schema, EXTRACT_SCHEMA_NAME, EXTRACT_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::{JsonRequest, LanguageModel, LlmError};
use crate::models::job::SearchParams;

/// Extracts search parameters from `text`. The value is validated by
/// deserializing into `SearchParams`; unknown keys are ignored.
pub async fn extract_search_params(
    llm: &dyn LanguageModel,
    model: &str,
    text: &str,
) -> Result<SearchParams, AppError> {
    let value = llm
        .generate_json(JsonRequest {
            model,
            system: EXTRACT_SYSTEM,
            prompt: text,
            schema_name: EXTRACT_SCHEMA_NAME,
            schema: search_params_schema(),
            strict: false,
        })
        .await
        .map_err(|e| AppError::from_llm("extraction", e))?;

    serde_json::from_value::<SearchParams>(value).map_err(|e| {
        AppError::from_llm(
            "extraction",
            LlmError::Schema(format!("search parameters do not match schema: {e}")),
        )
    })
}
