//! Job-search middleware: rewrites generation parameters before the chat model runs.
//!
//! Per request:
//! 1. No trailing user message → parameters pass through untouched, no model call.
//! 2. Classify the user message. `other` → pass through.
//! 3. `job_search` → extract `SearchParams`, look up the catalog, and replace the
//!    trailing user message with one carrying the listings.
//!
//! Any classifier or extractor failure fails the request.

use std::sync::Arc;

use tracing::{debug, info};

use crate::augment::classifier::classify_query;
use crate::augment::extractor::extract_search_params;
use crate::errors::AppError;
use crate::jobs::catalog::JobCatalog;
use crate::jobs::lookup::{augment_message, search_jobs};
use crate::llm_client::{GenerationParams, LanguageModel};
use crate::models::job::Classification;
use crate::models::message::{Message, Role};

#[derive(Clone)]
pub struct JobSearchMiddleware {
    llm: Arc<dyn LanguageModel>,
    catalog: Arc<JobCatalog>,
    /// Model used for both the classification and extraction calls.
    model: String,
}

impl JobSearchMiddleware {
    pub fn new(llm: Arc<dyn LanguageModel>, catalog: Arc<JobCatalog>, model: String) -> Self {
        Self {
            llm,
            catalog,
            model,
        }
    }

    pub async fn transform_params(
        &self,
        params: GenerationParams,
    ) -> Result<GenerationParams, AppError> {
        let messages = self.augment_messages(&params.messages).await?;
        Ok(GenerationParams { messages, ..params })
    }

    /// Returns a new message sequence; the input is never modified.
    pub async fn augment_messages(&self, messages: &[Message]) -> Result<Vec<Message>, AppError> {
        let Some((recent, history)) = messages.split_last() else {
            debug!("No messages to intercept; passing through");
            return Ok(Vec::new());
        };

        if recent.role != Role::User {
            debug!("Last message is {:?}, not user; passing through", recent.role);
            return Ok(messages.to_vec());
        }

        let text = recent.text_content();

        let classification = classify_query(self.llm.as_ref(), &self.model, &text).await?;
        if classification != Classification::JobSearch {
            debug!("Message classified as {classification:?}; passing through");
            return Ok(messages.to_vec());
        }

        let search_params = extract_search_params(self.llm.as_ref(), &self.model, &text).await?;
        let jobs = search_jobs(&self.catalog, &search_params);

        info!(
            keywords = %search_params.keywords,
            location = ?search_params.location,
            job_type = ?search_params.job_type,
            matches = jobs.len(),
            "Augmenting job search query with catalog listings"
        );

        let mut rewritten = Vec::with_capacity(messages.len());
        rewritten.extend_from_slice(history);
        rewritten.push(augment_message(recent, &jobs));
        Ok(rewritten)
    }
}
