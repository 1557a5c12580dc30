use std::sync::Arc;

use crate::augment::JobSearchMiddleware;
use crate::config::Config;
use crate::llm_client::LanguageModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Model backend for the streamed reply. `LlmClient` in production.
    pub llm: Arc<dyn LanguageModel>,
    /// Rewrites generation parameters with job listings before each reply.
    pub middleware: JobSearchMiddleware,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    pub fn for_tests(llm: Arc<dyn LanguageModel>) -> Self {
        let config = Config::for_tests();
        let middleware = JobSearchMiddleware::new(
            llm.clone(),
            Arc::new(crate::jobs::catalog::JobCatalog::builtin()),
            config.classifier_model.clone(),
        );
        Self {
            llm,
            middleware,
            config,
        }
    }
}
