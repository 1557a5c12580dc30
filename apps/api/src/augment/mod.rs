// Job-search augmentation: classify the latest user message, extract search
// parameters, and append matching catalog listings before generation.
// All model calls go through llm_client.

pub mod classifier;
pub mod extractor;
pub mod interceptor;
pub mod prompts;

pub use interceptor::JobSearchMiddleware;
