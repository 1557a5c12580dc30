// Shared prompt constants for the whole service.
// The job-search middleware keeps its own classifier/extractor prompts in augment/prompts.rs.

/// System prompt for the streamed chat reply.
pub const CHAT_SYSTEM: &str =
    "you are a friendly assistant! keep your responses concise and helpful.";
