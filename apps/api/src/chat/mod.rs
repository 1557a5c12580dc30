// Chat API: UI message conversion, job-search augmentation, streamed reply.

pub mod handlers;
pub mod protocol;
pub mod suggestions;
