use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use super::{GenerationParams, JsonRequest, LanguageModel, LlmError, StreamEvent, TextStream, Usage};

/// What the mock saw for one `generate_json` call.
#[derive(Debug, Clone)]
pub struct RecordedJsonCall {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub schema_name: String,
}

/// A language model that replays pre-configured structured outputs in order and
/// streams a fixed reply. Records every request for assertions.
pub struct MockLanguageModel {
    json_responses: Mutex<VecDeque<Result<Value, LlmError>>>,
    reply_chunks: Vec<String>,
    fail_stream_with: Mutex<Option<LlmError>>,
    json_calls: Mutex<Vec<RecordedJsonCall>>,
    stream_calls: Mutex<Vec<GenerationParams>>,
}

impl MockLanguageModel {
    pub fn new(json_responses: Vec<Result<Value, LlmError>>) -> Self {
        Self {
            json_responses: Mutex::new(json_responses.into()),
            reply_chunks: vec!["Hello".to_string(), " world".to_string()],
            fail_stream_with: Mutex::new(None),
            json_calls: Mutex::new(Vec::new()),
            stream_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(mut self, chunks: &[&str]) -> Self {
        self.reply_chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Makes the next `stream_text` call fail before any output.
    pub fn failing_stream(self, err: LlmError) -> Self {
        *self.fail_stream_with.lock().unwrap() = Some(err);
        self
    }

    pub fn json_calls(&self) -> Vec<RecordedJsonCall> {
        self.json_calls.lock().unwrap().clone()
    }

    pub fn stream_calls(&self) -> Vec<GenerationParams> {
        self.stream_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate_json(&self, request: JsonRequest<'_>) -> Result<Value, LlmError> {
        self.json_calls.lock().unwrap().push(RecordedJsonCall {
            model: request.model.to_string(),
            system: request.system.to_string(),
            prompt: request.prompt.to_string(),
            schema_name: request.schema_name.to_string(),
        });

        self.json_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }

    async fn stream_text(&self, params: &GenerationParams) -> Result<TextStream, LlmError> {
        self.stream_calls.lock().unwrap().push(params.clone());

        if let Some(err) = self.fail_stream_with.lock().unwrap().take() {
            return Err(err);
        }

        let mut events: Vec<Result<StreamEvent, LlmError>> = self
            .reply_chunks
            .iter()
            .map(|c| Ok(StreamEvent::TextDelta(c.clone())))
            .collect();
        events.push(Ok(StreamEvent::Finish {
            finish_reason: "stop".to_string(),
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: self.reply_chunks.len() as u32,
            },
        }));

        Ok(Box::pin(stream::iter(events)))
    }
}
