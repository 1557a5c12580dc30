/// LLM Client: the single point of entry for all model calls in the service.
///
/// ARCHITECTURAL RULE: No other module may call the provider API directly.
/// Classification, extraction and chat generation all go through `LanguageModel`,
/// implemented here by `LlmClient` against an OpenAI-compatible Chat Completions API.
use std::pin::Pin;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::message::{ContentPart, Message, Role};

#[cfg(test)]
pub mod mock;
pub mod prompts;
pub mod sse;

use sse::SseDecoder;

const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM refused the request: {0}")]
    Refusal(String),

    /// Output was produced but does not conform to the requested schema.
    #[error("Schema violation: {0}")]
    Schema(String),
}

/// Parameters for the final, streamed chat generation. This is what the
/// job-search middleware rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    /// Caller-supplied metadata; logged, never sent to the provider.
    pub provider_metadata: Option<Value>,
}

/// A single schema-constrained completion over one prompt.
#[derive(Debug, Clone)]
pub struct JsonRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    pub schema_name: &'a str,
    pub schema: Value,
    /// Ask the provider to enforce the schema exactly (all properties required).
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    Finish { finish_reason: String, usage: Usage },
}

pub type TextStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// The model seam. Carried in `AppState` as `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Runs a structured-output completion and returns the parsed JSON value.
    /// Callers still validate the value against their own types.
    async fn generate_json(&self, request: JsonRequest<'_>) -> Result<Value, LlmError>;

    /// Starts a streamed chat completion.
    async fn stream_text(&self, params: &GenerationParams) -> Result<TextStream, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// The LLM client used by every service in the API.
/// Wraps the Chat Completions API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_delay: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Overrides the base backoff delay (doubles per attempt).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Posts a request body, retrying on 429 (rate limit) and 5xx errors with
    /// exponential backoff. Returns the successful response unread.
    async fn send(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_delay * (1 << (attempt - 1));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.completions_url())
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OpenAiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn generate_json(&self, request: JsonRequest<'_>) -> Result<Value, LlmError> {
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                    "strict": request.strict,
                }
            }
        });

        let completion: ChatCompletion = self.send(&body).await?.json().await?;

        if let Some(usage) = completion.usage {
            debug!(
                "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                request.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyContent)?;

        if let Some(refusal) = message.refusal {
            return Err(LlmError::Refusal(refusal));
        }

        let text = message.content.ok_or(LlmError::EmptyContent)?;
        let text = strip_json_fences(&text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }

        serde_json::from_str(text)
            .map_err(|e| LlmError::Schema(format!("{} output is not valid JSON: {e}", request.schema_name)))
    }

    async fn stream_text(&self, params: &GenerationParams) -> Result<TextStream, LlmError> {
        let body = json!({
            "model": params.model,
            "messages": messages_to_openai_spec(&params.system, &params.messages),
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        let bytes = self.send(&body).await?.bytes_stream();

        Ok(Box::pin(decode_chat_stream(bytes)))
    }
}

/// Turns a Chat Completions SSE byte stream into text deltas followed by a
/// single `Finish` event.
fn decode_chat_stream<S>(bytes: S) -> impl Stream<Item = Result<StreamEvent, LlmError>> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::default();
        let mut finish_reason: Option<String> = None;
        let mut usage = Usage::default();

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(LlmError::Http)?;
            for data in decoder.push(&chunk) {
                if data == sse::DONE {
                    break 'read;
                }
                let parsed: ChatCompletionChunk =
                    serde_json::from_str(&data).map_err(LlmError::Parse)?;
                if let Some(u) = parsed.usage {
                    usage = u;
                }
                for choice in parsed.choices {
                    if let Some(reason) = choice.finish_reason {
                        finish_reason = Some(reason);
                    }
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        yield StreamEvent::TextDelta(text);
                    }
                }
            }
        }

        yield StreamEvent::Finish {
            finish_reason: finish_reason.unwrap_or_else(|| "unknown".to_string()),
            usage,
        };
    }
}

/// Converts the system prompt and messages into Chat Completions `messages`.
pub fn messages_to_openai_spec(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::with_capacity(messages.len() + 1);

    if !system.is_empty() {
        spec.push(json!({ "role": "system", "content": system }));
    }

    for message in messages {
        match message.role {
            Role::User => {
                let parts: Vec<Value> = message.content.iter().filter_map(user_part_spec).collect();
                let content = match parts.as_slice() {
                    [single] if single["type"] == "text" => single["text"].clone(),
                    _ => Value::Array(parts),
                };
                spec.push(json!({ "role": "user", "content": content }));
            }
            Role::Assistant => {
                spec.push(json!({ "role": "assistant", "content": message.text_content() }));
            }
            Role::System => {
                spec.push(json!({ "role": "system", "content": message.text_content() }));
            }
        }
    }

    spec
}

fn user_part_spec(part: &ContentPart) -> Option<Value> {
    match part {
        ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
        ContentPart::Image { image, .. } => Some(json!({
            "type": "image_url",
            "image_url": { "url": image }
        })),
        ContentPart::File { data, .. } if data.starts_with("data:") => Some(json!({
            "type": "file",
            "file": { "file_data": data }
        })),
        ContentPart::File { mime_type, .. } => {
            warn!("Skipping {mime_type} file part: only data URLs can be forwarded");
            None
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new("test-key".to_string(), format!("{}/v1/", server.uri()))
            .unwrap()
            .with_retry_delay(Duration::from_millis(5))
    }

    fn classify_request() -> JsonRequest<'static> {
        JsonRequest {
            model: "gpt-4o-mini",
            system: "classify",
            prompt: "find me a job",
            schema_name: "classification",
            schema: json!({"type": "object"}),
            strict: true,
        }
    }

    fn completion_with(content: &str) -> Value {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        })
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_messages_to_openai_spec_prepends_system_and_flattens_single_text() {
        let messages = vec![Message::user("hello"), Message::assistant("hi there")];
        let spec = messages_to_openai_spec("be nice", &messages);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec[0], json!({"role": "system", "content": "be nice"}));
        assert_eq!(spec[1], json!({"role": "user", "content": "hello"}));
        assert_eq!(spec[2], json!({"role": "assistant", "content": "hi there"}));
    }

    #[test]
    fn test_messages_to_openai_spec_keeps_multipart_user_content() {
        let message = Message::user("look")
            .with_part(ContentPart::Image {
                image: "https://example.com/x.png".to_string(),
                mime_type: Some("image/png".to_string()),
            })
            .with_part(ContentPart::File {
                data: "https://example.com/notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
            });

        let spec = messages_to_openai_spec("", &[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(
            spec[0]["content"],
            json!([
                {"type": "text", "text": "look"},
                {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}}
            ])
        );
    }

    #[tokio::test]
    async fn test_generate_json_sends_schema_and_parses_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "response_format": {
                    "type": "json_schema",
                    "json_schema": { "name": "classification", "strict": true }
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_with(r#"{"result":"other"}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let value = client_for(&server)
            .generate_json(classify_request())
            .await
            .unwrap();
        assert_eq!(value, json!({"result": "other"}));
    }

    #[tokio::test]
    async fn test_generate_json_non_json_content_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_with("job_search")))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_json(classify_request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[tokio::test]
    async fn test_generate_json_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": null, "refusal": "no" } }]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_json(classify_request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Refusal(ref r) if r == "no"));
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_with(r#"{"result":"job_search"}"#)),
            )
            .mount(&server)
            .await;

        let value = client_for(&server)
            .generate_json(classify_request())
            .await
            .unwrap();
        assert_eq!(value["result"], "job_search");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(MAX_RETRIES as u64)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_json(classify_request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried_and_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_json(classify_request())
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_text_yields_deltas_then_finish() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true, "model": "gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let params = GenerationParams {
            model: "gpt-4o".to_string(),
            system: "be brief".to_string(),
            messages: vec![Message::user("hi")],
            provider_metadata: None,
        };

        let events: Vec<StreamEvent> = client_for(&server)
            .stream_text(&params)
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Hello".to_string()),
                StreamEvent::TextDelta(" there".to_string()),
                StreamEvent::Finish {
                    finish_reason: "stop".to_string(),
                    usage: Usage {
                        prompt_tokens: 20,
                        completion_tokens: 2
                    },
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_text_malformed_chunk_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: {not json}\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let params = GenerationParams {
            model: "gpt-4o".to_string(),
            system: String::new(),
            messages: vec![Message::user("hi")],
            provider_metadata: None,
        };

        let mut stream = client_for(&server).stream_text(&params).await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn test_decode_chat_stream_handles_lines_split_across_chunks() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"con")),
            Ok(Bytes::from_static(b"tent\":\"Hi\"}}]}\n\ndata: {\"choices\":[{\"delta\":{},")),
            Ok(Bytes::from_static(b"\"finish_reason\":\"length\"}]}\n\n")),
        ];

        let events: Vec<StreamEvent> = decode_chat_stream(futures::stream::iter(chunks))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Hi".to_string()),
                StreamEvent::Finish {
                    finish_reason: "length".to_string(),
                    usage: Usage::default(),
                },
            ]
        );
    }
}
