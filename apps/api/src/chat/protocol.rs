//! Wire types for the chat UI: incoming UI messages and the line-oriented
//! data-stream protocol used for the streamed reply.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::llm_client::Usage;
use crate::models::message::{ContentPart, Message};

const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-data-stream");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<UiMessage>,
    /// Opaque metadata from the UI, passed through untouched.
    #[serde(default)]
    pub selected_file_pathnames: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UiMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub experimental_attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Converts UI messages to model messages. Unknown roles are skipped.
pub fn convert_messages(incoming: Vec<UiMessage>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(incoming.len());

    for msg in incoming {
        match msg.role.as_str() {
            "user" => messages.push(
                msg.experimental_attachments
                    .into_iter()
                    .map(attachment_part)
                    .fold(Message::user(msg.content), Message::with_part),
            ),
            "assistant" => messages.push(Message::assistant(msg.content)),
            "system" => messages.push(Message::system(msg.content)),
            other => {
                warn!("Skipping message with unsupported role: {}", other);
            }
        }
    }

    messages
}

fn attachment_part(attachment: Attachment) -> ContentPart {
    match attachment.content_type {
        Some(ct) if ct.starts_with("image/") => ContentPart::Image {
            image: attachment.url,
            mime_type: Some(ct),
        },
        ct => ContentPart::File {
            data: attachment.url,
            mime_type: ct.unwrap_or_else(|| "application/octet-stream".to_string()),
        },
    }
}

/// Formats data-stream parts. Each part is `<code>:<json>\n`.
pub struct ProtocolFormatter;

impl ProtocolFormatter {
    pub fn format_start(message_id: &str) -> String {
        format!("f:{}\n", json!({ "messageId": message_id }))
    }

    pub fn format_text(text: &str) -> String {
        format!("0:{}\n", Value::String(text.to_string()))
    }

    pub fn format_error(message: &str) -> String {
        format!("3:{}\n", Value::String(message.to_string()))
    }

    pub fn format_step_finish(reason: &str, usage: Usage) -> String {
        let step = json!({
            "finishReason": reason,
            "usage": usage_json(usage),
            "isContinued": false
        });
        format!("e:{}\n", step)
    }

    pub fn format_finish(reason: &str, usage: Usage) -> String {
        let finish = json!({
            "finishReason": reason,
            "usage": usage_json(usage)
        });
        format!("d:{}\n", finish)
    }
}

fn usage_json(usage: Usage) -> Value {
    json!({
        "promptTokens": usage.prompt_tokens,
        "completionTokens": usage.completion_tokens
    })
}

/// Streaming response body fed by a channel of already-formatted parts.
pub struct DataStreamResponse {
    rx: ReceiverStream<String>,
}

impl DataStreamResponse {
    pub fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl IntoResponse for DataStreamResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self.rx.map(Ok::<_, Infallible>));

        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
                (DATA_STREAM_HEADER, "v1"),
            ],
            body,
        )
            .into_response()
    }
}
