//! Axum route handlers for the Chat API.

use axum::{extract::State, Json};
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::chat::protocol::{
    convert_messages, ChatRequest, DataStreamResponse, ProtocolFormatter,
};
use crate::errors::AppError;
use crate::llm_client::prompts::CHAT_SYSTEM;
use crate::llm_client::{GenerationParams, StreamEvent, TextStream, Usage};
use crate::state::AppState;

const STREAM_BUFFER: usize = 100;
/// Message shown to the client when generation fails mid-stream; details stay in the logs.
const STREAM_ERROR_MESSAGE: &str = "An error occurred.";

/// POST /api/chat
///
/// Runs the job-search middleware over the conversation, then streams the chat
/// model's reply. Failures before the first byte are returned as JSON errors.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<DataStreamResponse, AppError> {
    let messages = convert_messages(request.messages);
    if messages.is_empty() {
        return Err(AppError::Validation("messages cannot be empty".to_string()));
    }

    let provider_metadata = request
        .selected_file_pathnames
        .map(|selection| json!({ "files": { "selection": selection } }));
    if let Some(metadata) = &provider_metadata {
        debug!("Provider metadata: {metadata}");
    }

    let params = GenerationParams {
        model: state.config.chat_model.clone(),
        system: CHAT_SYSTEM.to_string(),
        messages,
        provider_metadata,
    };

    let span = info_span!("stream_text", function_id = "stream-text");

    let stream = async {
        let params = state.middleware.transform_params(params).await?;
        state
            .llm
            .stream_text(&params)
            .await
            .map_err(|e| AppError::from_llm("generation", e))
    }
    .instrument(span.clone())
    .await?;

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(pump_stream(stream, tx).instrument(span));

    Ok(DataStreamResponse::new(ReceiverStream::new(rx)))
}

/// Relays model events to the response channel as data-stream parts.
/// Stops early when the client goes away.
async fn pump_stream(mut stream: TextStream, tx: mpsc::Sender<String>) {
    let message_id = format!("msg-{}", Uuid::new_v4().simple());
    if tx
        .send(ProtocolFormatter::format_start(&message_id))
        .await
        .is_err()
    {
        return;
    }

    let mut finish_reason = "unknown".to_string();
    let mut usage = Usage::default();
    let mut failed = false;

    while let Some(event) = stream.next().await {
        let part = match event {
            Ok(StreamEvent::TextDelta(text)) => ProtocolFormatter::format_text(&text),
            Ok(StreamEvent::Finish {
                finish_reason: reason,
                usage: u,
            }) => {
                finish_reason = reason;
                usage = u;
                continue;
            }
            Err(e) => {
                error!("Error while streaming reply: {e}");
                finish_reason = "error".to_string();
                failed = true;
                ProtocolFormatter::format_error(STREAM_ERROR_MESSAGE)
            }
        };

        if tx.send(part).await.is_err() {
            debug!("Client disconnected; dropping reply stream");
            return;
        }

        if failed {
            break;
        }
    }

    let _ = tx
        .send(ProtocolFormatter::format_step_finish(&finish_reason, usage))
        .await;
    let _ = tx
        .send(ProtocolFormatter::format_finish(&finish_reason, usage))
        .await;
}
