use axum::Json;
use serde::Serialize;

/// A prompt the chat UI offers before the first message.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestedAction {
    pub title: &'static str,
    pub label: &'static str,
    pub action: &'static str,
}

pub const SUGGESTED_ACTIONS: [SuggestedAction; 2] = [
    SuggestedAction {
        title: "Search Software Jobs",
        label: "Find software engineer positions",
        action: "search for software engineer jobs with React and Node.js experience",
    },
    SuggestedAction {
        title: "Filter Tech Jobs",
        label: "Filter by location and salary",
        action: "filter software jobs in San Francisco paying over $150k",
    },
];

/// GET /api/chat/suggestions
pub async fn handle_suggestions() -> Json<Vec<SuggestedAction>> {
    Json(SUGGESTED_ACTIONS.to_vec())
}
