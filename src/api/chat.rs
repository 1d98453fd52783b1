use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{AgentReply, ChatRequest};
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 4000;

/// POST /api/chat — route one message through the agent.
///
/// The agent never errors; the only failure responses here are input
/// validation and capacity.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AgentReply>, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is required".to_string()));
    }
    let message = truncate_to_char_boundary(message, MAX_MESSAGE_LEN);

    let _permit = state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat service at capacity".to_string(),
            )
        })?;

    let reply = state.agent.handle_message(&message, req.use_rag).await;
    Ok(Json(reply))
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    s.char_indices()
        .take_while(|(i, _)| *i < max_len)
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_to_char_boundary("hello", 100), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let long = "a".repeat(5000);
        let result = truncate_to_char_boundary(&long, MAX_MESSAGE_LEN);
        assert_eq!(result.len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_truncate_unicode_safe() {
        let s = "Hello 🌍 world";
        let result = truncate_to_char_boundary(s, 8);
        assert!(result.is_char_boundary(result.len()));
    }
}
