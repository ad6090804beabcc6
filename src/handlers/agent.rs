//! Direct access to the chat assistant under `/agent`

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use crate::agent::{AgentResponse, MessageRequest, QuickReplyRequest};
use crate::state::AppState;
use crate::utils::errors::{Result, SchedulerError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(agent_health))
        .route("/message", post(process_message))
        .route("/quick-reply", post(process_quick_reply))
}

fn ensure_enabled(state: &AppState) -> Result<()> {
    if state.settings.features.chatbot {
        Ok(())
    } else {
        Err(SchedulerError::ServiceUnavailable("Chatbot is disabled".to_string()))
    }
}

/// GET /agent/health
async fn agent_health(State(state): State<AppState>) -> Json<Value> {
    Json(state.services.agent.health().await)
}

/// POST /agent/message
async fn process_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<AgentResponse>> {
    ensure_enabled(&state)?;
    if request.user_id.trim().is_empty() || request.message_text.trim().is_empty() {
        return Err(SchedulerError::InvalidInput("user_id and message_text are required".to_string()));
    }
    state.services.agent.check_rate_limit(&request.user_id)?;
    Ok(Json(state.services.agent.process_message(&request).await))
}

/// POST /agent/quick-reply
async fn process_quick_reply(
    State(state): State<AppState>,
    Json(request): Json<QuickReplyRequest>,
) -> Result<Json<AgentResponse>> {
    ensure_enabled(&state)?;
    if request.user_id.trim().is_empty() || request.payload.trim().is_empty() {
        return Err(SchedulerError::InvalidInput("user_id and payload are required".to_string()));
    }
    state.services.agent.check_rate_limit(&request.user_id)?;
    Ok(Json(state.services.agent.process_quick_reply(&request).await))
}
