//! Unauthenticated routes: service info, health, email preferences and the
//! Messenger webhook

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use crate::agent::config::RATE_LIMITED_MESSAGE;
use crate::agent::{AgentResponse, MessageRequest, QuickReplyRequest};
use crate::handlers::pages::{self, Notice};
use crate::services::messenger::{verify_webhook, InboundEvent, WebhookPayload};
use crate::state::AppState;
use crate::utils::errors::SchedulerError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/unsubscribe", get(preferences_page).post(update_preferences))
        .route("/webhook/messenger", get(verify_messenger_webhook).post(messenger_webhook))
}

/// GET /
async fn service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "Vietnam Hearts Scheduler",
        "version": crate::VERSION,
        "environment": state.settings.server.environment,
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "admin": "/admin/dashboard",
            "webhook": "/webhook/messenger",
        },
    }))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    let services = &state.services;

    let database = match services.db.stats().await {
        Ok(stats) => json!({
            "status": "healthy",
            "stats": { "volunteers": stats.total_volunteers, "active": stats.active_volunteers, "emails": stats.total_emails },
            "type": "PostgreSQL",
        }),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            json!({ "status": "unhealthy", "error": e.to_string(), "type": "PostgreSQL" })
        }
    };

    let sheets = if !services.sheets.is_enabled() {
        json!({ "status": "not_configured" })
    } else {
        match services.runtime.schedule_sheet_id().await {
            None => json!({ "status": "not_configured", "error": "Schedule sheet id is not set" }),
            Some(sheet_id) => match services.sheets.get_values(&sheet_id, "A1:A1").await {
                Ok(_) => json!({ "status": "healthy" }),
                Err(e) => json!({ "status": "unhealthy", "error": e.to_string() }),
            },
        }
    };

    let messenger_ready = services.settings.messenger.verify_token.as_deref().is_some_and(|t| !t.is_empty())
        && services.settings.messenger.page_access_token.as_deref().is_some_and(|t| !t.is_empty());

    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.settings.server.environment,
        "dry_run": services.runtime.dry_run().await,
        "services": {
            "database": database,
            "google_sheets": sheets,
            "facebook_messenger": {
                "status": if messenger_ready { "healthy" } else { "unhealthy" },
                "sender": services.messenger.name(),
                "webhook_url": "/webhook/messenger",
            },
            "cache": { "backend": services.cache.backend_name() },
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceForm {
    #[serde(default)]
    pub unsubscribe_type: String,
}

fn html_error(status: StatusCode, message: &str) -> Response {
    (status, Html(pages::error_page(message))).into_response()
}

/// GET /unsubscribe?token=
async fn preferences_page(State(state): State<AppState>, Query(query): Query<TokenQuery>) -> Response {
    let token = query.token.unwrap_or_default();
    match state.services.volunteers.find_by_token(&token).await {
        Ok(volunteer) => Html(pages::preferences_page(&volunteer, &token, Notice::None)).into_response(),
        Err(SchedulerError::NotFound(_)) | Err(SchedulerError::InvalidInput(_)) => {
            warn!("Invalid unsubscribe token attempted");
            html_error(StatusCode::BAD_REQUEST, pages::INVALID_TOKEN_MESSAGE)
        }
        Err(e) => {
            error!(error = %e, "Error showing preferences page");
            html_error(StatusCode::INTERNAL_SERVER_ERROR, pages::LOAD_ERROR_MESSAGE)
        }
    }
}

/// POST /unsubscribe?token=
async fn update_preferences(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Form(form): Form<PreferenceForm>,
) -> Response {
    let token = query.token.unwrap_or_default();
    let volunteers = &state.services.volunteers;

    match volunteers.update_preferences_by_token(&token, &form.unsubscribe_type).await {
        Ok(update) => {
            info!(volunteer_id = update.volunteer.id, change = update.change.as_str(), "Preferences updated");
            Html(pages::preferences_page(&update.volunteer, &token, Notice::Success(&update.message))).into_response()
        }
        Err(SchedulerError::InvalidInput(_)) if !token.trim().is_empty() => {
            match volunteers.find_by_token(&token).await {
                Ok(volunteer) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Html(pages::preferences_page(&volunteer, &token, Notice::Error(pages::INVALID_SELECTION_MESSAGE))),
                )
                    .into_response(),
                Err(_) => html_error(StatusCode::BAD_REQUEST, pages::INVALID_TOKEN_MESSAGE),
            }
        }
        Err(SchedulerError::NotFound(_)) | Err(SchedulerError::InvalidInput(_)) => {
            warn!("Invalid unsubscribe token attempted");
            html_error(StatusCode::BAD_REQUEST, pages::INVALID_TOKEN_MESSAGE)
        }
        Err(e) => {
            error!(error = %e, "Error updating email preferences");
            html_error(StatusCode::INTERNAL_SERVER_ERROR, pages::UPDATE_ERROR_MESSAGE)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhook/messenger
async fn verify_messenger_webhook(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    match verify_webhook(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        state.settings.messenger.verify_token.as_deref(),
    ) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => SchedulerError::PermissionDenied("Webhook verification failed".to_string()).into_response(),
    }
}

/// POST /webhook/messenger
async fn messenger_webhook(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let payload: WebhookPayload = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Malformed webhook payload");
            return SchedulerError::InvalidInput("Invalid webhook payload".to_string()).into_response();
        }
    };

    if !payload.is_supported() {
        warn!(object = %payload.object, "Invalid webhook object");
        return SchedulerError::InvalidInput(format!("Unsupported webhook object: {}", payload.object)).into_response();
    }

    if !state.settings.features.chatbot {
        info!("Chatbot disabled, acknowledging webhook without processing");
        return Json(json!({ "status": "ok" })).into_response();
    }

    let platform = payload.platform();
    for event in payload.events() {
        handle_event(&state, platform, event).await;
    }

    Json(json!({ "status": "ok" })).into_response()
}

async fn handle_event(state: &AppState, platform: &str, event: InboundEvent) {
    let sender = event.sender().to_string();
    let messenger = &state.services.messenger;
    let agent = &state.services.agent;

    if agent.check_rate_limit(&sender).is_err() {
        warn!(sender = %sender, "Messenger sender rate limited");
        if let Err(e) = messenger.send_text(&sender, RATE_LIMITED_MESSAGE).await {
            error!(sender = %sender, error = %e, "Failed to send rate limit notice");
        }
        return;
    }

    let response = match event {
        InboundEvent::Text { text, message_id, .. } => {
            let user_name = match messenger.get_user_profile(&sender).await {
                Ok(profile) => profile.and_then(|p| p.display_name()),
                Err(e) => {
                    warn!(sender = %sender, error = %e, "Could not load sender profile");
                    None
                }
            };
            let request = MessageRequest {
                user_id: sender.clone(),
                platform: platform.to_string(),
                message_text: text,
                user_name,
                platform_message_id: message_id,
            };
            agent.process_message(&request).await
        }
        InboundEvent::QuickReply { payload, .. } | InboundEvent::Postback { payload, .. } => {
            let request = QuickReplyRequest {
                user_id: sender.clone(),
                platform: platform.to_string(),
                payload,
            };
            agent.process_quick_reply(&request).await
        }
    };

    send_response(state, &sender, &response).await;
}

async fn send_response(state: &AppState, recipient: &str, response: &AgentResponse) {
    let result = state
        .services
        .messenger
        .send_quick_replies(recipient, &response.response_text, &response.quick_replies)
        .await;
    match result {
        Ok(message_id) => info!(recipient = %recipient, message_id = %message_id, intent = %response.intent, "Reply sent"),
        Err(e) => error!(recipient = %recipient, error = %e, "Failed to send reply"),
    }
}
