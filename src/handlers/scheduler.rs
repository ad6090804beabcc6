//! Job trigger routes called by the external scheduler (or an admin)

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use crate::middleware::SchedulerCaller;
use crate::services::settings::validate_display_weeks;
use crate::services::sync::SyncStatus;
use crate::state::AppState;
use crate::utils::errors::{Result, SchedulerError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync-volunteers", post(sync_volunteers))
        .route("/send-weekly-reminders", post(send_weekly_reminders))
        .route("/send-confirmation-emails", post(send_confirmation_emails))
        .route("/rotate-schedule", post(rotate_schedule))
        .route("/scheduler-health", get(scheduler_health))
}

fn ensure_enabled(state: &AppState) -> Result<()> {
    if state.settings.features.scheduler_api {
        Ok(())
    } else {
        Err(SchedulerError::ServiceUnavailable("Scheduler API is disabled".to_string()))
    }
}

/// POST /admin/sync-volunteers
async fn sync_volunteers(State(state): State<AppState>, SchedulerCaller(caller): SchedulerCaller) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    info!(caller = caller.display_name(), "Syncing volunteers from signup sheet");

    match state.services.sync.sync_volunteers().await {
        Ok(report) => {
            let (status, message) = match report.status {
                SyncStatus::Success => ("success", "Volunteers synced successfully"),
                SyncStatus::PartialFailure => ("partial_success", "Volunteers synced with some issues"),
            };
            Ok(Json(json!({ "status": status, "message": message, "details": report })))
        }
        Err(e) if e.is_transient() => {
            error!(error = %e, "Volunteer sync failed on a transient error");
            Ok(Json(json!({
                "status": "error",
                "message": "Failed to sync volunteers",
                "details": { "error": e.to_string() },
            })))
        }
        Err(e) => Err(e),
    }
}

/// POST /admin/send-weekly-reminders
async fn send_weekly_reminders(
    State(state): State<AppState>,
    SchedulerCaller(caller): SchedulerCaller,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    info!(caller = caller.display_name(), "Sending weekly reminders");
    let report = state.services.reminders.send_weekly_reminders().await?;
    Ok(Json(json!(report)))
}

/// POST /admin/send-confirmation-emails
async fn send_confirmation_emails(
    State(state): State<AppState>,
    SchedulerCaller(caller): SchedulerCaller,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    info!(caller = caller.display_name(), "Sending pending confirmation emails");
    let report = state.services.email.send_confirmation_emails_to_new_volunteers().await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Confirmation emails sent successfully",
        "details": report,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RotateQuery {
    pub display_weeks: Option<u32>,
}

/// POST /admin/rotate-schedule?display_weeks=
async fn rotate_schedule(
    State(state): State<AppState>,
    SchedulerCaller(caller): SchedulerCaller,
    Query(query): Query<RotateQuery>,
) -> Result<Json<Value>> {
    ensure_enabled(&state)?;
    if let Some(weeks) = query.display_weeks {
        validate_display_weeks(weeks)?;
    }
    info!(caller = caller.display_name(), display_weeks = ?query.display_weeks, "Rotating schedule sheets");
    let report = state.services.schedule.rotate(query.display_weeks).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Schedule sheets rotated successfully",
        "details": report,
    })))
}

/// GET /admin/scheduler-health
async fn scheduler_health(State(state): State<AppState>, SchedulerCaller(_caller): SchedulerCaller) -> Json<Value> {
    match state.services.sync.fetch_submissions().await {
        Ok(submissions) => Json(json!({
            "status": "healthy",
            "google_sheets_connectivity": "ok",
            "submissions_count": submissions.len(),
        })),
        Err(e) => Json(json!({
            "status": "unhealthy",
            "google_sheets_connectivity": "error",
            "error": e.to_string(),
        })),
    }
}
