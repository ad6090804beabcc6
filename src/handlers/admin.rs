//! Admin dashboard and volunteer management routes under `/admin`
//!
//! Every handler takes [`AuthenticatedAdmin`], so a missing token is a 401
//! and a signed-in non-admin a 403.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use crate::config::validation::configuration_report;
use crate::handlers::pages::{self, DashboardData};
use crate::middleware::AuthenticatedAdmin;
use crate::models::{AdminUser, CreateAdminUserRequest, UpdateAdminRoleRequest, Volunteer, VolunteerSummary};
use crate::services::volunteer::VolunteerActionOutcome;
use crate::state::AppState;
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::helpers::format_timestamp;
use crate::utils::logging::log_admin_action;

const DEFAULT_EMAIL_LOG_LIMIT: i64 = 200;
const DASHBOARD_EMAIL_LIMIT: i64 = 25;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/volunteers", get(list_volunteers))
        .route("/volunteers/active", get(list_active_volunteers))
        .route("/volunteers/announcement-recipients", get(announcement_recipients))
        .route("/volunteers/{volunteer_id}", get(get_volunteer))
        .route("/volunteers/{volunteer_id}/send-confirmation", post(send_confirmation))
        .route("/volunteers/{volunteer_id}/reset-confirmation", post(reset_confirmation))
        .route("/volunteers/{volunteer_id}/resubscribe", post(resubscribe))
        .route("/volunteers/{volunteer_id}/resubscribe-weekly", post(resubscribe_weekly))
        .route("/volunteers/{volunteer_id}/deactivate", post(deactivate))
        .route("/volunteers/{volunteer_id}/reactivate", post(reactivate))
        .route("/volunteers/{volunteer_id}/send-weekly-reminder", post(send_weekly_reminder))
        .route("/email-logs", get(email_logs))
        .route("/dashboard", get(dashboard))
        .route("/reminder-stats", get(reminder_stats))
        .route("/schedule-status", get(schedule_status))
        .route("/forms/submissions", get(form_submissions))
        .route("/config/validate", get(validate_config))
        .route("/users", get(list_admin_users).post(add_admin_user))
        .route("/users/{email}/role", put(update_admin_role))
        .route("/users/{email}", axum::routing::delete(remove_admin_user))
}

/// GET /admin/volunteers
async fn list_volunteers(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Value>> {
    let volunteers: Vec<VolunteerSummary> = state.services.volunteers.summaries().await?;
    Ok(Json(json!({
        "status": "success",
        "total_volunteers": volunteers.len(),
        "volunteers": volunteers,
    })))
}

/// GET /admin/volunteers/active
async fn list_active_volunteers(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Vec<Volunteer>>> {
    Ok(Json(state.services.volunteers.list_active().await?))
}

/// GET /admin/volunteers/announcement-recipients
async fn announcement_recipients(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Value>> {
    let recipients = state.services.volunteers.announcement_recipients().await?;
    let recipients: Vec<Value> = recipients
        .iter()
        .map(|v| json!({ "id": v.id, "name": v.name, "email": v.email }))
        .collect();
    Ok(Json(json!({
        "status": "success",
        "total_recipients": recipients.len(),
        "recipients": recipients,
    })))
}

/// GET /admin/volunteers/{volunteer_id}
async fn get_volunteer(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<Volunteer>> {
    Ok(Json(state.services.volunteers.get(volunteer_id).await?))
}

fn audited(admin_email: &str, action: &str, volunteer_id: i64, outcome: VolunteerActionOutcome) -> Json<VolunteerActionOutcome> {
    log_admin_action(admin_email, action, Some(volunteer_id.to_string().as_str()), Some(outcome.message.as_str()));
    Json(outcome)
}

async fn send_confirmation(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<VolunteerActionOutcome>> {
    let outcome = state.services.volunteers.send_confirmation(volunteer_id).await?;
    Ok(audited(&admin.email, "send_confirmation", volunteer_id, outcome))
}

async fn reset_confirmation(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<VolunteerActionOutcome>> {
    let outcome = state.services.volunteers.reset_confirmation(volunteer_id).await?;
    Ok(audited(&admin.email, "reset_confirmation", volunteer_id, outcome))
}

async fn resubscribe(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<VolunteerActionOutcome>> {
    let outcome = state.services.volunteers.resubscribe(volunteer_id).await?;
    Ok(audited(&admin.email, "resubscribe", volunteer_id, outcome))
}

async fn resubscribe_weekly(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<VolunteerActionOutcome>> {
    let outcome = state.services.volunteers.resubscribe_weekly(volunteer_id).await?;
    Ok(audited(&admin.email, "resubscribe_weekly", volunteer_id, outcome))
}

async fn deactivate(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<VolunteerActionOutcome>> {
    let outcome = state.services.volunteers.deactivate(volunteer_id).await?;
    Ok(audited(&admin.email, "deactivate", volunteer_id, outcome))
}

async fn reactivate(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<VolunteerActionOutcome>> {
    let outcome = state.services.volunteers.reactivate(volunteer_id).await?;
    Ok(audited(&admin.email, "reactivate", volunteer_id, outcome))
}

async fn send_weekly_reminder(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(volunteer_id): Path<i64>,
) -> Result<Json<Value>> {
    let volunteer = state.services.volunteers.get(volunteer_id).await?;
    let sent = state.services.reminders.send_weekly_reminder_to(volunteer_id).await?;
    if !sent {
        return Err(SchedulerError::ServiceUnavailable(format!(
            "Failed to send weekly reminder to {}",
            volunteer.email
        )));
    }
    log_admin_action(&admin.email, "send_weekly_reminder", Some(volunteer_id.to_string().as_str()), None);
    Ok(Json(json!({
        "status": "success",
        "message": format!("Weekly reminder sent successfully to {}", volunteer.email),
        "volunteer_email": volunteer.email,
    })))
}

#[derive(Debug, Deserialize)]
pub struct EmailLogQuery {
    pub email_type: Option<String>,
    pub limit: Option<i64>,
}

/// GET /admin/email-logs
async fn email_logs(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
    Query(query): Query<EmailLogQuery>,
) -> Result<Json<Value>> {
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_EMAIL_LOG_LIMIT);
    let emails = state
        .services
        .db
        .emails
        .list_recent(query.email_type.as_deref(), limit)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "total_emails": emails.len(),
        "emails": emails,
    })))
}

/// GET /admin/dashboard
async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
) -> Result<Html<String>> {
    let services = &state.services;
    let volunteers = services.volunteers.summaries().await?;
    let emails = services.db.emails.list_recent(None, DASHBOARD_EMAIL_LIMIT).await?;
    let stats = services.db.stats().await?;

    let html = pages::dashboard_page(&DashboardData {
        admin_email: &admin.email,
        volunteers: &volunteers,
        emails: &emails,
        total_emails: stats.total_emails,
        dry_run: services.runtime.dry_run().await,
        generated_at: format_timestamp(chrono::Utc::now()),
    });
    Ok(Html(html))
}

/// GET /admin/reminder-stats
async fn reminder_stats(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Value>> {
    let stats = state.services.reminders.reminder_stats().await?;
    Ok(Json(json!({ "status": "success", "stats": stats })))
}

/// GET /admin/schedule-status
async fn schedule_status(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Value>> {
    let status = state.services.schedule.status().await?;
    Ok(Json(json!({ "status": "success", "schedule": status })))
}

#[derive(Debug, Deserialize)]
pub struct SubmissionsQuery {
    #[serde(default = "default_process_new")]
    pub process_new: bool,
}

fn default_process_new() -> bool {
    true
}

/// GET /admin/forms/submissions?process_new=
async fn form_submissions(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Query(query): Query<SubmissionsQuery>,
) -> Result<Json<Value>> {
    if query.process_new {
        let report = state.services.sync.sync_volunteers().await?;
        log_admin_action(&admin.email, "process_submissions", None, Some(report.message.as_str()));
        return Ok(Json(json!({ "status": report.status, "processed": true, "report": report })));
    }

    let submissions = state.services.sync.preview_submissions().await?;
    let accepted = submissions.iter().filter(|s| s.submission.is_accepted()).count();
    let new = submissions
        .iter()
        .filter(|s| s.submission.is_accepted() && !s.already_in_database)
        .count();
    Ok(Json(json!({
        "status": "success",
        "processed": false,
        "total_submissions": submissions.len(),
        "accepted_submissions": accepted,
        "non_accepted_submissions": submissions.len() - accepted,
        "new_submissions": new,
        "submissions": submissions,
    })))
}

/// GET /admin/config/validate
async fn validate_config(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Value>> {
    let runtime = &state.services.runtime;
    let schedule_sheet_id = runtime.schedule_sheet_id().await;
    let signup_sheet_id = runtime.signup_sheet_id().await;

    let mut missing = Vec::new();
    if schedule_sheet_id.is_none() {
        missing.push("SCHEDULE_SHEETS_LINK");
    }
    if signup_sheet_id.is_none() {
        missing.push("NEW_SIGNUPS_RESPONSES_LINK");
    }

    let checks = configuration_report(&state.settings);
    if !missing.is_empty() {
        return Ok(Json(json!({
            "status": "error",
            "message": format!("Missing required settings: {}", missing.join(", ")),
            "missing_settings": missing,
            "instructions": "Please configure these settings via the /settings/ endpoint",
            "checks": checks,
        })));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "All required configuration is set",
        "schedule_sheet_id": schedule_sheet_id,
        "new_signups_sheet_id": signup_sheet_id,
        "checks": checks,
    })))
}

/// GET /admin/users
async fn list_admin_users(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
) -> Result<Json<Vec<AdminUser>>> {
    Ok(Json(state.services.admin_users.list(&admin).await?))
}

/// POST /admin/users
async fn add_admin_user(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Json(request): Json<CreateAdminUserRequest>,
) -> Result<(StatusCode, Json<AdminUser>)> {
    let created = state.services.admin_users.add(&admin, &request.email, request.role).await?;
    log_admin_action(&admin.email, "add_admin", Some(created.email.as_str()), Some(created.role.as_str()));
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /admin/users/{email}/role
async fn update_admin_role(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(email): Path<String>,
    Json(request): Json<UpdateAdminRoleRequest>,
) -> Result<Json<AdminUser>> {
    let updated = state.services.admin_users.update_role(&admin, &email, request.role).await?;
    log_admin_action(&admin.email, "update_admin_role", Some(updated.email.as_str()), Some(updated.role.as_str()));
    Ok(Json(updated))
}

/// DELETE /admin/users/{email}
async fn remove_admin_user(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(email): Path<String>,
) -> Result<Json<Value>> {
    state.services.admin_users.remove(&admin, &email).await?;
    log_admin_action(&admin.email, "remove_admin", Some(email.as_str()), None);
    Ok(Json(json!({ "status": "success", "message": format!("Admin access removed for {}", email) })))
}
