//! Runtime settings CRUD under `/settings`

use std::collections::BTreeMap;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;
use crate::middleware::AuthenticatedAdmin;
use crate::models::{CreateSettingRequest, Setting, UpdateSettingRequest};
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::logging::log_admin_action;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_settings).post(create_setting))
        .route("/dict/all", get(settings_dict))
        .route("/{key}", get(get_setting).put(update_setting).delete(delete_setting))
}

/// GET /settings/
async fn list_settings(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<Value>> {
    let settings = state.services.runtime.list().await?;
    Ok(Json(json!({ "total": settings.len(), "settings": settings })))
}

/// GET /settings/{key}
async fn get_setting(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
    Path(key): Path<String>,
) -> Result<Json<Setting>> {
    Ok(Json(state.services.runtime.find(&key).await?))
}

/// POST /settings/
async fn create_setting(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Json(request): Json<CreateSettingRequest>,
) -> Result<(StatusCode, Json<Setting>)> {
    let setting = state.services.runtime.create(request).await?;
    info!(key = %setting.key, "Created setting");
    log_admin_action(&admin.email, "create_setting", Some(setting.key.as_str()), None);
    Ok((StatusCode::CREATED, Json(setting)))
}

/// PUT /settings/{key}
async fn update_setting(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(key): Path<String>,
    Json(request): Json<UpdateSettingRequest>,
) -> Result<Json<Setting>> {
    let setting = state.services.runtime.update(&key, request).await?;
    info!(key = %key, "Updated setting");
    log_admin_action(&admin.email, "update_setting", Some(key.as_str()), None);
    Ok(Json(setting))
}

/// DELETE /settings/{key}
async fn delete_setting(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(key): Path<String>,
) -> Result<Json<Value>> {
    state.services.runtime.delete(&key).await?;
    info!(key = %key, "Deleted setting");
    log_admin_action(&admin.email, "delete_setting", Some(key.as_str()), None);
    Ok(Json(json!({ "message": format!("Setting '{}' deleted successfully", key) })))
}

/// GET /settings/dict/all
async fn settings_dict(
    State(state): State<AppState>,
    AuthenticatedAdmin(_admin): AuthenticatedAdmin,
) -> Result<Json<BTreeMap<String, String>>> {
    Ok(Json(state.services.runtime.as_map().await?))
}
