//! Admin console handlers
//!
//! Every route here sits behind `require_admin`. The statistics are computed
//! from full listings so the figures are identical across store backends.
//!
//! Author: hephaex@gmail.com

use super::parse_id;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use biolab_core::stats::{self, ActivityLogEntry, AdminStats, SampleTrendPoint};
use biolab_core::{Report, Sample, User, UserPatch};
use chrono::Utc;
use std::sync::Arc;

async fn all_users(state: &AppState) -> Result<Vec<User>, AppError> {
    state
        .auth
        .credentials
        .list_users()
        .await
        .map_err(AppError::context("Failed to fetch users"))
}

async fn all_samples(state: &AppState) -> Result<Vec<Sample>, AppError> {
    state
        .lab
        .list_samples()
        .await
        .map_err(AppError::context("Failed to fetch samples"))
}

async fn all_reports(state: &AppState) -> Result<Vec<Report>, AppError> {
    state
        .lab
        .list_reports()
        .await
        .map_err(AppError::context("Failed to fetch reports"))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "All users, newest first", body = Vec<User>),
        (status = 403, description = "Admin access required", body = crate::error::ApiError),
    )
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(all_users(&state).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid user data", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id, "user")?;
    let Json(patch) = body.map_err(|e| AppError::validation("Invalid user data", e.body_text()))?;

    let user = state.auth.service().admin_update(&admin, id, patch).await?;
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete your own account", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "user")?;
    state.auth.service().admin_delete(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    responses((status = 200, description = "Admin dashboard figures", body = AdminStats))
)]
pub async fn admin_stats(State(state): State<Arc<AppState>>) -> Result<Json<AdminStats>, AppError> {
    let users = all_users(&state).await?;
    let samples = all_samples(&state).await?;
    let reports = all_reports(&state).await?;

    Ok(Json(stats::admin_stats(&users, &samples, &reports, Utc::now())))
}

#[utoipa::path(
    get,
    path = "/api/admin/recent-users",
    tag = "admin",
    responses((status = 200, description = "Most recently registered users", body = Vec<User>))
)]
pub async fn recent_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, AppError> {
    let users = all_users(&state).await?;
    Ok(Json(stats::recent_users(&users)))
}

#[utoipa::path(
    get,
    path = "/api/admin/recent-samples",
    tag = "admin",
    responses((status = 200, description = "Most recently submitted samples", body = Vec<Sample>))
)]
pub async fn recent_samples(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Sample>>, AppError> {
    let samples = all_samples(&state).await?;
    Ok(Json(stats::recent_samples(&samples)))
}

#[utoipa::path(
    get,
    path = "/api/admin/activity-logs",
    tag = "admin",
    responses((status = 200, description = "Recent registrations and submissions", body = Vec<ActivityLogEntry>))
)]
pub async fn activity_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ActivityLogEntry>>, AppError> {
    let users = all_users(&state).await?;
    let samples = all_samples(&state).await?;
    Ok(Json(stats::activity_logs(&users, &samples)))
}

#[utoipa::path(
    get,
    path = "/api/admin/sample-trends",
    tag = "admin",
    responses((status = 200, description = "Samples per day over the last week", body = Vec<SampleTrendPoint>))
)]
pub async fn sample_trends(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SampleTrendPoint>>, AppError> {
    let samples = all_samples(&state).await?;
    Ok(Json(stats::sample_trends(&samples, Utc::now())))
}
