//! Report handlers
//!
//! A report belongs to the user who generated it. Generating a report also
//! requires access to the sample it describes.
//!
//! Author: hephaex@gmail.com

use super::samples::owned_sample;
use super::{parse_id, validated};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use biolab_core::{NewNotification, NewReport, Report, ReportPatch};
use std::sync::Arc;

async fn owned_report(state: &AppState, user: &CurrentUser, id: i32) -> Result<Report, AppError> {
    let report = state
        .lab
        .get_report(id)
        .await
        .map_err(AppError::context("Failed to fetch report"))?
        .ok_or_else(|| AppError::not_found("Report not found"))?;

    user.require_owner_or_admin(report.generated_by)?;
    Ok(report)
}

#[utoipa::path(
    get,
    path = "/api/reports",
    tag = "reports",
    responses((status = 200, description = "Reports visible to the caller", body = Vec<Report>))
)]
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<Report>>, AppError> {
    let reports = if user.is_admin() {
        state.lab.list_reports().await
    } else {
        state.lab.list_reports_by_user(user.id).await
    }
    .map_err(AppError::context("Failed to fetch reports"))?;

    Ok(Json(reports))
}

#[utoipa::path(
    post,
    path = "/api/reports",
    tag = "reports",
    request_body = NewReport,
    responses(
        (status = 201, description = "Report created", body = Report),
        (status = 400, description = "Invalid report data", body = crate::error::ApiError),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<NewReport>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut new = validated(body, "Invalid report data")?;
    owned_sample(&state, &user, new.sample_id).await?;
    new.generated_by = user.id;

    let report = state
        .lab
        .create_report(new)
        .await
        .map_err(AppError::context("Invalid report data"))?;

    state
        .lab
        .create_notification(NewNotification::report_generated(user.id, &report.title))
        .await
        .map_err(AppError::context("Failed to create notification"))?;

    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    tag = "reports",
    params(("id" = i32, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report", body = Report),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Report not found", body = crate::error::ApiError),
    )
)]
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Report>, AppError> {
    let id = parse_id(&id, "report")?;
    Ok(Json(owned_report(&state, &user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/reports/{id}",
    tag = "reports",
    params(("id" = i32, Path, description = "Report id")),
    request_body = ReportPatch,
    responses(
        (status = 200, description = "Updated report", body = Report),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Report not found", body = crate::error::ApiError),
    )
)]
pub async fn update_report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<ReportPatch>, JsonRejection>,
) -> Result<Json<Report>, AppError> {
    let id = parse_id(&id, "report")?;
    owned_report(&state, &user, id).await?;
    let patch = validated(body, "Invalid report data")?;

    let report = state
        .lab
        .update_report(id, &patch)
        .await
        .map_err(AppError::context("Failed to update report"))?;
    Ok(Json(report))
}

#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    tag = "reports",
    params(("id" = i32, Path, description = "Report id")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Report not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "report")?;
    owned_report(&state, &user, id).await?;

    state
        .lab
        .delete_report(id)
        .await
        .map_err(AppError::context("Failed to delete report"))?;
    Ok(StatusCode::NO_CONTENT)
}
