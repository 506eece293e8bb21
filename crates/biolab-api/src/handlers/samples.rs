//! Sample handlers
//!
//! Non-admin callers only ever see their own samples; admins see all.
//! Lookups by id answer 404 before ownership is checked.
//!
//! Author: hephaex@gmail.com

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
use biolab_core::{NewNotification, NewSample, Report, Sample, SamplePatch};
use std::sync::Arc;

/// Load a sample the caller may act on
pub(crate) async fn owned_sample(
    state: &AppState,
    user: &CurrentUser,
    id: i32,
) -> Result<Sample, AppError> {
    let sample = state
        .lab
        .get_sample(id)
        .await
        .map_err(AppError::context("Failed to fetch sample"))?
        .ok_or_else(|| AppError::not_found("Sample not found"))?;

    user.require_owner_or_admin(sample.user_id)?;
    Ok(sample)
}

/// List samples
#[utoipa::path(
    get,
    path = "/api/samples",
    tag = "samples",
    responses(
        (status = 200, description = "Samples visible to the caller", body = Vec<Sample>),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn list_samples(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<Sample>>, AppError> {
    let samples = if user.is_admin() {
        state.lab.list_samples().await
    } else {
        state.lab.list_samples_by_user(user.id).await
    }
    .map_err(AppError::context("Failed to fetch samples"))?;

    Ok(Json(samples))
}

/// Submit a sample; the caller becomes its owner
#[utoipa::path(
    post,
    path = "/api/samples",
    tag = "samples",
    request_body = NewSample,
    responses(
        (status = 201, description = "Sample created", body = Sample),
        (status = 400, description = "Invalid sample data or duplicate sample ID", body = crate::error::ApiError),
    )
)]
pub async fn create_sample(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<NewSample>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut new = validated(body, "Invalid sample data")?;
    new.user_id = user.id;

    let sample = state
        .lab
        .create_sample(new)
        .await
        .map_err(AppError::context("Invalid sample data"))?;

    state
        .lab
        .create_notification(NewNotification::sample_submitted(user.id, &sample.sample_id))
        .await
        .map_err(AppError::context("Failed to create notification"))?;

    tracing::info!(sample_id = %sample.sample_id, user_id = user.id, "Sample submitted");
    Ok((StatusCode::CREATED, Json(sample)))
}

#[utoipa::path(
    get,
    path = "/api/samples/{id}",
    tag = "samples",
    params(("id" = i32, Path, description = "Sample id")),
    responses(
        (status = 200, description = "Sample", body = Sample),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn get_sample(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Sample>, AppError> {
    let id = parse_id(&id, "sample")?;
    Ok(Json(owned_sample(&state, &user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/samples/{id}",
    tag = "samples",
    params(("id" = i32, Path, description = "Sample id")),
    request_body = SamplePatch,
    responses(
        (status = 200, description = "Updated sample", body = Sample),
        (status = 400, description = "Invalid sample data", body = crate::error::ApiError),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn update_sample(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<SamplePatch>, JsonRejection>,
) -> Result<Json<Sample>, AppError> {
    let id = parse_id(&id, "sample")?;
    owned_sample(&state, &user, id).await?;
    let patch = validated(body, "Invalid sample data")?;

    let sample = state
        .lab
        .update_sample(id, &patch)
        .await
        .map_err(AppError::context("Failed to update sample"))?;
    Ok(Json(sample))
}

#[utoipa::path(
    delete,
    path = "/api/samples/{id}",
    tag = "samples",
    params(("id" = i32, Path, description = "Sample id")),
    responses(
        (status = 204, description = "Sample deleted"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_sample(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "sample")?;
    owned_sample(&state, &user, id).await?;

    state
        .lab
        .delete_sample(id)
        .await
        .map_err(AppError::context("Failed to delete sample"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reports generated for one sample
#[utoipa::path(
    get,
    path = "/api/samples/{id}/reports",
    tag = "samples",
    params(("id" = i32, Path, description = "Sample id")),
    responses(
        (status = 200, description = "Reports of the sample", body = Vec<Report>),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn list_sample_reports(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Report>>, AppError> {
    let id = parse_id(&id, "sample")?;
    owned_sample(&state, &user, id).await?;

    let reports = state
        .lab
        .list_reports_by_sample(id)
        .await
        .map_err(AppError::context("Failed to fetch reports"))?;
    Ok(Json(reports))
}
