//! Sensor reading handlers
//!
//! Readings hang off a sample, so access follows the sample's owner.
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
use biolab_core::{NewSensorReading, SensorReading};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/sensor-data",
    tag = "sensor-data",
    request_body = NewSensorReading,
    responses(
        (status = 201, description = "Reading recorded", body = SensorReading),
        (status = 400, description = "Invalid sensor data", body = crate::error::ApiError),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn create_reading(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<NewSensorReading>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let new = validated(body, "Invalid sensor data")?;
    owned_sample(&state, &user, new.sample_id).await?;

    let reading = state
        .lab
        .create_sensor_reading(new)
        .await
        .map_err(AppError::context("Invalid sensor data"))?;
    Ok((StatusCode::CREATED, Json(reading)))
}

#[utoipa::path(
    get,
    path = "/api/sensor-data/sample/{sampleId}",
    tag = "sensor-data",
    params(("sampleId" = i32, Path, description = "Sample id")),
    responses(
        (status = 200, description = "Readings of the sample, newest first", body = Vec<SensorReading>),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sample not found", body = crate::error::ApiError),
    )
)]
pub async fn list_readings(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(sample_id): Path<String>,
) -> Result<Json<Vec<SensorReading>>, AppError> {
    let sample_id = parse_id(&sample_id, "sample")?;
    owned_sample(&state, &user, sample_id).await?;

    let readings = state
        .lab
        .list_sensor_readings(sample_id)
        .await
        .map_err(AppError::context("Failed to fetch sensor data"))?;
    Ok(Json(readings))
}

#[utoipa::path(
    delete,
    path = "/api/sensor-data/{id}",
    tag = "sensor-data",
    params(("id" = i32, Path, description = "Reading id")),
    responses(
        (status = 204, description = "Reading deleted"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Sensor reading not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_reading(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "sensor reading")?;
    let reading = state
        .lab
        .get_sensor_reading(id)
        .await
        .map_err(AppError::context("Failed to fetch sensor data"))?
        .ok_or_else(|| AppError::not_found("Sensor reading not found"))?;
    owned_sample(&state, &user, reading.sample_id).await?;

    state
        .lab
        .delete_sensor_reading(id)
        .await
        .map_err(AppError::context("Failed to delete sensor reading"))?;
    Ok(StatusCode::NO_CONTENT)
}
