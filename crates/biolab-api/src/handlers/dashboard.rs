//! Dashboard handler
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use biolab_core::DashboardStats;
use std::sync::Arc;

/// Lab-wide summary figures
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "dashboard",
    responses((status = 200, description = "Dashboard statistics", body = DashboardStats))
)]
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = state
        .lab
        .dashboard_stats()
        .await
        .map_err(AppError::context("Failed to fetch dashboard stats"))?;
    Ok(Json(stats))
}
