//! Protocol library handlers
//!
//! Everyone signed in can read protocols; only admins write them.
//!
//! Author: hephaex@gmail.com

use super::{parse_id, validated};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use biolab_core::{LabError, NewProtocol, Protocol, ProtocolPatch};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProtocolQuery {
    /// Case-insensitive match on title, description or category
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/protocols",
    tag = "protocols",
    params(ProtocolQuery),
    responses((status = 200, description = "Protocols", body = Vec<Protocol>))
)]
pub async fn list_protocols(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProtocolQuery>,
) -> Result<Json<Vec<Protocol>>, AppError> {
    let protocols = match query.search.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => state.lab.search_protocols(term).await,
        _ => state.lab.list_protocols().await,
    }
    .map_err(AppError::context("Failed to fetch protocols"))?;

    Ok(Json(protocols))
}

#[utoipa::path(
    get,
    path = "/api/protocols/{id}",
    tag = "protocols",
    params(("id" = i32, Path, description = "Protocol id")),
    responses(
        (status = 200, description = "Protocol", body = Protocol),
        (status = 404, description = "Protocol not found", body = crate::error::ApiError),
    )
)]
pub async fn get_protocol(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Protocol>, AppError> {
    let id = parse_id(&id, "protocol")?;
    let protocol = state
        .lab
        .get_protocol(id)
        .await
        .map_err(AppError::context("Failed to fetch protocol"))?
        .ok_or_else(|| AppError::not_found("Protocol not found"))?;

    Ok(Json(protocol))
}

#[utoipa::path(
    post,
    path = "/api/protocols",
    tag = "protocols",
    request_body = NewProtocol,
    responses(
        (status = 201, description = "Protocol created", body = Protocol),
        (status = 400, description = "Invalid protocol data", body = crate::error::ApiError),
        (status = 403, description = "Admin access required", body = crate::error::ApiError),
    )
)]
pub async fn create_protocol(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<NewProtocol>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let mut new = validated(body, "Invalid protocol data")?;
    new.created_by = user.id;

    let protocol = state
        .lab
        .create_protocol(new)
        .await
        .map_err(AppError::context("Invalid protocol data"))?;
    Ok((StatusCode::CREATED, Json(protocol)))
}

#[utoipa::path(
    put,
    path = "/api/protocols/{id}",
    tag = "protocols",
    params(("id" = i32, Path, description = "Protocol id")),
    request_body = ProtocolPatch,
    responses(
        (status = 200, description = "Updated protocol", body = Protocol),
        (status = 403, description = "Admin access required", body = crate::error::ApiError),
        (status = 404, description = "Protocol not found", body = crate::error::ApiError),
    )
)]
pub async fn update_protocol(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<ProtocolPatch>, JsonRejection>,
) -> Result<Json<Protocol>, AppError> {
    user.require_admin()?;
    let id = parse_id(&id, "protocol")?;
    let patch = validated(body, "Invalid protocol data")?;

    let protocol = state
        .lab
        .update_protocol(id, &patch)
        .await
        .map_err(|e| match e {
            LabError::NotFound(_) => AppError::not_found("Protocol not found"),
            other => AppError::context("Failed to update protocol")(other),
        })?;
    Ok(Json(protocol))
}

/// Admin listing of every protocol
#[utoipa::path(
    get,
    path = "/api/admin/protocols",
    tag = "admin",
    responses((status = 200, description = "Protocols", body = Vec<Protocol>))
)]
pub async fn admin_list_protocols(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Protocol>>, AppError> {
    let protocols = state
        .lab
        .list_protocols()
        .await
        .map_err(AppError::context("Failed to fetch protocols"))?;
    Ok(Json(protocols))
}

#[utoipa::path(
    delete,
    path = "/api/admin/protocols/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Protocol id")),
    responses(
        (status = 204, description = "Protocol deleted"),
        (status = 404, description = "Protocol not found", body = crate::error::ApiError),
    )
)]
pub async fn admin_delete_protocol(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "protocol")?;
    let deleted = state
        .lab
        .delete_protocol(id)
        .await
        .map_err(AppError::context("Failed to delete protocol"))?;

    if !deleted {
        return Err(AppError::not_found("Protocol not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
