//! Notification handlers
//!
//! Users see and manage their own notifications. Admins can list every
//! notification and broadcast new ones.
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
use biolab_core::{NewNotification, Notification, NotificationKind, Role};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Admin broadcast; recipients are `userIds`, else every user holding `role`,
/// else every user
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub user_ids: Option<Vec<i32>>,
}

fn default_kind() -> NotificationKind {
    NotificationKind::Info
}

async fn owned_notification(
    state: &AppState,
    user: &CurrentUser,
    id: i32,
) -> Result<Notification, AppError> {
    let notification = state
        .lab
        .get_notification(id)
        .await
        .map_err(AppError::context("Failed to fetch notification"))?
        .ok_or_else(|| AppError::not_found("Notification not found"))?;

    user.require_owner_or_admin(notification.user_id)?;
    Ok(notification)
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    responses((status = 200, description = "The caller's notifications", body = Vec<Notification>))
)]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .lab
        .list_notifications_by_user(user.id)
        .await
        .map_err(AppError::context("Failed to fetch notifications"))?;
    Ok(Json(notifications))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    params(("id" = i32, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Notification not found", body = crate::error::ApiError),
    )
)]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "notification")?;
    owned_notification(&state, &user, id).await?;

    state
        .lab
        .mark_notification_read(id)
        .await
        .map_err(AppError::context("Failed to mark notification as read"))?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "notifications",
    params(("id" = i32, Path, description = "Notification id")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 403, description = "Access denied", body = crate::error::ApiError),
        (status = 404, description = "Notification not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id, "notification")?;
    owned_notification(&state, &user, id).await?;

    state
        .lab
        .delete_notification(id)
        .await
        .map_err(AppError::context("Failed to delete notification"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/admin/notifications",
    tag = "admin",
    responses((status = 200, description = "All notifications", body = Vec<Notification>))
)]
pub async fn admin_list_notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state
        .lab
        .list_notifications()
        .await
        .map_err(AppError::context("Failed to fetch notifications"))?;
    Ok(Json(notifications))
}

#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    tag = "admin",
    request_body = BroadcastRequest,
    responses(
        (status = 201, description = "Notifications created", body = Vec<Notification>),
        (status = 400, description = "Invalid notification data", body = crate::error::ApiError),
    )
)]
pub async fn broadcast_notification(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = validated(body, "Invalid notification data")?;

    let users = state
        .auth
        .credentials
        .list_users()
        .await
        .map_err(AppError::context("Failed to fetch users"))?;

    let recipients: BTreeSet<i32> = match (&request.user_ids, request.role) {
        (Some(ids), _) => users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| u.id)
            .collect(),
        (None, Some(role)) => users.iter().filter(|u| u.role == role).map(|u| u.id).collect(),
        (None, None) => users.iter().map(|u| u.id).collect(),
    };

    let mut created = Vec::with_capacity(recipients.len());
    for user_id in recipients {
        let notification = state
            .lab
            .create_notification(NewNotification {
                user_id,
                title: request.title.clone(),
                message: request.message.clone(),
                kind: request.kind,
            })
            .await
            .map_err(AppError::context("Failed to create notification"))?;
        created.push(notification);
    }

    tracing::info!(count = created.len(), kind = %request.kind, "Broadcast notification");
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_defaults() {
        let req: BroadcastRequest = serde_json::from_value(serde_json::json!({
            "title": "Maintenance",
            "message": "Lab closed on Friday"
        }))
        .unwrap();

        assert_eq!(req.kind, NotificationKind::Info);
        assert!(req.role.is_none());
        assert!(req.user_ids.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_broadcast_targets() {
        let req: BroadcastRequest = serde_json::from_value(serde_json::json!({
            "title": "Reminder",
            "message": "Submit your samples",
            "type": "warning",
            "role": "student",
            "userIds": [3, 4]
        }))
        .unwrap();

        assert_eq!(req.kind, NotificationKind::Warning);
        assert_eq!(req.role, Some(Role::Student));
        assert_eq!(req.user_ids, Some(vec![3, 4]));
    }
}
