//! Authentication API handlers
//!
//! Registration, login, logout, the current-user endpoints and password
//! resets. Sessions travel in an HttpOnly cookie.
//!
//! Author: hephaex@gmail.com

use crate::audit::ClientInfo;
use crate::auth::{
    CurrentUser, LoginRequest, RegisterRequest, RegistrationForm, ResetPasswordRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use biolab_core::{User, UserPatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Register a new user account
///
/// Accepts JSON, or multipart form data with an optional `profilePic` file.
/// The new user is signed in immediately.
///
/// # Responses
///
/// * `201 Created` - User registered; session cookie set
/// * `400 Bad Request` - Invalid input, or username/email already exists
/// * `403 Forbidden` - Admin self-registration is disabled
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Admin registration disabled", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    form: RegistrationForm,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let user = state.auth.service().register(form, &client).await?;
    let jar = state.auth.sessions.establish(jar, user.id).await?;

    Ok((StatusCode::CREATED, jar, Json(user)))
}

/// Login with username and password
///
/// Unknown usernames and wrong passwords get the same response.
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = User),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    // A missing or malformed body is just a failed login
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let client = ClientInfo::from_headers(&headers);

    let (jar, user) = state.auth.service().login(jar, &request, &client).await?;
    Ok((jar, Json(user)))
}

/// Logout; always succeeds
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "auth",
    responses((status = 200, description = "Session destroyed"))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let jar = state.auth.service().logout(jar, &client).await?;
    Ok((StatusCode::OK, jar))
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "auth",
    responses(
        (status = 200, description = "Authenticated user", body = User),
        (status = 401, description = "Not authenticated"),
    )
)]
pub async fn current_user_handler(user: CurrentUser) -> Json<User> {
    Json(user.user)
}

/// Edit the caller's own profile
#[utoipa::path(
    patch,
    path = "/api/user",
    tag = "auth",
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Role change requires admin", body = crate::error::ApiError),
    )
)]
pub async fn update_current_user_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(patch) = body.map_err(|e| AppError::validation("Invalid user data", e.body_text()))?;
    let updated = state.auth.service().update_profile(&user, patch).await?;
    Ok(Json(updated))
}

/// Reset a password; admins may reset anyone, others only themselves
#[utoipa::path(
    post,
    path = "/api/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Missing username or password", body = crate::error::ApiError),
        (status = 403, description = "Not your account", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    state.auth.service().reset_password(&user, &request).await?;

    Ok(Json(MessageResponse {
        message: "Password reset successful".to_string(),
    }))
}
