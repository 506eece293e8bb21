//! Authentication request bodies
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Json,
};
use biolab_core::Role;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Multipart field carrying the optional profile picture
pub const PROFILE_PIC_FIELD: &str = "profilePic";

/// User registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub city: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Password reset request; both fields are checked by the handler
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ResetPasswordRequest {
    /// Both fields, when present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|s| !s.trim().is_empty())?;
        let password = self.password.as_deref().filter(|s| !s.is_empty())?;
        Some((username, password))
    }
}

/// Registration body, JSON or multipart with an optional `profilePic` file
///
/// An uploaded picture stays in memory until the registration is accepted.
#[derive(Debug)]
pub struct RegistrationForm {
    pub request: RegisterRequest,
    pub profile_picture: Option<PendingUpload>,
}

/// Uploaded file held in memory under the name it will be stored as
#[derive(Debug, Clone)]
pub struct PendingUpload {
    dir: PathBuf,
    file_name: String,
    bytes: Bytes,
}

impl PendingUpload {
    pub fn new(dir: impl Into<PathBuf>, original: Option<&str>, bytes: Bytes) -> Self {
        Self {
            dir: dir.into(),
            file_name: stored_file_name(original),
            bytes,
        }
    }

    /// Path the file is served at once persisted
    pub fn public_path(&self) -> String {
        format!("/uploads/{}", self.file_name)
    }

    /// Write the file to the upload directory
    pub async fn persist(&self) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::internal("Failed to store profile picture", e))?;
        tokio::fs::write(self.dir.join(&self.file_name), &self.bytes)
            .await
            .map_err(|e| AppError::internal("Failed to store profile picture", e))?;

        tracing::debug!(file = %self.file_name, size = self.bytes.len(), "Stored profile picture");
        Ok(self.public_path())
    }

    /// Remove a persisted file whose registration did not go through
    pub async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_file(self.dir.join(&self.file_name)).await {
            tracing::warn!(file = %self.file_name, error = %e, "Failed to remove profile picture");
        }
    }
}

fn invalid(details: impl ToString) -> AppError {
    AppError::validation("Invalid registration data", details)
}

#[async_trait]
impl FromRequest<Arc<AppState>> for RegistrationForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(request) = Json::<RegisterRequest>::from_request(req, state)
                .await
                .map_err(|e| invalid(e.body_text()))?;
            return Ok(Self {
                request,
                profile_picture: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| invalid(e.body_text()))?;

        let mut fields = Map::new();
        let mut profile_picture = None;

        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == PROFILE_PIC_FIELD {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(invalid)?;
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > state.config.uploads.max_bytes {
                    return Err(AppError::bad_request("Profile picture is too large"));
                }
                profile_picture = Some(PendingUpload::new(
                    &state.config.uploads.dir,
                    file_name.as_deref(),
                    bytes,
                ));
            } else {
                let value = field.text().await.map_err(invalid)?;
                fields.insert(name, Value::String(value));
            }
        }

        let request = serde_json::from_value(Value::Object(fields)).map_err(invalid)?;
        Ok(Self {
            request,
            profile_picture,
        })
    }
}

/// Fresh file name keeping a short alphanumeric extension of the original
fn stored_file_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();
    format!("{}{}", uuid::Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_defaults() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "Alice",
            "password": "Secr3t!",
            "firstName": "Alice",
            "lastName": "Liddell",
            "email": "alice@example.com"
        }))
        .unwrap();

        assert_eq!(req.role, Role::Student);
        assert!(req.mobile.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "",
            "password": "x",
            "firstName": "A",
            "lastName": "B",
            "email": "not-an-email"
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_value::<RegisterRequest>(serde_json::json!({
            "username": "eve",
            "password": "x",
            "firstName": "E",
            "lastName": "V",
            "email": "eve@example.com",
            "role": "superuser"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_reset_password_credentials() {
        let full = ResetPasswordRequest {
            username: Some("alice".into()),
            password: Some("new".into()),
        };
        assert_eq!(full.credentials(), Some(("alice", "new")));

        let blank = ResetPasswordRequest {
            username: Some("  ".into()),
            password: Some("new".into()),
        };
        assert!(blank.credentials().is_none());
        assert!(ResetPasswordRequest::default().credentials().is_none());
    }

    #[tokio::test]
    async fn test_pending_upload_sanitizes_extension() {
        let dir = std::env::temp_dir().join(format!("biolab-upload-{}", uuid::Uuid::new_v4()));

        let upload = PendingUpload::new(&dir, Some("me.PNG"), Bytes::from_static(b"png"));
        assert!(!dir.exists());
        let path = upload.persist().await.unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".png"));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        let upload = PendingUpload::new(&dir, Some("../../etc/passwd"), Bytes::from_static(b"x"));
        assert!(!upload.public_path().contains(".."));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_pending_upload_discard_removes_file() {
        let dir = std::env::temp_dir().join(format!("biolab-upload-{}", uuid::Uuid::new_v4()));

        let upload = PendingUpload::new(&dir, Some("me.jpg"), Bytes::from_static(b"jpg"));
        upload.persist().await.unwrap();
        upload.discard().await;
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
