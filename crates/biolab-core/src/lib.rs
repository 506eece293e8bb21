//! Bio Lab Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the lab backend:
//! - Identity models (users and their closed set of roles)
//! - Laboratory entities (samples, protocols, reports, notifications, sensor readings)
//! - Common error types
//! - Store traits implemented by the relational and in-memory backends
//! - Configuration management
//! - Dashboard statistics

pub mod config;
pub mod lab;
pub mod serde_ext;
pub mod stats;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordConfig,
    ServerConfig, SessionConfig, StorageBackend, UploadConfig,
};
pub use lab::{
    NewNotification, NewProtocol, NewReport, NewSample, NewSensorReading, Notification,
    NotificationKind, Protocol, ProtocolPatch, ProtocolStatus, Report, ReportPatch, ReportStatus,
    Sample, SamplePatch, SampleStatus, SampleType, SensorReading,
};
pub use stats::{ActivityLogEntry, AdminStats, DashboardStats, SampleTrendPoint};
pub use store::{CredentialStore, LabStore, SessionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for lab operations
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LabError>;

// ============================================================================
// Identity
// ============================================================================

/// Coarse-grained permission class assigned to a user.
///
/// The set is closed; every authorization site matches on it exhaustively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Researcher,
    Technician,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Researcher, Role::Technician, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Researcher => "researcher",
            Role::Technician => "technician",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "researcher" => Ok(Role::Researcher),
            "technician" => Ok(Role::Technician),
            "admin" => Ok(Role::Admin),
            other => Err(LabError::ValidationError(format!("unknown role: {other}"))),
        }
    }
}

/// Normalize a username the way it is stored: trimmed and lowercased.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// User account record
///
/// The salted password hash is kept on the record for the hasher but is never
/// serialized into API responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    /// `hex(derived key) + "." + hex(salt)`
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
    pub city: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Insert payload for a user. The username must already be normalized and
/// the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
    pub city: Option<String>,
    pub profile_picture: Option<String>,
}

/// Partial user update, used by admin edits, self-service profile edits and
/// password resets.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub role: Option<Role>,
    pub city: Option<String>,
    pub profile_picture: Option<String>,
    /// Only ever set server-side (password reset)
    #[serde(skip)]
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.mobile.is_none()
            && self.role.is_none()
            && self.city.is_none()
            && self.profile_picture.is_none()
            && self.password_hash.is_none()
    }

    pub fn password(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            ..Default::default()
        }
    }

    /// Apply this patch onto an existing record
    pub fn apply(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = normalize_username(username);
        }
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = v.clone();
        }
        if let Some(v) = &self.mobile {
            user.mobile = Some(v.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(v) = &self.city {
            user.city = Some(v.clone());
        }
        if let Some(v) = &self.profile_picture {
            user.profile_picture = Some(v.clone());
        }
        if let Some(v) = &self.password_hash {
            user.password_hash = v.clone();
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Server-side session row. Only a digest of the browser-held token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_hash: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
