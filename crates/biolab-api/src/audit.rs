//! Security audit logging for authentication events
//!
//! Provides structured audit logging for logins, logouts, registrations,
//! password resets, access control failures and admin account changes.
//!
//! All audit events are logged at INFO level with the "audit" target,
//! making them easy to filter and route to security monitoring systems.
//! Passwords never appear in any event.
//!
//! # Example
//!
//! ```ignore
//! use biolab_api::audit::{AuditEvent, audit_log};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     username: user.username.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: Some("Mozilla/5.0...".to_string()),
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess {
        user_id: i32,
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt; the reason is recorded here but never sent to
    /// the client
    LoginFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// User logout
    Logout {
        user_id: Option<i32>,
        ip_address: Option<String>,
    },

    /// Successful user registration
    RegistrationSuccess {
        user_id: i32,
        username: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Password replaced through the reset endpoint or the CLI
    PasswordReset {
        user_id: i32,
        username: String,
        reset_by: Option<i32>,
        ip_address: Option<String>,
    },

    /// Access denied due to insufficient permissions or foreign ownership
    AccessDenied {
        user_id: i32,
        username: String,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
    },

    /// Admin edited an account
    UserUpdated {
        user_id: i32,
        updated_by: i32,
        ip_address: Option<String>,
    },

    /// Admin deleted an account
    UserDeleted {
        user_id: i32,
        deleted_by: i32,
        ip_address: Option<String>,
    },
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON so log aggregators receive the full
/// record in one field.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            user_id,
            username,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::Logout {
            user_id,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                ip_address = ?ip_address,
                "User logout"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            username,
            role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                role = %role,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::PasswordReset {
            user_id,
            username,
            reset_by,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                reset_by = ?reset_by,
                ip_address = ?ip_address,
                "Password reset"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            username,
            resource,
            required_role,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                resource = %resource,
                required_role = ?required_role,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::UserUpdated {
            user_id,
            updated_by,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                updated_by = %updated_by,
                ip_address = ?ip_address,
                "User updated"
            );
        }
        AuditEvent::UserDeleted {
            user_id,
            deleted_by,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                deleted_by = %deleted_by,
                ip_address = ?ip_address,
                "User deleted"
            );
        }
    }
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop) and then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: 42,
            username: "alice".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("alice"));
    }

    #[test]
    fn test_login_failure_event_has_no_password_field() {
        let event = AuditEvent::LoginFailure {
            username: "alice".to_string(),
            reason: "wrong password".to_string(),
            ip_address: None,
            user_agent: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("password").is_none());
        audit_log(&event);
    }

    #[test]
    fn test_admin_events() {
        audit_log(&AuditEvent::UserUpdated {
            user_id: 2,
            updated_by: 1,
            ip_address: Some("10.0.0.1".to_string()),
        });
        audit_log(&AuditEvent::UserDeleted {
            user_id: 2,
            deleted_by: 1,
            ip_address: None,
        });
        audit_log(&AuditEvent::AccessDenied {
            user_id: 3,
            username: "bob".to_string(),
            resource: "/api/admin/users".to_string(),
            required_role: Some("admin".to_string()),
            ip_address: None,
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_client_info_from_headers() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        headers.insert(axum::http::header::USER_AGENT, "curl/8.0".parse().unwrap());

        let client = ClientInfo::from_headers(&headers);
        assert_eq!(client.ip_address.as_deref(), Some("198.51.100.7"));
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = axum::http::HeaderMap::new();

        assert_eq!(extract_ip_address(&headers), None);
        assert_eq!(extract_user_agent(&headers), None);
    }
}
