//! Authentication and authorization module
//!
//! Session-based authentication with the following components:
//! - Password hashing with scrypt (`hash.salt` values)
//! - Cookie sessions persisted as token digests
//! - Authentication service for registration, login and password resets
//! - Route guards for session presence, admin role and resource ownership
//!
//! Everything is reached through an explicit [`AuthContext`] handed to the
//! router; there is no process-wide auth state.

pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod session;

pub use middleware::{require_admin, require_session, CurrentUser};
pub use models::{
    LoginRequest, PendingUpload, RegisterRequest, RegistrationForm, ResetPasswordRequest,
};
pub use password::{PasswordError, PasswordHasher};
pub use service::AuthService;
pub use session::SessionManager;

use axum_extra::extract::cookie::CookieJar;
use biolab_core::{CredentialStore, Result, User};
use std::sync::Arc;

/// Handles shared by every authentication path
#[derive(Clone)]
pub struct AuthContext {
    pub hasher: PasswordHasher,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: SessionManager,
    pub allow_admin_registration: bool,
}

impl AuthContext {
    pub fn new(
        hasher: PasswordHasher,
        credentials: Arc<dyn CredentialStore>,
        sessions: SessionManager,
        allow_admin_registration: bool,
    ) -> Self {
        Self {
            hasher,
            credentials,
            sessions,
            allow_admin_registration,
        }
    }

    pub fn service(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    /// Load the user behind the request's session cookie
    ///
    /// The user is fetched fresh on every call. A session whose user no
    /// longer exists is destroyed and the request counts as anonymous.
    pub async fn current_user(&self, jar: &CookieJar) -> Result<Option<User>> {
        let Some(user_id) = self.sessions.resolve(jar).await? else {
            return Ok(None);
        };

        match self.credentials.get_user(user_id).await? {
            Some(user) => Ok(Some(user)),
            None => {
                tracing::debug!(user_id, "Session refers to a deleted user");
                self.sessions.destroy(jar.clone()).await?;
                Ok(None)
            }
        }
    }
}
