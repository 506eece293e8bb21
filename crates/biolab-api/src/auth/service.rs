//! Authentication service layer
//!
//! Business logic for registration, login, logout, password resets and
//! account edits. Handlers own the HTTP shapes; this layer owns the checks,
//! hashing, session issuance and audit records.

use super::middleware::{can_access, is_admin, CurrentUser};
use super::models::{LoginRequest, RegisterRequest, RegistrationForm, ResetPasswordRequest};
use super::AuthContext;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use axum_extra::extract::cookie::CookieJar;
use biolab_core::{normalize_username, NewUser, Role, User, UserPatch};
use validator::Validate;

/// Authentication operations over an [`AuthContext`]
pub struct AuthService<'a> {
    ctx: &'a AuthContext,
}

impl<'a> AuthService<'a> {
    pub fn new(ctx: &'a AuthContext) -> Self {
        Self { ctx }
    }

    /// Create a user through the public registration form
    ///
    /// Self-registration as `admin` is refused unless explicitly allowed. An
    /// uploaded picture is written only for the attempt that creates the
    /// user.
    pub async fn register(
        &self,
        form: RegistrationForm,
        client: &ClientInfo,
    ) -> Result<User, AppError> {
        let username = normalize_username(&form.request.username);

        if form.request.role == Role::Admin && !self.ctx.allow_admin_registration {
            self.registration_failed(&username, "admin self-registration disabled", client);
            return Err(AppError::forbidden("Admin registration is not allowed"));
        }

        let picture = match &form.profile_picture {
            Some(upload) => Some(upload.persist().await?),
            None => None,
        };
        let result = self.provision(form.request, picture).await;

        match &result {
            Ok(user) => audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                username: user.username.clone(),
                role: user.role.to_string(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
            Err(e) => {
                if let Some(upload) = &form.profile_picture {
                    upload.discard().await;
                }
                self.registration_failed(&username, &e.to_string(), client)
            }
        }

        result
    }

    /// Create a user with whatever role the request names
    ///
    /// Username then email uniqueness are checked before hashing; the store's
    /// unique constraints still catch a concurrent insert of the same name.
    pub async fn provision(
        &self,
        request: RegisterRequest,
        profile_picture: Option<String>,
    ) -> Result<User, AppError> {
        request
            .validate()
            .map_err(|e| AppError::validation("Invalid registration data", e))?;

        let username = normalize_username(&request.username);
        let credentials = &self.ctx.credentials;

        if credentials.get_user_by_username(&username).await?.is_some() {
            return Err(AppError::bad_request("Username already exists"));
        }
        if credentials.get_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::bad_request("Email already exists"));
        }

        let password_hash = self.ctx.hasher.hash(&request.password).await?;

        let user = credentials
            .create_user(NewUser {
                username,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                email: request.email,
                mobile: request.mobile,
                role: request.role,
                city: request.city,
                profile_picture,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Check a username/password pair
    ///
    /// Unknown users and wrong passwords produce the same error, and both
    /// cost one key derivation.
    pub async fn authenticate(
        &self,
        request: &LoginRequest,
        client: &ClientInfo,
    ) -> Result<User, AppError> {
        let username = normalize_username(&request.username);
        let found = self.ctx.credentials.get_user_by_username(&username).await?;

        let failure = match found {
            None => {
                self.ctx.hasher.burn(&request.password).await?;
                "unknown user"
            }
            Some(user) => {
                if self
                    .ctx
                    .hasher
                    .verify(&request.password, &user.password_hash)
                    .await?
                {
                    audit_log(&AuditEvent::LoginSuccess {
                        user_id: user.id,
                        username: user.username.clone(),
                        ip_address: client.ip_address.clone(),
                        user_agent: client.user_agent.clone(),
                    });
                    return Ok(user);
                }
                "wrong password"
            }
        };

        audit_log(&AuditEvent::LoginFailure {
            username,
            reason: failure.to_string(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });
        Err(AppError::InvalidCredentials)
    }

    /// Authenticate and issue a fresh session
    pub async fn login(
        &self,
        jar: CookieJar,
        request: &LoginRequest,
        client: &ClientInfo,
    ) -> Result<(CookieJar, User), AppError> {
        let user = self.authenticate(request, client).await?;
        let jar = self.ctx.sessions.establish(jar, user.id).await?;
        Ok((jar, user))
    }

    /// Destroy the caller's session, if any
    pub async fn logout(&self, jar: CookieJar, client: &ClientInfo) -> Result<CookieJar, AppError> {
        let user_id = self.ctx.sessions.resolve(&jar).await?;
        let jar = self.ctx.sessions.destroy(jar).await?;

        audit_log(&AuditEvent::Logout {
            user_id,
            ip_address: client.ip_address.clone(),
        });
        Ok(jar)
    }

    /// Replace a user's password; admins may reset anyone, others only
    /// themselves
    pub async fn reset_password(
        &self,
        actor: &CurrentUser,
        request: &ResetPasswordRequest,
    ) -> Result<(), AppError> {
        let (username, password) = request
            .credentials()
            .ok_or_else(|| AppError::bad_request("Username and password are required"))?;

        let target = self
            .ctx
            .credentials
            .get_user_by_username(&normalize_username(username))
            .await
            .map_err(AppError::context("Failed to reset password"))?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        if !can_access(actor, target.id) {
            audit_log(&AuditEvent::AccessDenied {
                user_id: actor.id,
                username: actor.username.clone(),
                resource: format!("password:{}", target.id),
                required_role: None,
                ip_address: actor.ip_address.clone(),
            });
            return Err(AppError::forbidden("You can only reset your own password"));
        }

        let password_hash = self.ctx.hasher.hash(password).await?;
        self.ctx
            .credentials
            .update_user(target.id, &UserPatch::password(password_hash))
            .await
            .map_err(AppError::context("Failed to reset password"))?;

        audit_log(&AuditEvent::PasswordReset {
            user_id: target.id,
            username: target.username,
            reset_by: Some(actor.id),
            ip_address: actor.ip_address.clone(),
        });
        Ok(())
    }

    /// Self-service profile edit; only admins may change a role
    pub async fn update_profile(&self, actor: &CurrentUser, patch: UserPatch) -> Result<User, AppError> {
        patch
            .validate()
            .map_err(|e| AppError::validation("Invalid user data", e))?;
        if patch.is_empty() {
            return Err(AppError::bad_request("No update data provided"));
        }
        if let Some(role) = patch.role {
            if role != actor.role && !is_admin(actor.role) {
                return Err(AppError::forbidden("Only admins can change roles"));
            }
        }

        self.ctx
            .credentials
            .update_user(actor.id, &patch)
            .await
            .map_err(AppError::context("Failed to update user"))
    }

    /// Admin edit of any account
    pub async fn admin_update(
        &self,
        admin: &CurrentUser,
        user_id: i32,
        patch: UserPatch,
    ) -> Result<User, AppError> {
        patch
            .validate()
            .map_err(|e| AppError::validation("Invalid user data", e))?;
        if patch.is_empty() {
            return Err(AppError::bad_request("No update data provided"));
        }

        if self.ctx.credentials.get_user(user_id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }

        let user = self
            .ctx
            .credentials
            .update_user(user_id, &patch)
            .await
            .map_err(AppError::context("Failed to update user"))?;

        audit_log(&AuditEvent::UserUpdated {
            user_id,
            updated_by: admin.id,
            ip_address: admin.ip_address.clone(),
        });
        Ok(user)
    }

    /// Admin delete of another account; the caller's own account is refused
    pub async fn admin_delete(&self, admin: &CurrentUser, user_id: i32) -> Result<(), AppError> {
        if admin.id == user_id {
            return Err(AppError::bad_request("Cannot delete your own account"));
        }

        let deleted = self
            .ctx
            .credentials
            .delete_user(user_id)
            .await
            .map_err(AppError::context("Failed to delete user"))?;
        if !deleted {
            return Err(AppError::not_found("User not found"));
        }

        self.ctx.sessions.destroy_for_user(user_id).await?;

        audit_log(&AuditEvent::UserDeleted {
            user_id,
            deleted_by: admin.id,
            ip_address: admin.ip_address.clone(),
        });
        Ok(())
    }

    fn registration_failed(&self, username: &str, reason: &str, client: &ClientInfo) {
        audit_log(&AuditEvent::RegistrationFailure {
            username: username.to_string(),
            reason: reason.to_string(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PasswordHasher, SessionManager};
    use biolab_core::{CredentialStore, PasswordConfig, SessionConfig};
    use biolab_store::MemoryStore;
    use std::sync::Arc;

    fn context(allow_admin_registration: bool) -> (AuthContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::new(&PasswordConfig {
            log_n: 4,
            r: 8,
            p: 1,
        })
        .unwrap();
        let sessions = SessionManager::new(store.clone(), SessionConfig::default());
        let ctx = AuthContext::new(hasher, store.clone(), sessions, allow_admin_registration);
        (ctx, store)
    }

    fn form(username: &str, role: Role) -> RegistrationForm {
        RegistrationForm {
            request: RegisterRequest {
                username: username.to_string(),
                password: "Secr3t!".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Liddell".to_string(),
                email: format!("{}@example.com", username.to_lowercase()),
                mobile: None,
                role,
                city: None,
            },
            profile_picture: None,
        }
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn actor(user: User) -> CurrentUser {
        CurrentUser {
            user,
            ip_address: None,
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_and_hashes() {
        let (ctx, _) = context(false);
        let client = ClientInfo::default();

        let user = ctx.service().register(form("Alice", Role::Student), &client).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "Secr3t!");

        let (key, salt) = user.password_hash.split_once('.').unwrap();
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_case_insensitive() {
        let (ctx, store) = context(false);
        let client = ClientInfo::default();
        let service = ctx.service();

        service.register(form("alice", Role::Student), &client).await.unwrap();
        let mut dup = form("ALICE", Role::Student);
        dup.request.email = "other@example.com".to_string();

        let err = service.register(dup, &client).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Username already exists"));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (ctx, _) = context(false);
        let client = ClientInfo::default();
        let service = ctx.service();

        service.register(form("alice", Role::Student), &client).await.unwrap();
        let mut dup = form("bob", Role::Student);
        dup.request.email = "alice@example.com".to_string();

        let err = service.register(dup, &client).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Email already exists"));
    }

    #[tokio::test]
    async fn test_admin_self_registration_policy() {
        let client = ClientInfo::default();

        let (ctx, _) = context(false);
        let err = ctx.service().register(form("root", Role::Admin), &client).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let (ctx, _) = context(true);
        let user = ctx.service().register(form("root", Role::Admin), &client).await.unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let (ctx, _) = context(false);
        let client = ClientInfo::default();
        let service = ctx.service();
        service.register(form("alice", Role::Student), &client).await.unwrap();

        assert!(service.authenticate(&login("ALICE", "Secr3t!"), &client).await.is_ok());

        let wrong = service.authenticate(&login("alice", "wrong"), &client).await.unwrap_err();
        let unknown = service.authenticate(&login("alice2", "Secr3t!"), &client).await.unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_reset_password_rules() {
        let (ctx, _) = context(false);
        let client = ClientInfo::default();
        let service = ctx.service();

        let alice = service.register(form("alice", Role::Student), &client).await.unwrap();
        let bob = service.register(form("bob", Role::Student), &client).await.unwrap();
        let root = service
            .provision(form("root", Role::Admin).request, None)
            .await
            .unwrap();

        let reset = |username: &str| ResetPasswordRequest {
            username: Some(username.to_string()),
            password: Some("N3w!".to_string()),
        };

        let err = service
            .reset_password(&actor(alice.clone()), &reset("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service
            .reset_password(&actor(alice.clone()), &reset("nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service
            .reset_password(&actor(alice.clone()), &ResetPasswordRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        service.reset_password(&actor(alice), &reset("alice")).await.unwrap();
        service.reset_password(&actor(root), &reset("bob")).await.unwrap();

        assert!(service.authenticate(&login("bob", "N3w!"), &client).await.is_ok());
        assert!(service.authenticate(&login("bob", "Secr3t!"), &client).await.is_err());
        assert_eq!(bob.username, "bob");
    }

    #[tokio::test]
    async fn test_update_profile_role_change_requires_admin() {
        let (ctx, _) = context(false);
        let client = ClientInfo::default();
        let service = ctx.service();
        let alice = service.register(form("alice", Role::Student), &client).await.unwrap();

        let promote = UserPatch {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let err = service
            .update_profile(&actor(alice.clone()), promote)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let rename = UserPatch {
            city: Some("Oxford".to_string()),
            ..Default::default()
        };
        let updated = service.update_profile(&actor(alice), rename).await.unwrap();
        assert_eq!(updated.city.as_deref(), Some("Oxford"));
    }

    #[tokio::test]
    async fn test_admin_delete_rules() {
        let (ctx, store) = context(false);
        let client = ClientInfo::default();
        let service = ctx.service();

        let root = service
            .provision(form("root", Role::Admin).request, None)
            .await
            .unwrap();
        let bob = service.register(form("bob", Role::Student), &client).await.unwrap();
        let admin = actor(root.clone());

        let err = service.admin_delete(&admin, root.id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Cannot delete your own account"));
        assert!(store.get_user(root.id).await.unwrap().is_some());

        service.admin_delete(&admin, bob.id).await.unwrap();
        assert!(store.get_user(bob.id).await.unwrap().is_none());

        let err = service.admin_delete(&admin, bob.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
