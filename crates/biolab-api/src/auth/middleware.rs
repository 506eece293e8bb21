/// Route guards
///
/// `require_session` resolves the session cookie into a [`CurrentUser`] and
/// adds it to the request extensions; `require_admin` layers the role check
/// on top. Handlers that need ownership checks call
/// [`CurrentUser::require_owner_or_admin`] once they know the owner.
use super::AuthContext;
use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use biolab_core::{Role, User};
use std::ops::Deref;

/// Whether a role carries administrative rights
pub fn is_admin(role: Role) -> bool {
    match role {
        Role::Admin => true,
        Role::Student | Role::Researcher | Role::Technician => false,
    }
}

/// Whether `user` may act on a resource owned by `owner_id`
pub fn can_access(user: &User, owner_id: i32) -> bool {
    match user.role {
        Role::Admin => true,
        Role::Student | Role::Researcher | Role::Technician => user.id == owner_id,
    }
}

/// Authenticated user for the current request
///
/// Extract it in handlers behind `require_session`:
///
/// ```ignore
/// async fn handler(user: CurrentUser) -> String {
///     format!("Hello, {}!", user.full_name())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Client address, for audit records
    pub ip_address: Option<String>,
}

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.user
    }
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        is_admin(self.user.role)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            return Ok(());
        }
        self.deny("role:admin", Some(Role::Admin));
        Err(AppError::forbidden("Admin access required"))
    }

    /// Owners pass; admins bypass ownership entirely
    pub fn require_owner_or_admin(&self, owner_id: i32) -> Result<(), AppError> {
        if can_access(&self.user, owner_id) {
            return Ok(());
        }
        self.deny(&format!("owner:{owner_id}"), None);
        Err(AppError::forbidden("Access denied"))
    }

    fn deny(&self, resource: &str, required_role: Option<Role>) {
        audit_log(&AuditEvent::AccessDenied {
            user_id: self.user.id,
            username: self.user.username.clone(),
            resource: resource.to_string(),
            required_role: required_role.map(|r| r.to_string()),
            ip_address: self.ip_address.clone(),
        });
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Reject requests without a live session (401, empty body)
///
/// ```ignore
/// let protected = Router::new()
///     .route("/api/user", get(current_user))
///     .route_layer(middleware::from_fn_with_state(auth.clone(), require_session));
/// ```
pub async fn require_session(
    State(auth): State<AuthContext>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = auth
        .current_user(&jar)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let ip_address = extract_ip_address(request.headers());
    request
        .extensions_mut()
        .insert(CurrentUser { user, ip_address });

    Ok(next.run(request).await)
}

/// Reject authenticated non-admins (403 "Admin access required")
///
/// Must run inside `require_session`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthenticated)?;

    if !user.is_admin() {
        audit_log(&AuditEvent::AccessDenied {
            user_id: user.id,
            username: user.username.clone(),
            resource: request.uri().path().to_string(),
            required_role: Some(Role::Admin.to_string()),
            ip_address: user.ip_address.clone(),
        });
        return Err(AppError::forbidden("Admin access required"));
    }

    Ok(next.run(request).await)
}
