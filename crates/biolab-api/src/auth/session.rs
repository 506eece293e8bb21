/// Cookie-backed server-side sessions
///
/// The browser holds an opaque random token; the store only ever sees its
/// SHA-256 digest. Every successful resolution pushes the expiry forward.
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use biolab_core::{Result, SessionConfig, SessionRecord, SessionStore};
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;

/// Issues, resolves and destroys sessions
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    fn ttl(&self) -> Duration {
        let secs = self.config.ttl_secs.min(SessionConfig::MAX_TTL_SECS);
        Duration::seconds(i64::try_from(secs).unwrap_or_default())
    }

    fn token_from(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.config.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    }

    /// Start a session for `user_id`, replacing any session the jar carried
    pub async fn establish(&self, jar: CookieJar, user_id: i32) -> Result<CookieJar> {
        if let Some(old) = self.token_from(&jar) {
            self.store.destroy_session(&hash_token(&old)).await?;
        }

        let token = generate_token();
        let now = Utc::now();
        self.store
            .create_session(SessionRecord {
                token_hash: hash_token(&token),
                user_id,
                created_at: now,
                expires_at: now + self.ttl(),
            })
            .await?;

        tracing::debug!(user_id, "Session established");
        Ok(jar.add(self.cookie(token)))
    }

    /// Resolve the jar's token to a user id, extending the session on success
    pub async fn resolve(&self, jar: &CookieJar) -> Result<Option<i32>> {
        let Some(token) = self.token_from(jar) else {
            return Ok(None);
        };
        let token_hash = hash_token(&token);

        let Some(session) = self.store.find_session(&token_hash).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            self.store.destroy_session(&token_hash).await?;
            return Ok(None);
        }

        self.store.touch_session(&token_hash, now + self.ttl()).await?;
        Ok(Some(session.user_id))
    }

    /// Destroy the jar's session and clear the cookie
    pub async fn destroy(&self, jar: CookieJar) -> Result<CookieJar> {
        if let Some(token) = self.token_from(&jar) {
            self.store.destroy_session(&hash_token(&token)).await?;
        }
        Ok(jar.remove(Cookie::build(self.config.cookie_name.clone()).path("/")))
    }

    /// Log a user out everywhere
    pub async fn destroy_for_user(&self, user_id: i32) -> Result<u64> {
        self.store.destroy_sessions_for_user(user_id).await
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.purge_expired_sessions(Utc::now()).await
    }

    fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie)
            .build()
    }
}

/// Generate an opaque session token (32 random bytes, base64url)
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Digest of a token as persisted in the session store
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use biolab_core::{CredentialStore, NewUser, Role};
    use biolab_store::MemoryStore;

    async fn seed_user(store: &MemoryStore, username: &str) -> i32 {
        store
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: "00.00".to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: format!("{username}@example.com"),
                mobile: None,
                role: Role::Student,
                city: None,
                profile_picture: None,
            })
            .await
            .unwrap()
            .id
    }

    fn manager(store: Arc<MemoryStore>, ttl_secs: u64) -> SessionManager {
        SessionManager::new(
            store,
            SessionConfig {
                ttl_secs,
                ..Default::default()
            },
        )
    }

    fn token_of(jar: &CookieJar) -> String {
        jar.get("biolab.sid").unwrap().value().to_string()
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token_is_stable_sha256_hex() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest, hash_token("abc"));
    }

    #[tokio::test]
    async fn test_establish_and_resolve() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 3600);
        let alice = seed_user(&store, "alice").await;

        let jar = sessions.establish(CookieJar::new(), alice).await.unwrap();
        let cookie = jar.get("biolab.sid").unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        assert_eq!(sessions.resolve(&jar).await.unwrap(), Some(alice));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_store_never_sees_raw_token() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 3600);
        let alice = seed_user(&store, "alice").await;

        let jar = sessions.establish(CookieJar::new(), alice).await.unwrap();
        let token = token_of(&jar);

        assert!(store.find_session(&token).await.unwrap().is_none());
        assert!(store.find_session(&hash_token(&token)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_establish_replaces_existing_session() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 3600);
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        let first = sessions.establish(CookieJar::new(), alice).await.unwrap();
        let old_token = token_of(&first);
        let second = sessions.establish(first, bob).await.unwrap();

        assert_ne!(token_of(&second), old_token);
        assert_eq!(store.session_count().await, 1);
        assert_eq!(sessions.resolve(&second).await.unwrap(), Some(bob));
    }

    #[tokio::test]
    async fn test_destroy_clears_session() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 3600);
        let alice = seed_user(&store, "alice").await;

        let jar = sessions.establish(CookieJar::new(), alice).await.unwrap();
        let replay = jar.clone();
        let jar = sessions.destroy(jar).await.unwrap();

        assert!(jar.get("biolab.sid").is_none());
        assert_eq!(sessions.resolve(&replay).await.unwrap(), None);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_capped() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), u64::MAX);
        let alice = seed_user(&store, "alice").await;

        let jar = sessions.establish(CookieJar::new(), alice).await.unwrap();
        let record = store.find_session(&hash_token(&token_of(&jar))).await.unwrap().unwrap();
        let max = Duration::seconds(SessionConfig::MAX_TTL_SECS as i64);
        assert!(record.expires_at - record.created_at <= max);
        assert_eq!(sessions.resolve(&jar).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 0);
        let alice = seed_user(&store, "alice").await;

        let jar = sessions.establish(CookieJar::new(), alice).await.unwrap();
        assert_eq!(sessions.resolve(&jar).await.unwrap(), None);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_or_missing_cookie() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store, 3600);

        assert_eq!(sessions.resolve(&CookieJar::new()).await.unwrap(), None);
        let forged = CookieJar::new().add(Cookie::new("biolab.sid", "forged"));
        assert_eq!(sessions.resolve(&forged).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_destroy_for_user() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager(store.clone(), 3600);
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        sessions.establish(CookieJar::new(), alice).await.unwrap();
        sessions.establish(CookieJar::new(), alice).await.unwrap();
        sessions.establish(CookieJar::new(), bob).await.unwrap();

        assert_eq!(sessions.destroy_for_user(alice).await.unwrap(), 2);
        assert_eq!(store.session_count().await, 1);
    }
}
