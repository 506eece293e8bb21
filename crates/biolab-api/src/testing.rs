//! Helpers for integration tests (`test-utils` feature)
//!
//! Author: hephaex@gmail.com

use crate::auth::RegisterRequest;
use crate::create_router;
use crate::state::AppState;
use axum::Router;
use biolab_core::config::{AppConfig, StorageBackend};
use biolab_core::{Role, User};
use biolab_store::Stores;
use std::sync::Arc;

/// Password given to every seeded user
pub const TEST_PASSWORD: &str = "password123";

/// In-memory configuration with cheap scrypt parameters and a private
/// upload directory
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.backend = StorageBackend::Memory;
    config.password.log_n = 4;
    config.password.r = 8;
    config.password.p = 1;
    config.uploads.dir =
        std::env::temp_dir().join(format!("biolab-test-uploads-{}", uuid::Uuid::new_v4()));
    config
}

/// Fresh state over an empty in-memory store
pub fn test_state_with(config: AppConfig) -> Arc<AppState> {
    test_state_over(config, Stores::memory())
}

/// State over caller-assembled stores
pub fn test_state_over(config: AppConfig, stores: Stores) -> Arc<AppState> {
    match AppState::new(config, stores) {
        Ok(state) => Arc::new(state),
        Err(e) => panic!("test configuration rejected: {e}"),
    }
}

pub fn test_state() -> Arc<AppState> {
    test_state_with(test_config())
}

/// Router over a fresh in-memory state
pub fn create_router_for_testing() -> Router {
    create_router(test_state())
}

/// Router together with the state it serves, for seeding data directly
pub fn test_app() -> (Router, Arc<AppState>) {
    let state = test_state();
    (create_router(state.clone()), state)
}

/// Create a user with [`TEST_PASSWORD`] bypassing the registration policy
pub async fn seed_user(state: &AppState, username: &str, role: Role) -> User {
    let request = RegisterRequest {
        username: username.to_string(),
        password: TEST_PASSWORD.to_string(),
        first_name: username.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{}@example.com", username.to_lowercase()),
        mobile: None,
        role,
        city: None,
    };

    match state.auth.service().provision(request, None).await {
        Ok(user) => user,
        Err(e) => panic!("failed to seed user {username}: {e}"),
    }
}
