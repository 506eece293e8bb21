//! Bio Lab API - REST server
//!
//! Session-cookie authenticated HTTP endpoints for field samples, protocols,
//! reports, notifications and sensor readings, plus the admin console.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

#[cfg(feature = "test-utils")]
pub mod testing;

use crate::middleware::{metrics_middleware, security_headers_middleware, SecurityHeaders};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use biolab_core::config::{AppConfig, ConfigError, LoggingConfig};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI document served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(title = "Bio Lab API", description = "Mobile bio lab backend"),
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::logout_handler,
        handlers::auth::current_user_handler,
        handlers::auth::update_current_user_handler,
        handlers::auth::reset_password_handler,
        handlers::samples::list_samples,
        handlers::samples::create_sample,
        handlers::samples::get_sample,
        handlers::samples::update_sample,
        handlers::samples::delete_sample,
        handlers::samples::list_sample_reports,
        handlers::protocols::list_protocols,
        handlers::protocols::get_protocol,
        handlers::protocols::create_protocol,
        handlers::protocols::update_protocol,
        handlers::protocols::admin_list_protocols,
        handlers::protocols::admin_delete_protocol,
        handlers::reports::list_reports,
        handlers::reports::create_report,
        handlers::reports::get_report,
        handlers::reports::update_report,
        handlers::reports::delete_report,
        handlers::notifications::list_notifications,
        handlers::notifications::mark_read,
        handlers::notifications::delete_notification,
        handlers::notifications::admin_list_notifications,
        handlers::notifications::broadcast_notification,
        handlers::sensor_data::create_reading,
        handlers::sensor_data::list_readings,
        handlers::sensor_data::delete_reading,
        handlers::dashboard::dashboard_stats,
        handlers::admin::list_users,
        handlers::admin::update_user,
        handlers::admin::delete_user,
        handlers::admin::admin_stats,
        handlers::admin::recent_users,
        handlers::admin::recent_samples,
        handlers::admin::activity_logs,
        handlers::admin::sample_trends,
    ),
    components(schemas(
        error::ApiError,
        handlers::auth::MessageResponse,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::notifications::BroadcastRequest,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::ResetPasswordRequest,
        biolab_core::Role,
        biolab_core::User,
        biolab_core::UserPatch,
        biolab_core::Sample,
        biolab_core::NewSample,
        biolab_core::SamplePatch,
        biolab_core::SampleType,
        biolab_core::SampleStatus,
        biolab_core::Protocol,
        biolab_core::NewProtocol,
        biolab_core::ProtocolPatch,
        biolab_core::ProtocolStatus,
        biolab_core::Report,
        biolab_core::NewReport,
        biolab_core::ReportPatch,
        biolab_core::ReportStatus,
        biolab_core::Notification,
        biolab_core::NotificationKind,
        biolab_core::SensorReading,
        biolab_core::NewSensorReading,
        biolab_core::DashboardStats,
        biolab_core::AdminStats,
        biolab_core::ActivityLogEntry,
        biolab_core::SampleTrendPoint,
    )),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Registration, login and sessions"),
        (name = "samples", description = "Field samples"),
        (name = "protocols", description = "Protocol library"),
        (name = "reports", description = "Analysis reports"),
        (name = "notifications", description = "User notifications"),
        (name = "sensor-data", description = "Sensor readings"),
        (name = "dashboard", description = "Dashboard figures"),
        (name = "admin", description = "Admin console"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Load configuration from the TOML file named by `BIOLAB_CONFIG`, if set,
/// with environment overrides; otherwise from the environment alone
pub fn load_config() -> Result<AppConfig, ConfigError> {
    match std::env::var("BIOLAB_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override(),
        Err(_) => AppConfig::from_env(),
    }
}

/// Install the global tracing subscriber; `RUST_LOG` wins over the
/// configured level
pub fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{level},tower_http={level},sqlx=warn", level = config.level).into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the CORS layer; without configured origins only same-origin
/// requests succeed
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let security = SecurityHeaders {
        hsts: config.session.secure_cookie,
    };
    // Multipart registration carries the picture plus its text fields
    let body_limit = config.server.max_body_size.max(config.uploads.max_bytes + 64 * 1024);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::prometheus_metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", routes::api_routes(&state))
        .nest_service("/uploads", ServeDir::new(&config.uploads.dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security,
            security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.cors_origins))
        .with_state(state)
}
