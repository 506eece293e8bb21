//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::{require_admin, require_session};
use crate::handlers::{
    admin, auth, dashboard, notifications, protocols, reports, samples, sensor_data,
};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Create the `/api` routes
pub fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/logout", post(auth::logout_handler));

    // Admin routes; the role check runs after the session check
    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route(
            "/admin/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/admin/stats", get(admin::admin_stats))
        .route("/admin/recent-users", get(admin::recent_users))
        .route("/admin/recent-samples", get(admin::recent_samples))
        .route("/admin/activity-logs", get(admin::activity_logs))
        .route("/admin/sample-trends", get(admin::sample_trends))
        .route("/admin/protocols", get(protocols::admin_list_protocols))
        .route(
            "/admin/protocols/:id",
            delete(protocols::admin_delete_protocol),
        )
        .route(
            "/admin/notifications",
            get(notifications::admin_list_notifications)
                .post(notifications::broadcast_notification),
        )
        .route_layer(middleware::from_fn(require_admin));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route(
            "/user",
            get(auth::current_user_handler).patch(auth::update_current_user_handler),
        )
        .route("/reset-password", post(auth::reset_password_handler))
        // Samples
        .route(
            "/samples",
            get(samples::list_samples).post(samples::create_sample),
        )
        .route(
            "/samples/:id",
            get(samples::get_sample)
                .put(samples::update_sample)
                .delete(samples::delete_sample),
        )
        .route("/samples/:id/reports", get(samples::list_sample_reports))
        // Protocols
        .route(
            "/protocols",
            get(protocols::list_protocols).post(protocols::create_protocol),
        )
        .route(
            "/protocols/:id",
            get(protocols::get_protocol).put(protocols::update_protocol),
        )
        // Reports
        .route(
            "/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/:id",
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route(
            "/notifications/:id",
            delete(notifications::delete_notification),
        )
        // Sensor data
        .route("/sensor-data", post(sensor_data::create_reading))
        .route(
            "/sensor-data/sample/:sample_id",
            get(sensor_data::list_readings),
        )
        .route("/sensor-data/:id", delete(sensor_data::delete_reading))
        // Dashboard
        .route("/dashboard/stats", get(dashboard::dashboard_stats))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_session,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}
