//! Security headers middleware
//!
//! Adds security headers to all HTTP responses:
//! - X-Content-Type-Options: nosniff
//! - X-Frame-Options: DENY
//! - Content-Security-Policy: same-origin resources only
//! - Referrer-Policy: strict-origin-when-cross-origin
//! - Permissions-Policy: camera and geolocation for the lab client only
//! - Strict-Transport-Security: only when cookies are marked `Secure`
//! - Cache-Control: no-store on `/api` responses, which carry per-user data
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Whether HSTS is sent; it follows the `session.secure_cookie` setting
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeaders {
    pub hsts: bool,
}

/// Security headers middleware
///
/// ```ignore
/// router.layer(middleware::from_fn_with_state(
///     SecurityHeaders { hsts: config.session.secure_cookie },
///     security_headers_middleware,
/// ))
/// ```
pub async fn security_headers_middleware(
    State(settings): State<SecurityHeaders>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_api = request.uri().path().starts_with("/api/");
    let mut response = next.run(request).await;
    apply(response.headers_mut(), settings, is_api);
    response
}

fn apply(headers: &mut HeaderMap, settings: SecurityHeaders, is_api: bool) {
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; img-src 'self' data:"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    // Field collection scans QR codes and records coordinates
    headers.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(self), geolocation=(self), microphone=()"),
    );

    if settings.hsts {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    if is_api && !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn test_handler() -> impl IntoResponse {
        (StatusCode::OK, "test response")
    }

    fn app(hsts: bool) -> Router {
        Router::new()
            .route("/api/samples", get(test_handler))
            .route("/uploads/pic.png", get(test_handler))
            .layer(middleware::from_fn_with_state(
                SecurityHeaders { hsts },
                security_headers_middleware,
            ))
    }

    #[tokio::test]
    async fn test_security_headers_added() {
        let request = Request::builder()
            .uri("/api/samples")
            .body(Body::empty())
            .unwrap();
        let response = app(true).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(
            headers.get(header::REFERRER_POLICY).unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert_eq!(
            headers.get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_hsts_and_cache_control_are_conditional() {
        let request = Request::builder()
            .uri("/uploads/pic.png")
            .body(Body::empty())
            .unwrap();
        let response = app(false).oneshot(request).await.unwrap();

        let headers = response.headers();
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
        assert!(headers.get(header::CACHE_CONTROL).is_none());
        assert!(headers.get(header::CONTENT_SECURITY_POLICY).is_some());
    }

    #[tokio::test]
    async fn test_security_headers_on_error_response() {
        async fn error_handler() -> impl IntoResponse {
            (StatusCode::INTERNAL_SERVER_ERROR, "error")
        }

        let app = Router::new()
            .route("/api/error", get(error_handler))
            .layer(middleware::from_fn_with_state(
                SecurityHeaders { hsts: false },
                security_headers_middleware,
            ));

        let request = Request::builder()
            .uri("/api/error")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::X_CONTENT_TYPE_OPTIONS).is_some());
        assert!(response.headers().get(header::X_FRAME_OPTIONS).is_some());
    }
}
