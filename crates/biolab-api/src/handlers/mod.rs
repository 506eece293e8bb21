//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod notifications;
pub mod protocols;
pub mod reports;
pub mod samples;
pub mod sensor_data;

use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use validator::Validate;

/// Parse a path id; anything but a positive integer is "Invalid <resource> ID"
pub(crate) fn parse_id(raw: &str, resource: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::bad_request(format!("Invalid {resource} ID")))
}

/// Unwrap and validate a JSON body, reporting failures under `message`
pub(crate) fn validated<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
    message: &str,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|e| AppError::validation(message, e.body_text()))?;
    value
        .validate()
        .map_err(|e| AppError::validation(message, e))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "sample").unwrap(), 42);
        for raw in ["0", "-3", "abc", "", "1.5", "99999999999"] {
            assert!(matches!(
                parse_id(raw, "sample"),
                Err(AppError::BadRequest(ref m)) if m == "Invalid sample ID"
            ));
        }
    }
}
