//! Store traits
//!
//! Implemented by the relational backend and the in-memory backend. Lookups
//! return `Ok(None)` for absent rows; `NotFound` is reserved for mutations
//! that target a missing row.

use crate::lab::{
    NewNotification, NewProtocol, NewReport, NewSample, NewSensorReading, Notification, Protocol,
    ProtocolPatch, Report, ReportPatch, Sample, SamplePatch, SensorReading,
};
use crate::stats::DashboardStats;
use crate::{NewUser, Result, SessionRecord, User, UserPatch};
use chrono::{DateTime, Utc};

/// Persistence for user accounts
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user(&self, id: i32) -> Result<Option<User>>;

    /// Lookup by an already-normalized username
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a user; a duplicate username or email yields `Conflict`
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn update_user(&self, id: i32, patch: &UserPatch) -> Result<User>;

    /// All users, newest first
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Returns false when no such user existed
    async fn delete_user(&self, id: i32) -> Result<bool>;
}

/// Persistence for server-side sessions, keyed by token digest
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: SessionRecord) -> Result<()>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>>;

    /// Push the expiry of a live session forward
    async fn touch_session(&self, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()>;

    async fn destroy_session(&self, token_hash: &str) -> Result<()>;

    /// Drop every session of a user; returns how many were removed
    async fn destroy_sessions_for_user(&self, user_id: i32) -> Result<u64>;

    /// Drop sessions that expired before `now`; returns how many were removed
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Persistence for laboratory records
#[async_trait::async_trait]
pub trait LabStore: Send + Sync {
    // Samples
    async fn get_sample(&self, id: i32) -> Result<Option<Sample>>;
    async fn get_sample_by_code(&self, sample_id: &str) -> Result<Option<Sample>>;
    /// All samples, newest first
    async fn list_samples(&self) -> Result<Vec<Sample>>;
    async fn list_samples_by_user(&self, user_id: i32) -> Result<Vec<Sample>>;
    async fn create_sample(&self, sample: NewSample) -> Result<Sample>;
    async fn update_sample(&self, id: i32, patch: &SamplePatch) -> Result<Sample>;
    async fn delete_sample(&self, id: i32) -> Result<bool>;

    // Protocols
    async fn get_protocol(&self, id: i32) -> Result<Option<Protocol>>;
    async fn list_protocols(&self) -> Result<Vec<Protocol>>;
    /// Case-insensitive match on title, description or category
    async fn search_protocols(&self, query: &str) -> Result<Vec<Protocol>>;
    async fn create_protocol(&self, protocol: NewProtocol) -> Result<Protocol>;
    async fn update_protocol(&self, id: i32, patch: &ProtocolPatch) -> Result<Protocol>;
    async fn delete_protocol(&self, id: i32) -> Result<bool>;

    // Reports
    async fn get_report(&self, id: i32) -> Result<Option<Report>>;
    async fn list_reports(&self) -> Result<Vec<Report>>;
    async fn list_reports_by_user(&self, user_id: i32) -> Result<Vec<Report>>;
    async fn list_reports_by_sample(&self, sample_id: i32) -> Result<Vec<Report>>;
    async fn create_report(&self, report: NewReport) -> Result<Report>;
    async fn update_report(&self, id: i32, patch: &ReportPatch) -> Result<Report>;
    async fn delete_report(&self, id: i32) -> Result<bool>;

    // Notifications
    async fn get_notification(&self, id: i32) -> Result<Option<Notification>>;
    async fn list_notifications(&self) -> Result<Vec<Notification>>;
    async fn list_notifications_by_user(&self, user_id: i32) -> Result<Vec<Notification>>;
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification>;
    async fn mark_notification_read(&self, id: i32) -> Result<()>;
    async fn delete_notification(&self, id: i32) -> Result<bool>;

    // Sensor readings
    async fn get_sensor_reading(&self, id: i32) -> Result<Option<SensorReading>>;
    /// Readings of a sample, newest first
    async fn list_sensor_readings(&self, sample_id: i32) -> Result<Vec<SensorReading>>;
    async fn create_sensor_reading(&self, reading: NewSensorReading) -> Result<SensorReading>;
    async fn delete_sensor_reading(&self, id: i32) -> Result<bool>;

    async fn dashboard_stats(&self) -> Result<DashboardStats>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<()>;
}
