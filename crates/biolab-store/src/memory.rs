//! In-memory store
//!
//! Keeps every table in one `RwLock`ed struct. Used by the integration tests
//! and by `STORAGE_BACKEND=memory` for local development; nothing survives a
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use biolab_core::{
    stats, CredentialStore, DashboardStats, LabError, LabStore, NewNotification, NewProtocol,
    NewReport, NewSample, NewSensorReading, NewUser, Notification, Protocol, ProtocolPatch,
    Report, ReportPatch, Result, Sample, SamplePatch, SensorReading, SessionRecord, SessionStore,
    User, UserPatch,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: HashMap<i32, User>,
    sessions: HashMap<String, SessionRecord>,
    samples: HashMap<i32, Sample>,
    protocols: HashMap<i32, Protocol>,
    reports: HashMap<i32, Report>,
    notifications: HashMap<i32, Notification>,
    sensor_readings: HashMap<i32, SensorReading>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_user_unique(&self, id: Option<i32>, username: &str, email: &str) -> Result<()> {
        for user in self.users.values().filter(|u| Some(u.id) != id) {
            if user.username == username {
                return Err(LabError::Conflict("Username already exists".to_string()));
            }
            if user.email.eq_ignore_ascii_case(email) {
                return Err(LabError::Conflict("Email already exists".to_string()));
            }
        }
        Ok(())
    }

    fn check_sample_unique(&self, id: Option<i32>, sample_id: &str) -> Result<()> {
        if self
            .samples
            .values()
            .any(|s| Some(s.id) != id && s.sample_id == sample_id)
        {
            return Err(LabError::Conflict("Sample ID already exists".to_string()));
        }
        Ok(())
    }
}

/// Newest first, ties broken by id so ordering is stable within one instant
fn newest_first<T: Clone>(
    items: impl Iterator<Item = T>,
    key: impl Fn(&T) -> (DateTime<Utc>, i32),
) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

/// Process-local store for tests and development
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live session rows, expired or not
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

// ============================================================================
// Credentials
// ============================================================================

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(None, &user.username, &user.email)?;

        let id = tables.next_id();
        let record = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            mobile: user.mobile,
            role: user.role,
            city: user.city,
            profile_picture: user.profile_picture,
            created_at: Utc::now(),
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, id: i32, patch: &UserPatch) -> Result<User> {
        let mut tables = self.tables.write().await;
        let mut user = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| LabError::NotFound(format!("user {id}")))?;

        patch.apply(&mut user);
        tables.check_user_unique(Some(id), &user.username, &user.email)?;
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.users.values().cloned(), |u| (u.created_at, u.id)))
    }

    async fn delete_user(&self, id: i32) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let existed = tables.users.remove(&id).is_some();
        if existed {
            tables.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(existed)
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: SessionRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.user_id) {
            return Err(LabError::NotFound(format!("user {}", session.user_id)));
        }
        tables.sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn touch_session(&self, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        if let Some(session) = self.tables.write().await.sessions.get_mut(token_hash) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn destroy_session(&self, token_hash: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn destroy_sessions_for_user(&self, user_id: i32) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

// ============================================================================
// Lab records
// ============================================================================

#[async_trait]
impl LabStore for MemoryStore {
    async fn get_sample(&self, id: i32) -> Result<Option<Sample>> {
        Ok(self.tables.read().await.samples.get(&id).cloned())
    }

    async fn get_sample_by_code(&self, sample_id: &str) -> Result<Option<Sample>> {
        let tables = self.tables.read().await;
        Ok(tables
            .samples
            .values()
            .find(|s| s.sample_id == sample_id)
            .cloned())
    }

    async fn list_samples(&self) -> Result<Vec<Sample>> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.samples.values().cloned(), |s| (s.created_at, s.id)))
    }

    async fn list_samples_by_user(&self, user_id: i32) -> Result<Vec<Sample>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.samples.values().filter(|s| s.user_id == user_id).cloned(),
            |s| (s.created_at, s.id),
        ))
    }

    async fn create_sample(&self, sample: NewSample) -> Result<Sample> {
        let mut tables = self.tables.write().await;
        tables.check_sample_unique(None, &sample.sample_id)?;
        let id = tables.next_id();
        let record = Sample::from_new(id, sample, Utc::now());
        tables.samples.insert(id, record.clone());
        Ok(record)
    }

    async fn update_sample(&self, id: i32, patch: &SamplePatch) -> Result<Sample> {
        let mut tables = self.tables.write().await;
        let mut sample = tables
            .samples
            .get(&id)
            .cloned()
            .ok_or_else(|| LabError::NotFound(format!("sample {id}")))?;

        sample.apply(patch);
        tables.check_sample_unique(Some(id), &sample.sample_id)?;
        tables.samples.insert(id, sample.clone());
        Ok(sample)
    }

    async fn delete_sample(&self, id: i32) -> Result<bool> {
        Ok(self.tables.write().await.samples.remove(&id).is_some())
    }

    async fn get_protocol(&self, id: i32) -> Result<Option<Protocol>> {
        Ok(self.tables.read().await.protocols.get(&id).cloned())
    }

    async fn list_protocols(&self) -> Result<Vec<Protocol>> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.protocols.values().cloned(), |p| (p.created_at, p.id)))
    }

    async fn search_protocols(&self, query: &str) -> Result<Vec<Protocol>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.protocols.values().filter(|p| p.matches(query)).cloned(),
            |p| (p.created_at, p.id),
        ))
    }

    async fn create_protocol(&self, protocol: NewProtocol) -> Result<Protocol> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = Protocol::from_new(id, protocol, Utc::now());
        tables.protocols.insert(id, record.clone());
        Ok(record)
    }

    async fn update_protocol(&self, id: i32, patch: &ProtocolPatch) -> Result<Protocol> {
        let mut tables = self.tables.write().await;
        let protocol = tables
            .protocols
            .get_mut(&id)
            .ok_or_else(|| LabError::NotFound(format!("protocol {id}")))?;
        protocol.apply(patch, Utc::now());
        Ok(protocol.clone())
    }

    async fn delete_protocol(&self, id: i32) -> Result<bool> {
        Ok(self.tables.write().await.protocols.remove(&id).is_some())
    }

    async fn get_report(&self, id: i32) -> Result<Option<Report>> {
        Ok(self.tables.read().await.reports.get(&id).cloned())
    }

    async fn list_reports(&self) -> Result<Vec<Report>> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.reports.values().cloned(), |r| (r.created_at, r.id)))
    }

    async fn list_reports_by_user(&self, user_id: i32) -> Result<Vec<Report>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .reports
                .values()
                .filter(|r| r.generated_by == user_id)
                .cloned(),
            |r| (r.created_at, r.id),
        ))
    }

    async fn list_reports_by_sample(&self, sample_id: i32) -> Result<Vec<Report>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .reports
                .values()
                .filter(|r| r.sample_id == sample_id)
                .cloned(),
            |r| (r.created_at, r.id),
        ))
    }

    async fn create_report(&self, report: NewReport) -> Result<Report> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = Report::from_new(id, report, Utc::now());
        tables.reports.insert(id, record.clone());
        Ok(record)
    }

    async fn update_report(&self, id: i32, patch: &ReportPatch) -> Result<Report> {
        let mut tables = self.tables.write().await;
        let report = tables
            .reports
            .get_mut(&id)
            .ok_or_else(|| LabError::NotFound(format!("report {id}")))?;
        report.apply(patch, Utc::now());
        Ok(report.clone())
    }

    async fn delete_report(&self, id: i32) -> Result<bool> {
        Ok(self.tables.write().await.reports.remove(&id).is_some())
    }

    async fn get_notification(&self, id: i32) -> Result<Option<Notification>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.notifications.values().cloned(), |n| (n.created_at, n.id)))
    }

    async fn list_notifications_by_user(&self, user_id: i32) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .notifications
                .values()
                .filter(|n| n.user_id == user_id)
                .cloned(),
            |n| (n.created_at, n.id),
        ))
    }

    async fn create_notification(&self, notification: NewNotification) -> Result<Notification> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = Notification::from_new(id, notification, Utc::now());
        tables.notifications.insert(id, record.clone());
        Ok(record)
    }

    async fn mark_notification_read(&self, id: i32) -> Result<()> {
        let mut tables = self.tables.write().await;
        let notification = tables
            .notifications
            .get_mut(&id)
            .ok_or_else(|| LabError::NotFound(format!("notification {id}")))?;
        notification.read = true;
        Ok(())
    }

    async fn delete_notification(&self, id: i32) -> Result<bool> {
        Ok(self.tables.write().await.notifications.remove(&id).is_some())
    }

    async fn get_sensor_reading(&self, id: i32) -> Result<Option<SensorReading>> {
        Ok(self.tables.read().await.sensor_readings.get(&id).cloned())
    }

    async fn list_sensor_readings(&self, sample_id: i32) -> Result<Vec<SensorReading>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .sensor_readings
                .values()
                .filter(|r| r.sample_id == sample_id)
                .cloned(),
            |r| (r.timestamp, r.id),
        ))
    }

    async fn create_sensor_reading(&self, reading: NewSensorReading) -> Result<SensorReading> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = SensorReading::from_new(id, reading, Utc::now());
        tables.sensor_readings.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_sensor_reading(&self, id: i32) -> Result<bool> {
        Ok(self.tables.write().await.sensor_readings.remove(&id).is_some())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let tables = self.tables.read().await;
        let users: Vec<User> = tables.users.values().cloned().collect();
        let samples: Vec<Sample> = tables.samples.values().cloned().collect();
        let reports: Vec<Report> = tables.reports.values().cloned().collect();
        Ok(stats::dashboard_stats(&users, &samples, &reports))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biolab_core::{ReportStatus, Role, SampleStatus, SampleType};
    use chrono::Duration;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "aa.bb".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{username}@lab.test"),
            mobile: None,
            role: Role::Student,
            city: None,
            profile_picture: None,
        }
    }

    fn new_sample(code: &str, user_id: i32) -> NewSample {
        NewSample {
            sample_id: code.to_string(),
            user_id,
            sample_type: SampleType::Soil,
            collection_date: Utc::now(),
            collection_time: "08:15".to_string(),
            location: Some("Field 3".to_string()),
            geolocation: None,
            temperature: Some(18.0),
            ph: Some(6.4),
            salinity: None,
            conductivity: None,
            field_conditions: None,
            status: SampleStatus::Pending,
            qr_code: None,
            barcode: None,
        }
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice")).await.unwrap();

        let err = store.create_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, LabError::Conflict(ref m) if m == "Username already exists"));

        let mut other = new_user("alicia");
        other.email = "ALICE@lab.test".to_string();
        let err = store.create_user(other).await.unwrap_err();
        assert!(matches!(err, LabError::Conflict(ref m) if m == "Email already exists"));

        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_and_missing_user() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("bob")).await.unwrap();

        let patch = UserPatch {
            city: Some("Lyon".to_string()),
            ..Default::default()
        };
        let updated = store.update_user(user.id, &patch).await.unwrap();
        assert_eq!(updated.city.as_deref(), Some("Lyon"));

        let err = store.update_user(999, &patch).await.unwrap_err();
        assert!(matches!(err, LabError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("carol")).await.unwrap();
        let now = Utc::now();

        for (hash, offset) in [("live", 1), ("stale", -1)] {
            store
                .create_session(SessionRecord {
                    token_hash: hash.to_string(),
                    user_id: user.id,
                    created_at: now,
                    expires_at: now + Duration::hours(offset),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.purge_expired_sessions(now).await.unwrap(), 1);
        assert!(store.find_session("stale").await.unwrap().is_none());

        let later = now + Duration::hours(5);
        store.touch_session("live", later).await.unwrap();
        assert_eq!(
            store.find_session("live").await.unwrap().unwrap().expires_at,
            later
        );

        store.destroy_session("live").await.unwrap();
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_deleting_user_drops_sessions() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("dave")).await.unwrap();
        let now = Utc::now();
        store
            .create_session(SessionRecord {
                token_hash: "t".to_string(),
                user_id: user.id,
                created_at: now,
                expires_at: now + Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(!store.delete_user(user.id).await.unwrap());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_samples_by_owner_and_duplicate_code() {
        let store = MemoryStore::new();
        store.create_sample(new_sample("S-1", 1)).await.unwrap();
        store.create_sample(new_sample("S-2", 2)).await.unwrap();

        let err = store.create_sample(new_sample("S-1", 2)).await.unwrap_err();
        assert!(matches!(err, LabError::Conflict(_)));

        let mine = store.list_samples_by_user(1).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].sample_id, "S-1");
        assert_eq!(store.list_samples().await.unwrap().len(), 2);
        assert!(store.get_sample_by_code("S-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let store = MemoryStore::new();
        store.create_user(new_user("erin")).await.unwrap();
        let sample = store.create_sample(new_sample("S-9", 1)).await.unwrap();
        store
            .update_sample(
                sample.id,
                &SamplePatch {
                    status: Some(SampleStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .create_report(NewReport {
                sample_id: sample.id,
                title: "Soil summary".to_string(),
                content: serde_json::json!({"charts": []}),
                generated_by: 1,
                status: ReportStatus::Draft,
                pdf_path: None,
            })
            .await
            .unwrap();

        let stats = store.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_samples, 1);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.pending_reports, 1);
        assert_eq!(stats.completed_samples, 1);
    }

    #[tokio::test]
    async fn test_notifications_mark_read() {
        let store = MemoryStore::new();
        let n = store
            .create_notification(NewNotification::sample_submitted(4, "S-4"))
            .await
            .unwrap();
        assert!(!n.read);
        store.mark_notification_read(n.id).await.unwrap();
        assert!(store.get_notification(n.id).await.unwrap().unwrap().read);
        assert!(store.mark_notification_read(12345).await.is_err());
        assert_eq!(store.list_notifications_by_user(4).await.unwrap().len(), 1);
        assert!(store.list_notifications_by_user(5).await.unwrap().is_empty());
    }
}
