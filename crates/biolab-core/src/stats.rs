//! Dashboard statistics
//!
//! Everything here is computed from plain slices so the same figures come out
//! of every store backend.

use crate::lab::{Report, ReportStatus, Sample, SampleStatus};
use crate::User;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Number of rows returned by the "recent" admin listings
pub const RECENT_LIMIT: usize = 10;

/// Number of days covered by the sample trend chart
pub const TREND_DAYS: i64 = 7;

/// Figures shown on every user's dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_samples: i64,
    /// All registered users
    pub active_users: i64,
    /// Reports still in draft
    pub pending_reports: i64,
    pub completed_samples: i64,
}

/// Figures shown on the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    /// Users registered within the last seven days
    pub active_users: i64,
    pub total_samples: i64,
    pub pending_samples: i64,
    pub completed_samples: i64,
    pub total_reports: i64,
    pub pending_reports: i64,
    pub system_alerts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: i32,
    pub user_id: i32,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i32,
    pub timestamp: DateTime<Utc>,
    pub user_name: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SampleTrendPoint {
    /// Short label such as "May 1"
    pub date: String,
    pub samples: i64,
}

fn count<T>(items: &[T], pred: impl Fn(&T) -> bool) -> i64 {
    items.iter().filter(|item| pred(item)).count() as i64
}

pub fn dashboard_stats(users: &[User], samples: &[Sample], reports: &[Report]) -> DashboardStats {
    DashboardStats {
        total_samples: samples.len() as i64,
        active_users: users.len() as i64,
        pending_reports: count(reports, |r| r.status == ReportStatus::Draft),
        completed_samples: count(samples, |s| s.status == SampleStatus::Completed),
    }
}

pub fn admin_stats(
    users: &[User],
    samples: &[Sample],
    reports: &[Report],
    now: DateTime<Utc>,
) -> AdminStats {
    let week_ago = now - Duration::days(TREND_DAYS);

    AdminStats {
        total_users: users.len() as i64,
        active_users: count(users, |u| u.created_at > week_ago),
        total_samples: samples.len() as i64,
        pending_samples: count(samples, |s| s.status == SampleStatus::Pending),
        completed_samples: count(samples, |s| s.status == SampleStatus::Completed),
        total_reports: reports.len() as i64,
        pending_reports: count(reports, |r| r.status == ReportStatus::Draft),
        system_alerts: 0,
    }
}

pub fn recent_users(users: &[User]) -> Vec<User> {
    let mut users = users.to_vec();
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    users.truncate(RECENT_LIMIT);
    users
}

pub fn recent_samples(samples: &[Sample]) -> Vec<Sample> {
    let mut samples = samples.to_vec();
    samples.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    samples.truncate(RECENT_LIMIT);
    samples
}

/// Sample-creation events for the ten newest samples, newest first
pub fn activity_logs(users: &[User], samples: &[Sample]) -> Vec<ActivityLogEntry> {
    recent_samples(samples)
        .into_iter()
        .map(|sample| {
            let user_name = users
                .iter()
                .find(|u| u.id == sample.user_id)
                .map(User::full_name)
                .unwrap_or_else(|| "Unknown User".to_string());

            ActivityLogEntry {
                id: sample.id,
                user_id: sample.user_id,
                action: "CREATE_SAMPLE".to_string(),
                entity_type: "sample".to_string(),
                entity_id: sample.id,
                timestamp: sample.created_at,
                user_name,
                details: format!("Created sample {} ({})", sample.sample_id, sample.sample_type),
            }
        })
        .collect()
}

/// Per-day sample counts for the last seven days (UTC), oldest first
pub fn sample_trends(samples: &[Sample], now: DateTime<Utc>) -> Vec<SampleTrendPoint> {
    (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let day = (now - Duration::days(offset)).date_naive();
            SampleTrendPoint {
                date: day.format("%b %-d").to_string(),
                samples: count(samples, |s| s.created_at.date_naive() == day),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{NewReport, NewSample, SampleType};
    use crate::Role;
    use chrono::TimeZone;

    fn user(id: i32, created_at: DateTime<Utc>) -> User {
        User {
            id,
            username: format!("user{id}"),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: format!("No{id}"),
            email: format!("user{id}@lab.test"),
            mobile: None,
            role: Role::Student,
            city: None,
            profile_picture: None,
            created_at,
        }
    }

    fn sample(id: i32, user_id: i32, status: SampleStatus, created_at: DateTime<Utc>) -> Sample {
        let new = NewSample {
            sample_id: format!("S-{id}"),
            user_id,
            sample_type: SampleType::Water,
            collection_date: created_at,
            collection_time: "09:00".to_string(),
            location: None,
            geolocation: None,
            temperature: None,
            ph: None,
            salinity: None,
            conductivity: None,
            field_conditions: None,
            status,
            qr_code: None,
            barcode: None,
        };
        Sample::from_new(id, new, created_at)
    }

    fn report(id: i32, status: ReportStatus) -> Report {
        let new = NewReport {
            sample_id: 1,
            title: format!("R{id}"),
            content: serde_json::json!({}),
            generated_by: 1,
            status,
            pdf_path: None,
        };
        Report::from_new(id, new, Utc::now())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_dashboard_stats() {
        let users = vec![user(1, now()), user(2, now() - Duration::days(30))];
        let samples = vec![
            sample(1, 1, SampleStatus::Completed, now()),
            sample(2, 1, SampleStatus::Pending, now()),
        ];
        let reports = vec![report(1, ReportStatus::Draft), report(2, ReportStatus::Shared)];

        let stats = dashboard_stats(&users, &samples, &reports);
        assert_eq!(
            stats,
            DashboardStats {
                total_samples: 2,
                active_users: 2,
                pending_reports: 1,
                completed_samples: 1,
            }
        );
    }

    #[test]
    fn test_admin_stats_counts_recent_users_only() {
        let users = vec![user(1, now() - Duration::days(1)), user(2, now() - Duration::days(30))];
        let stats = admin_stats(&users, &[], &[report(1, ReportStatus::Draft)], now());
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.pending_reports, 1);
        assert_eq!(stats.system_alerts, 0);
    }

    #[test]
    fn test_recent_lists_are_capped_and_newest_first() {
        let samples: Vec<Sample> = (1..=12)
            .map(|i| sample(i, 1, SampleStatus::Pending, now() - Duration::hours(i as i64)))
            .collect();
        let recent = recent_samples(&samples);
        assert_eq!(recent.len(), RECENT_LIMIT);
        assert_eq!(recent[0].id, 1);
        assert_eq!(recent[9].id, 10);
    }

    #[test]
    fn test_activity_logs_resolve_user_names() {
        let users = vec![user(1, now())];
        let samples = vec![
            sample(1, 1, SampleStatus::Pending, now() - Duration::hours(2)),
            sample(2, 99, SampleStatus::Pending, now()),
        ];
        let logs = activity_logs(&users, &samples);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].user_name, "Unknown User");
        assert_eq!(logs[1].user_name, "Ada No1");
        assert_eq!(logs[1].action, "CREATE_SAMPLE");
        assert_eq!(logs[1].details, "Created sample S-1 (water)");
    }

    #[test]
    fn test_sample_trends_cover_seven_days_oldest_first() {
        let samples = vec![
            sample(1, 1, SampleStatus::Pending, now()),
            sample(2, 1, SampleStatus::Pending, now() - Duration::hours(1)),
            sample(3, 1, SampleStatus::Pending, now() - Duration::days(6)),
            sample(4, 1, SampleStatus::Pending, now() - Duration::days(8)),
        ];
        let trends = sample_trends(&samples, now());
        assert_eq!(trends.len(), 7);
        assert_eq!(trends[0].date, "May 4");
        assert_eq!(trends[0].samples, 1);
        assert_eq!(trends[6].date, "May 10");
        assert_eq!(trends[6].samples, 2);
        let total: i64 = trends.iter().map(|t| t.samples).sum();
        assert_eq!(total, 3);
    }
}
