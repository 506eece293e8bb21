//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::password::{PasswordError, PasswordHasher};
use crate::auth::session::SessionManager;
use crate::auth::AuthContext;
use biolab_core::config::AppConfig;
use biolab_core::LabStore;
use biolab_store::Stores;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Latency histogram buckets (upper bounds in milliseconds: 10, 50, 100, 500, 1000, +Inf)
#[derive(Debug, Clone, Default)]
pub struct LatencyBuckets {
    pub under_10ms: u64,
    pub ms_10_50: u64,
    pub ms_50_100: u64,
    pub ms_100_500: u64,
    pub ms_500_1000: u64,
    pub over_1s: u64,
}

impl LatencyBuckets {
    fn observe(&mut self, latency_us: u64) {
        match latency_us / 1000 {
            0..=9 => self.under_10ms += 1,
            10..=49 => self.ms_10_50 += 1,
            50..=99 => self.ms_50_100 += 1,
            100..=499 => self.ms_100_500 += 1,
            500..=999 => self.ms_500_1000 += 1,
            _ => self.over_1s += 1,
        }
    }

    /// Cumulative counts in Prometheus `le` order, excluding +Inf
    pub fn cumulative(&self) -> [(&'static str, u64); 5] {
        let mut total = 0;
        let mut step = |n: u64| {
            total += n;
            total
        };
        [
            ("0.01", step(self.under_10ms)),
            ("0.05", step(self.ms_10_50)),
            ("0.1", step(self.ms_50_100)),
            ("0.5", step(self.ms_100_500)),
            ("1.0", step(self.ms_500_1000)),
        ]
    }
}

/// Per-endpoint request metrics
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub status_counts: HashMap<u16, u64>,
    pub total_latency_us: u64,
    pub latency_count: u64,
    pub latency_buckets: LatencyBuckets,
}

impl EndpointMetrics {
    pub fn mean_latency_secs(&self) -> f64 {
        if self.latency_count == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / self.latency_count as f64 / 1_000_000.0
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Hasher, credential store and session manager
    pub auth: AuthContext,
    /// Laboratory records
    pub lab: Arc<dyn LabStore>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Metrics keyed by normalized endpoint
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
}

impl AppState {
    /// Build state over an opened set of stores
    pub fn new(config: AppConfig, stores: Stores) -> Result<Self, PasswordError> {
        let hasher = PasswordHasher::new(&config.password)?;
        let sessions = SessionManager::new(stores.sessions, config.session.clone());
        let auth = AuthContext::new(
            hasher,
            stores.credentials,
            sessions,
            config.auth.allow_admin_registration,
        );

        Ok(Self {
            config,
            auth,
            lab: stores.lab,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            metrics: RwLock::new(HashMap::new()),
        })
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let mut metrics = self.metrics.write().await;
        let entry = metrics.entry(endpoint).or_default();
        *entry.status_counts.entry(status).or_insert(0) += 1;
        entry.total_latency_us += latency_us;
        entry.latency_count += 1;
        entry.latency_buckets.observe(latency_us);
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Copy of the per-endpoint metrics, sorted by endpoint
    pub async fn metrics_snapshot(&self) -> Vec<(String, EndpointMetrics)> {
        let mut snapshot: Vec<_> = self
            .metrics
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut buckets = LatencyBuckets::default();
        buckets.observe(500); // 0.5ms
        buckets.observe(20_000); // 20ms
        buckets.observe(2_000_000); // 2s

        let cumulative = buckets.cumulative();
        assert_eq!(cumulative[0], ("0.01", 1));
        assert_eq!(cumulative[1], ("0.05", 2));
        assert_eq!(cumulative[4], ("1.0", 2));
        assert_eq!(buckets.over_1s, 1);
    }

    #[tokio::test]
    async fn test_record_request() {
        let state = AppState::new(AppConfig::default(), Stores::memory()).unwrap();

        state.record_request("/api/samples".to_string(), 200, 1_000).await;
        state.record_request("/api/samples".to_string(), 200, 3_000).await;
        state.record_request("/api/samples".to_string(), 401, 2_000).await;

        assert_eq!(state.get_request_count(), 3);
        let snapshot = state.metrics_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        let (endpoint, metrics) = &snapshot[0];
        assert_eq!(endpoint, "/api/samples");
        assert_eq!(metrics.status_counts[&200], 2);
        assert_eq!(metrics.status_counts[&401], 1);
        assert!((metrics.mean_latency_secs() - 0.002).abs() < 1e-9);
    }
}
