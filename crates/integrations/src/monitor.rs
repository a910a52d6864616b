use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::health::{HealthConfig, HealthReport, HealthStatus, IntegrationHealth, classify};

#[derive(Debug, Default)]
struct Metrics {
    attempted: u64,
    succeeded: u64,
    failed: u64,
    last_error: Option<String>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    /// Most recent settled outcomes, `true` for failure.
    window: VecDeque<bool>,
    status: Option<HealthStatus>,
}

impl Metrics {
    fn window_failures(&self) -> usize {
        self.window.iter().filter(|failed| **failed).count()
    }

    fn classify(&self, config: &HealthConfig) -> HealthStatus {
        classify(self.window_failures(), self.window.len(), config.failure_threshold)
    }

    fn push_outcome(&mut self, failed: bool, capacity: usize) {
        if self.window.len() == capacity {
            self.window.pop_front();
        }
        self.window.push_back(failed);
    }

    fn snapshot(&self, name: &str, config: &HealthConfig) -> IntegrationHealth {
        let window_failures = self.window_failures();
        let failure_ratio = if self.window.is_empty() {
            0.0
        } else {
            window_failures as f64 / self.window.len() as f64
        };
        IntegrationHealth {
            name: name.to_string(),
            status: self.classify(config),
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
            in_flight: self.attempted.saturating_sub(self.succeeded + self.failed),
            window_outcomes: self.window.len(),
            window_failures,
            failure_ratio,
            last_error: self.last_error.clone(),
            last_success_at: self.last_success_at,
            last_failure_at: self.last_failure_at,
        }
    }
}

/// Per-integration delivery counters and health classification.
///
/// All counters of all integrations live behind one lock, so a reset racing
/// with a record call leaves either the pre-reset or the post-reset state,
/// never a mix.
#[derive(Debug)]
pub struct HealthMonitor {
    config: HealthConfig,
    metrics: Mutex<HashMap<String, Metrics>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            metrics: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Metrics>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_attempt(&self, integration: &str) {
        let mut table = self.table();
        table.entry(integration.to_string()).or_default().attempted += 1;
    }

    pub fn record_success(&self, integration: &str) {
        let mut table = self.table();
        let metrics = table.entry(integration.to_string()).or_default();
        metrics.succeeded += 1;
        metrics.last_success_at = Some(Utc::now());
        metrics.push_outcome(false, self.config.window);
        self.track_transition(integration, metrics);
    }

    pub fn record_failure(&self, integration: &str, error: impl core::fmt::Display) {
        let error = error.to_string();
        let mut table = self.table();
        let metrics = table.entry(integration.to_string()).or_default();
        metrics.failed += 1;
        metrics.last_failure_at = Some(Utc::now());
        metrics.push_outcome(true, self.config.window);
        tracing::debug!(integration, error = %error, "integration delivery failed");
        metrics.last_error = Some(error);
        self.track_transition(integration, metrics);
    }

    fn track_transition(&self, integration: &str, metrics: &mut Metrics) {
        let previous = metrics.status.unwrap_or(HealthStatus::Healthy);
        let current = metrics.classify(&self.config);
        metrics.status = Some(current);

        if current > previous {
            tracing::warn!(
                integration,
                from = %previous,
                to = %current,
                window_failures = metrics.window_failures(),
                window_outcomes = metrics.window.len(),
                last_error = metrics.last_error.as_deref().unwrap_or(""),
                "integration health worsened"
            );
        } else if current < previous {
            tracing::info!(integration, from = %previous, to = %current, "integration health recovered");
        }
    }

    pub fn get_health(&self) -> HealthReport {
        let table = self.table();
        let integrations: BTreeMap<String, IntegrationHealth> = table
            .iter()
            .map(|(name, m)| (name.clone(), m.snapshot(name, &self.config)))
            .collect();
        HealthReport::from_integrations(integrations, Utc::now())
    }

    /// `None` when the integration has never been recorded.
    pub fn get_integration_health(&self, integration: &str) -> Option<IntegrationHealth> {
        self.table()
            .get(integration)
            .map(|m| m.snapshot(integration, &self.config))
    }

    /// Zero every counter of one integration. Returns whether it was tracked.
    pub fn reset_metrics(&self, integration: &str) -> bool {
        let mut table = self.table();
        match table.get_mut(integration) {
            Some(metrics) => {
                *metrics = Metrics::default();
                tracing::info!(integration, "integration metrics reset");
                true
            }
            None => false,
        }
    }

    /// Zero every counter of every integration in one step.
    pub fn reset_all(&self) -> usize {
        let mut table = self.table();
        for metrics in table.values_mut() {
            *metrics = Metrics::default();
        }
        tracing::info!(integrations = table.len(), "all integration metrics reset");
        table.len()
    }

    pub fn integrations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table().keys().cloned().collect();
        names.sort();
        names
    }
}
