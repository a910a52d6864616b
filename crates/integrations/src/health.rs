use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HealthConfigError {
    #[error("failure threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("health window must hold at least one outcome")]
    EmptyWindow,
}

/// Classification policy shared by every tracked integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Highest failure ratio still considered healthy.
    pub failure_threshold: f64,
    /// Number of most recent settled outcomes considered.
    pub window: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.2,
            window: 50,
        }
    }
}

impl HealthConfig {
    pub fn new(failure_threshold: f64, window: usize) -> Result<Self, HealthConfigError> {
        let config = Self {
            failure_threshold,
            window,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HealthConfigError> {
        if !(0.0..=1.0).contains(&self.failure_threshold) {
            return Err(HealthConfigError::ThresholdOutOfRange(self.failure_threshold));
        }
        if self.window == 0 {
            return Err(HealthConfigError::EmptyWindow);
        }
        Ok(())
    }
}

/// Ordered from best to worst so the aggregate is a plain `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }
}

impl core::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a window holding `outcomes` settled deliveries of which `failures` failed.
///
/// No traffic is not failure: an empty window is healthy.
pub fn classify(failures: usize, outcomes: usize, failure_threshold: f64) -> HealthStatus {
    if outcomes == 0 {
        return HealthStatus::Healthy;
    }
    if failures >= outcomes {
        return HealthStatus::Down;
    }
    if failures as f64 / outcomes as f64 <= failure_threshold {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

/// Point-in-time view of one integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationHealth {
    pub name: String,
    pub status: HealthStatus,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Attempts not yet settled by a success or failure.
    pub in_flight: u64,
    pub window_outcomes: usize,
    pub window_failures: usize,
    pub failure_ratio: f64,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Aggregate view for the operations endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Worst status across all integrations; healthy when none are tracked.
    pub status: HealthStatus,
    pub integrations: BTreeMap<String, IntegrationHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn from_integrations(integrations: BTreeMap<String, IntegrationHealth>, checked_at: DateTime<Utc>) -> Self {
        let status = integrations
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self {
            status,
            integrations,
            checked_at,
        }
    }
}
