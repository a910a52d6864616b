//! Reliability tracking for cross-module communication.
//!
//! Every delivery to a named integration records an attempt and then a success
//! or a failure; the monitor classifies each integration over a trailing
//! window of outcomes and exposes an aggregate report for operators.

pub mod health;
pub mod instrument;
pub mod monitor;

pub use health::{HealthConfig, HealthConfigError, HealthReport, HealthStatus, IntegrationHealth, classify};
pub use instrument::{DeliveryError, InstrumentedHandler, MonitoredPublisher, instrument};
pub use monitor::HealthMonitor;
