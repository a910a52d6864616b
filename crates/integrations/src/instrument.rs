//! Glue between the event bus and the health monitor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;

use nexhire_events::{EmitReport, Event, EventBus, EventHandler, HandlerError, SharedHandler};

use crate::monitor::HealthMonitor;

/// Bus handler that records every delivery under an integration name.
pub struct InstrumentedHandler {
    integration: String,
    inner: SharedHandler,
    monitor: Arc<HealthMonitor>,
}

impl InstrumentedHandler {
    pub fn new(integration: impl Into<String>, inner: SharedHandler, monitor: Arc<HealthMonitor>) -> Self {
        Self {
            integration: integration.into(),
            inner,
            monitor,
        }
    }

    pub fn integration(&self) -> &str {
        &self.integration
    }
}

/// An attempt that has not settled yet. Dropping it unsettled (the delivery
/// future was cancelled, e.g. by a publisher timeout) records a failure.
struct PendingDelivery<'a> {
    monitor: &'a HealthMonitor,
    integration: &'a str,
    settled: bool,
}

impl<'a> PendingDelivery<'a> {
    fn start(monitor: &'a HealthMonitor, integration: &'a str) -> Self {
        monitor.record_attempt(integration);
        Self {
            monitor,
            integration,
            settled: false,
        }
    }

    fn succeed(mut self) {
        self.settled = true;
        self.monitor.record_success(self.integration);
    }

    fn fail(mut self, error: impl core::fmt::Display) {
        self.settled = true;
        self.monitor.record_failure(self.integration, error);
    }
}

impl Drop for PendingDelivery<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(integration = self.integration, "delivery cancelled before completion");
            self.monitor.record_failure(self.integration, "delivery cancelled before completion");
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for InstrumentedHandler {
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let pending = PendingDelivery::start(&self.monitor, &self.integration);
        match AssertUnwindSafe(self.inner.handle(event)).catch_unwind().await {
            Ok(Ok(())) => {
                pending.succeed();
                Ok(())
            }
            Ok(Err(err)) => {
                pending.fail(format!("{err:#}"));
                Err(err)
            }
            Err(panic) => {
                pending.fail("handler panicked");
                // The bus owns panic isolation; keep reporting it as a panic.
                std::panic::resume_unwind(panic)
            }
        }
    }
}

/// Wrap `handler` so deliveries are tracked under `integration`.
pub fn instrument(monitor: &Arc<HealthMonitor>, integration: &str, handler: SharedHandler) -> SharedHandler {
    Arc::new(InstrumentedHandler::new(integration, handler, monitor.clone()))
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery of '{event}' timed out after {timeout:?}")]
    TimedOut { event: String, timeout: Duration },

    #[error("{} of {} listeners failed for '{}'", .0.failures.len(), .0.invoked, .0.event_name)]
    ListenersFailed(EmitReport),
}

/// Emits on behalf of a named integration and records the outcome of the
/// whole emission, bounded by a caller-side timeout.
///
/// On timeout the pending emission is dropped, so listeners that have not
/// finished are cancelled at their next suspension point.
#[derive(Debug, Clone)]
pub struct MonitoredPublisher {
    bus: Arc<EventBus>,
    monitor: Arc<HealthMonitor>,
    timeout: Duration,
}

impl MonitoredPublisher {
    pub fn new(bus: Arc<EventBus>, monitor: Arc<HealthMonitor>, timeout: Duration) -> Self {
        Self { bus, monitor, timeout }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub async fn publish(
        &self,
        integration: &str,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<EmitReport, DeliveryError> {
        self.monitor.record_attempt(integration);

        match tokio::time::timeout(self.timeout, self.bus.emit(event_name, payload)).await {
            Ok(report) if report.is_clean() => {
                self.monitor.record_success(integration);
                Ok(report)
            }
            Ok(report) => {
                let err = DeliveryError::ListenersFailed(report);
                self.monitor.record_failure(integration, &err);
                Err(err)
            }
            Err(_elapsed) => {
                let err = DeliveryError::TimedOut {
                    event: event_name.to_string(),
                    timeout: self.timeout,
                };
                tracing::warn!(integration, event = event_name, timeout_ms = self.timeout.as_millis() as u64, "delivery timed out");
                self.monitor.record_failure(integration, &err);
                Err(err)
            }
        }
    }
}
