//! In-process consumer modules wired onto the event bus at startup.
//!
//! Each module subscribes under its own integration name so the health
//! monitor can tell which consumer is failing.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use nexhire_events::{Event, EventBus, SharedHandler, SubscriptionHandle, handler_fn, names};
use nexhire_integrations::{HealthMonitor, instrument};

pub const AUDIT: &str = "audit";
pub const PAYROLL: &str = "payroll";
pub const CORE: &str = "core";

const AUDITED: &[&str] = &[
    names::RBAC_ROLE_CREATED,
    names::RBAC_ROLE_UPDATED,
    names::RBAC_ROLE_DELETED,
    names::RBAC_ROLE_PERMISSIONS_ASSIGNED,
    names::RBAC_USER_ROLE_ASSIGNED,
    names::RBAC_USER_ROLE_REVOKED,
];

#[derive(Debug, Deserialize)]
struct EmployeeTerminated {
    organization_id: String,
    employee_id: String,
}

#[derive(Debug, Deserialize)]
struct PayrollRunCompleted {
    organization_id: String,
    run_id: String,
    #[serde(default)]
    employees: u32,
}

fn audit_handler() -> SharedHandler {
    handler_fn(|event: Event| async move {
        tracing::info!(
            event = event.name(),
            occurred_at = %event.occurred_at(),
            payload = %event.payload(),
            "audit"
        );
        Ok(())
    })
}

fn payroll_handler() -> SharedHandler {
    handler_fn(|event: Event| async move {
        let terminated: EmployeeTerminated = event.decode().context("employee.terminated payload")?;
        tracing::info!(
            organization_id = %terminated.organization_id,
            employee_id = %terminated.employee_id,
            "final pay run queued"
        );
        Ok(())
    })
}

fn core_handler() -> SharedHandler {
    handler_fn(|event: Event| async move {
        let run: PayrollRunCompleted = event.decode().context("payroll.run.completed payload")?;
        tracing::info!(
            organization_id = %run.organization_id,
            run_id = %run.run_id,
            employees = run.employees,
            "payslips published to employee records"
        );
        Ok(())
    })
}

/// Subscribe every built-in module. Returns the handles for teardown.
pub fn register(bus: &EventBus, monitor: &Arc<HealthMonitor>) -> Vec<SubscriptionHandle> {
    let mut handles = Vec::new();

    let audit = instrument(monitor, AUDIT, audit_handler());
    for name in AUDITED {
        handles.push(bus.subscribe(name, audit.clone()));
    }
    handles.push(bus.subscribe(names::EMPLOYEE_TERMINATED, instrument(monitor, PAYROLL, payroll_handler())));
    handles.push(bus.subscribe(names::PAYROLL_RUN_COMPLETED, instrument(monitor, CORE, core_handler())));

    tracing::info!(subscriptions = handles.len(), "modules registered");
    handles
}
