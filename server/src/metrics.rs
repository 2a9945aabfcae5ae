//! Business metrics of the portal.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `portal_ticket_debits_total{type}` - Accepted debits by ledger type
//! - `portal_ticket_debits_refused_total` - Debits refused for lack of balance
//! - `portal_support_tickets_created_total` - Support cases opened
//! - `portal_applications_total{kind,outcome}` - Registrations by outcome
//! - `portal_ticket_status_changes_total{status}` - Status changes by target

use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Register all metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "portal_ticket_debits_total",
        "Tickets debited from client balances, by ledger type"
    );
    describe_counter!(
        "portal_ticket_debits_refused_total",
        "Debits refused because the balance was too low"
    );
    describe_counter!(
        "portal_support_tickets_created_total",
        "Support tickets opened"
    );
    describe_counter!(
        "portal_applications_total",
        "Seminar and event applications by kind and outcome (accepted, refused)"
    );
    describe_counter!(
        "portal_ticket_status_changes_total",
        "Ticket status changes by new status"
    );

    tracing::info!("Business metrics registered");
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be created.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_business_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}
