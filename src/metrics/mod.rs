//! Prometheus counters for workflow activity, exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .and_then(|counter| {
            prometheus::register(Box::new(counter.clone()))?;
            Ok(counter)
        });

    match counter {
        Ok(counter) => Some(counter),
        Err(e) => {
            warn!(metric = name, error = %e, "metric could not be registered");
            None
        }
    }
}

lazy_static! {
    static ref WORKFLOW_TRANSITIONS: Option<IntCounterVec> = counter_vec(
        "erp_workflow_transitions_total",
        "Workflow transitions applied, by entity and action",
        &["entity", "action"]
    );
    static ref WORKFLOW_FAILURES: Option<IntCounterVec> = counter_vec(
        "erp_workflow_failures_total",
        "Workflow actions refused or failed, by entity, action and error type",
        &["entity", "action", "error_type"]
    );
    static ref STOCK_MOVEMENTS: Option<IntCounterVec> = counter_vec(
        "erp_stock_movements_total",
        "Stock movements registered, by operation",
        &["operation"]
    );
    static ref CATALOG_IMPORT_ROWS: Option<IntCounterVec> = counter_vec(
        "erp_catalog_import_rows_total",
        "Catalog import rows processed, by catalog and outcome",
        &["catalog", "outcome"]
    );
}

pub fn record_transition(entity: &str, action: &str) {
    if let Some(counter) = WORKFLOW_TRANSITIONS.as_ref() {
        counter.with_label_values(&[entity, action]).inc();
    }
}

pub fn record_failure(entity: &str, action: &str, error_type: &str) {
    if let Some(counter) = WORKFLOW_FAILURES.as_ref() {
        counter.with_label_values(&[entity, action, error_type]).inc();
    }
}

pub fn record_movement(operation: &str) {
    if let Some(counter) = STOCK_MOVEMENTS.as_ref() {
        counter.with_label_values(&[operation]).inc();
    }
}

pub fn record_import_rows(catalog: &str, outcome: &str, rows: usize) {
    if let Some(counter) = CATALOG_IMPORT_ROWS.as_ref() {
        counter
            .with_label_values(&[catalog, outcome])
            .inc_by(rows as u64);
    }
}

/// Short label for an error, used as the `error_type` dimension.
pub fn error_type(err: &crate::errors::ServiceError) -> &'static str {
    use crate::errors::ServiceError::*;
    match err {
        DatabaseError(_) => "database_error",
        NotFound(_) => "not_found",
        ValidationError(_) | InvalidInput(_) | BadRequest(_) => "validation_error",
        InvalidOperation(_) => "invalid_operation",
        InsufficientStock(_) => "insufficient_stock",
        Forbidden(_) | Unauthorized(_) => "forbidden",
        Conflict(_) => "conflict",
        EventError(_) => "event_error",
        _ => "internal_error",
    }
}

/// Renders the default registry in the Prometheus text format.
pub fn render() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_transitions_show_up_in_output() {
        record_transition("request", "approve");
        record_failure("request", "approve", "invalid_operation");
        let text = render().unwrap();
        assert!(text.contains("erp_workflow_transitions_total"));
        assert!(text.contains("action=\"approve\""));
        assert!(text.contains("erp_workflow_failures_total"));
    }
}
