//! Structured observability hooks for the check lifecycle.
//!
//! Spans: `registry_ping.run` per batch, `registry_ping.check` per entry.
//! Events carry an `event` field (`run.started`, `check.first_seen`,
//! `check.updated`, `check.unchanged`, `check.failed`, `run.finished`) so log
//! pipelines can filter on it.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn, Span};

use crate::checker::{CheckError, RunReport};
use crate::notify::ChangeEvent;

/// Span covering one batch.
pub fn run_span(images: usize) -> Span {
    tracing::info_span!("registry_ping.run", images = images)
}

/// Span covering one entry, tagged with its raw input.
pub fn check_span(reference: &str) -> Span {
    tracing::info_span!("registry_ping.check", reference = %reference)
}

pub fn emit_run_started(images: usize) {
    info!(event = "run.started", images = images);
}

/// Emit `check.first_seen` or `check.updated` for a notified change.
pub fn emit_change(event: &ChangeEvent) {
    match event.old_pushed {
        Some(old) if !event.is_first_seen => info!(
            event = "check.updated",
            image = %event.image,
            old_pushed = %old.to_rfc3339(),
            new_pushed = %event.new_pushed.to_rfc3339(),
        ),
        _ => info!(
            event = "check.first_seen",
            image = %event.image,
            last_pushed = %event.new_pushed.to_rfc3339(),
        ),
    }
}

/// Debug level: no-change is the common case.
pub fn emit_unchanged(key: &str, stored: DateTime<Utc>, fetched: DateTime<Utc>) {
    debug!(
        event = "check.unchanged",
        image = %key,
        stored = %stored.to_rfc3339(),
        fetched = %fetched.to_rfc3339(),
    );
}

pub fn emit_check_failed(reference: &str, error: &CheckError) {
    warn!(event = "check.failed", reference = %reference, error = %error);
}

pub fn emit_run_finished(report: &RunReport, duration_ms: u64) {
    info!(
        event = "run.finished",
        checked = report.checked,
        first_seen = report.first_seen,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        duration_ms = duration_ms,
        success = report.failed == 0,
    );
}
