//! Change notifications.
//!
//! The checker builds one [`ChangeEvent`] per detected change and hands it to
//! a [`Notifier`]. No-change outcomes never reach the notifier.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::image_ref::ImageRef;

const LINE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A first-seen or advanced tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub image: ImageRef,
    pub is_first_seen: bool,
    /// Previously stored push time; `None` when the tag is first seen.
    pub old_pushed: Option<DateTime<Utc>>,
    pub new_pushed: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn first_seen(image: ImageRef, new_pushed: DateTime<Utc>) -> Self {
        Self {
            image,
            is_first_seen: true,
            old_pushed: None,
            new_pushed,
        }
    }

    pub fn updated(image: ImageRef, old_pushed: DateTime<Utc>, new_pushed: DateTime<Utc>) -> Self {
        Self {
            image,
            is_first_seen: false,
            old_pushed: Some(old_pushed),
            new_pushed,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to write notification: {0}")]
    Io(#[from] std::io::Error),

    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Sink for change events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError>;
}

/// Prints one line per change:
///
/// ```text
/// [NEW]     php:8.2.30-fpm  last_pushed=2026-02-04T17:56:28Z
/// [UPDATED] php:8.2.30-fpm  2026-01-01T00:00:00Z -> 2026-02-04T17:56:28Z
/// ```
pub struct StdoutNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutNotifier {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// Write lines to `out` instead of stdout.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for StdoutNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the single output line for `event`, without trailing newline.
pub fn format_line(event: &ChangeEvent) -> String {
    let new = event.new_pushed.format(LINE_TIME_FORMAT);
    match (event.is_first_seen, event.old_pushed) {
        (false, Some(old)) => format!(
            "[UPDATED] {}  {} -> {}",
            event.image,
            old.format(LINE_TIME_FORMAT),
            new
        ),
        _ => format!("[NEW]     {}  last_pushed={}", event.image, new),
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let line = format_line(event);
        let mut out = self
            .out
            .lock()
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
