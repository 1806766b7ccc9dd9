//! Batch check pipeline: parse → resolve scraper → fetch → compare → notify → persist.
//!
//! Entries are processed strictly in input order. Every entry succeeds or
//! fails on its own; failures are collected and returned together as one
//! [`AggregateError`] once the whole batch has been processed. State saved for
//! earlier entries is never rolled back.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use registry_ping_state::{ImageState, StateError, StateStore};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::image_ref::{ImageRef, RefError};
use crate::notify::{ChangeEvent, NotifyError, Notifier};
use crate::obs;
use crate::scraper::{FetchError, NoScraperForHost, ScraperRegistry};

/// Why a single entry failed.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("{0}")]
    InvalidReference(#[from] RefError),

    #[error("{0}")]
    NoScraperForHost(#[from] NoScraperForHost),

    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("state error: {0}")]
    StateIo(#[from] StateError),

    #[error("notify failed: {0}")]
    NotifyFailed(#[from] NotifyError),

    #[error("cancelled before completion")]
    Cancelled,
}

/// A failure tagged with the raw input string it came from.
#[derive(Debug, Error)]
#[error("{reference}: {error}")]
pub struct EntryError {
    pub reference: String,
    #[source]
    pub error: CheckError,
}

/// What happened to one successfully checked entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    FirstSeen,
    Updated,
    Unchanged,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Entries processed, successful or not.
    pub checked: usize,
    pub first_seen: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl RunReport {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::FirstSeen => self.first_seen += 1,
            CheckOutcome::Updated => self.updated += 1,
            CheckOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Number of change notifications sent.
    pub fn changes(&self) -> usize {
        self.first_seen + self.updated
    }
}

/// Every failed entry of a run, in input order.
#[derive(Debug)]
pub struct AggregateError {
    pub failures: Vec<EntryError>,
    pub report: RunReport,
}

impl AggregateError {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryError> {
        self.failures.iter()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} image checks failed",
            self.failures.len(),
            self.report.checked
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Orchestrates one batch of image checks.
pub struct Checker {
    scrapers: ScraperRegistry,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
}

impl Checker {
    pub fn new(
        scrapers: ScraperRegistry,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            scrapers,
            store,
            notifier,
        }
    }

    /// Check every reference in `refs`, in order.
    ///
    /// Succeeds only when no entry failed. Once `cancel` fires, the entry in
    /// flight and all entries not yet started fail with
    /// [`CheckError::Cancelled`].
    pub async fn run<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        refs: &[S],
    ) -> Result<RunReport, AggregateError> {
        let started = Instant::now();
        let mut report = RunReport::default();
        let mut failures = Vec::new();

        async {
            obs::emit_run_started(refs.len());

            for raw in refs {
                let raw = raw.as_ref();
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CheckError::Cancelled),
                    result = self.check(raw).instrument(obs::check_span(raw)) => result,
                };

                report.checked += 1;
                match result {
                    Ok(outcome) => report.record(outcome),
                    Err(error) => {
                        obs::emit_check_failed(raw, &error);
                        report.failed += 1;
                        failures.push(EntryError {
                            reference: raw.to_string(),
                            error,
                        });
                    }
                }
            }

            obs::emit_run_finished(&report, started.elapsed().as_millis() as u64);
        }
        .instrument(obs::run_span(refs.len()))
        .await;

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(AggregateError { failures, report })
        }
    }

    /// Run the full pipeline for a single raw reference.
    pub async fn check(&self, raw: &str) -> Result<CheckOutcome, CheckError> {
        let image = ImageRef::parse(raw)?;

        let scraper = self.scrapers.resolve(&image)?;
        debug!(scraper = scraper.name(), host = image.host(), "resolved scraper");

        let info = scraper.fetch(&image).await?;
        let key = image.key();

        let event = match self.store.load(&key).await? {
            None => ChangeEvent::first_seen(image, info.last_pushed),
            Some(stored) if info.last_pushed > stored.last_pushed => {
                ChangeEvent::updated(image, stored.last_pushed, info.last_pushed)
            }
            Some(stored) => {
                obs::emit_unchanged(&key, stored.last_pushed, info.last_pushed);
                return Ok(CheckOutcome::Unchanged);
            }
        };

        self.notifier.notify(&event).await?;
        self.store
            .save(&key, ImageState::new(info.last_pushed))
            .await?;
        obs::emit_change(&event);

        Ok(if event.is_first_seen {
            CheckOutcome::FirstSeen
        } else {
            CheckOutcome::Updated
        })
    }
}
