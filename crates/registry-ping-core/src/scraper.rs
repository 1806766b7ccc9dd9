//! Scraper capability and host-based scraper selection.
//!
//! A [`Scraper`] knows how to ask one family of registries for the last push
//! time of a tag. [`ScraperRegistry`] holds scrapers in priority order and
//! hands out the first one that claims a reference's host.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::image_ref::ImageRef;

/// Metadata fetched for one tag during a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub image: ImageRef,
    pub last_pushed: DateTime<Utc>,
}

/// Remote lookup failures.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The registry has no such repository or tag
    #[error("image tag not found: {reference}")]
    NotFound { reference: String },

    /// Connection, TLS or timeout failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// The registry answered with a non-success status other than 404
    #[error("unexpected status {status} for {reference}")]
    UnexpectedStatus { reference: String, status: u16 },

    /// The response body did not have the expected shape
    #[error("failed to decode response for {reference}: {detail}")]
    Decode { reference: String, detail: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Fetches tag metadata from a container registry.
///
/// Implement this trait to plug in a registry API, or a stub for tests.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Short identifier used in logs, e.g. `"dockerhub"`.
    fn name(&self) -> &str;

    /// Whether this scraper serves `host`. `host` is `""` for the default
    /// public registry.
    fn can_handle(&self, host: &str) -> bool;

    /// Fetch the last push time for `image`.
    async fn fetch(&self, image: &ImageRef) -> FetchResult<ImageInfo>;
}

/// Returned when no registered scraper claims a host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no scraper registered for host {host:?}")]
pub struct NoScraperForHost {
    pub host: String,
}

/// Ordered scraper list. Registration order is priority: the first scraper
/// whose `can_handle` accepts the host wins.
#[derive(Default, Clone)]
pub struct ScraperRegistry {
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `scraper` at the lowest priority.
    pub fn register(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.scrapers.push(scraper);
        self
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    /// First scraper that can handle `image`'s host.
    pub fn resolve(&self, image: &ImageRef) -> Result<&dyn Scraper, NoScraperForHost> {
        self.scrapers
            .iter()
            .find(|s| s.can_handle(image.host()))
            .map(|s| s.as_ref())
            .ok_or_else(|| NoScraperForHost {
                host: image.host().to_string(),
            })
    }
}

impl FromIterator<Arc<dyn Scraper>> for ScraperRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Scraper>>>(iter: I) -> Self {
        Self {
            scrapers: iter.into_iter().collect(),
        }
    }
}
