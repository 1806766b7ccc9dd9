//! In-memory fakes for the scraper and notifier capabilities (testing only)
//!
//! `StubScraper` answers from a fixed table keyed by canonical reference;
//! `RecordingNotifier` keeps every event it receives.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::image_ref::ImageRef;
use crate::notify::{ChangeEvent, NotifyError, Notifier};
use crate::scraper::{FetchError, FetchResult, ImageInfo, Scraper};

/// Scraper stub with canned answers per canonical key.
///
/// Keys without an answer fetch as [`FetchError::NotFound`].
pub struct StubScraper {
    name: String,
    hosts: HashSet<String>,
    answers: HashMap<String, FetchResult<DateTime<Utc>>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl StubScraper {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hosts: HashSet::new(),
            answers: HashMap::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Hosts this stub claims (`""` is the default public registry).
    pub fn hosts(mut self, hosts: &[&str]) -> Self {
        self.hosts = hosts.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn pushed(mut self, key: &str, last_pushed: DateTime<Utc>) -> Self {
        self.answers.insert(key.to_string(), Ok(last_pushed));
        self
    }

    pub fn failing(mut self, key: &str, error: FetchError) -> Self {
        self.answers.insert(key.to_string(), Err(error));
        self
    }

    /// Sleep before answering for `key`.
    pub fn delayed(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    /// Number of `fetch` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for StubScraper {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    async fn fetch(&self, image: &ImageRef) -> FetchResult<ImageInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = image.key();

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        match self.answers.get(&key) {
            Some(Ok(last_pushed)) => Ok(ImageInfo {
                image: image.clone(),
                last_pushed: *last_pushed,
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::NotFound { reference: key }),
        }
    }
}

/// Notifier that records events, optionally failing for chosen keys.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ChangeEvent>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject events for `key` with [`NotifyError::Unavailable`].
    pub fn fail_for(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let key = event.image.key();
        if self.failing.lock().unwrap().contains(&key) {
            return Err(NotifyError::Unavailable(format!("sink rejected {key}")));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
