//! Storage trait definitions for registry-ping
//!
//! `StateStore` is the only persistence abstraction the checker needs: a
//! key→`ImageState` mapping where the key is the canonical string form of an
//! image reference. Implementations:
//! - [`crate::JsonStateStore`] for production use
//! - [`crate::fakes::MemoryStateStore`] for tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Result type for state operations
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Persisted record for a single image tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageState {
    /// Registry-reported time the tag was last pushed (UTC)
    pub last_pushed: DateTime<Utc>,
}

impl ImageState {
    pub fn new(last_pushed: DateTime<Utc>) -> Self {
        Self { last_pushed }
    }
}

/// Key→timestamp persistence.
///
/// Guarantees:
/// - `load` on a store with no history returns `Ok(None)`, never an error.
/// - `save(key, s)` followed by `load(key)` returns `Some(s)`.
/// - `save` never touches keys other than `key`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the stored state for `key`, or `None` if the key was never saved.
    async fn load(&self, key: &str) -> StateResult<Option<ImageState>>;

    /// Insert or overwrite the state for `key`.
    async fn save(&self, key: &str, state: ImageState) -> StateResult<()>;
}
