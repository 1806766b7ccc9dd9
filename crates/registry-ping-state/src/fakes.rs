//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryStateStore` satisfies the `StateStore` contract without touching
//! the filesystem, records every save, and can be told to fail loads or saves
//! for specific keys.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StateError;
use crate::storage_traits::*;

/// In-memory state store backed by a `HashMap<key, ImageState>`.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    data: Mutex<HashMap<String, ImageState>>,
    saves: Mutex<Vec<(String, ImageState)>>,
    failing_loads: Mutex<HashSet<String>>,
    failing_saves: Mutex<HashSet<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store without recording a save.
    pub fn with_entry(self, key: &str, state: ImageState) -> Self {
        self.data.lock().unwrap().insert(key.to_string(), state);
        self
    }

    /// Make every `load(key)` fail with an I/O error.
    pub fn fail_load(&self, key: &str) {
        self.failing_loads.lock().unwrap().insert(key.to_string());
    }

    /// Make every `save(key, ..)` fail with an I/O error.
    pub fn fail_save(&self, key: &str) {
        self.failing_saves.lock().unwrap().insert(key.to_string());
    }

    /// All successful saves in call order.
    pub fn saves(&self) -> Vec<(String, ImageState)> {
        self.saves.lock().unwrap().clone()
    }

    /// Current value for `key`, bypassing failure injection.
    pub fn get(&self, key: &str) -> Option<ImageState> {
        self.data.lock().unwrap().get(key).copied()
    }

    fn injected(key: &str, op: &str) -> StateError {
        StateError::Io {
            path: format!("memory://{key}").into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, format!("injected {op} failure")),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> StateResult<Option<ImageState>> {
        if self.failing_loads.lock().unwrap().contains(key) {
            return Err(Self::injected(key, "load"));
        }
        Ok(self.data.lock().unwrap().get(key).copied())
    }

    async fn save(&self, key: &str, state: ImageState) -> StateResult<()> {
        if self.failing_saves.lock().unwrap().contains(key) {
            return Err(Self::injected(key, "save"));
        }
        self.data.lock().unwrap().insert(key.to_string(), state);
        self.saves.lock().unwrap().push((key.to_string(), state));
        Ok(())
    }
}
