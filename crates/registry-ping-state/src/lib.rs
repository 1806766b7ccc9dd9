//! Registry-Ping State: persisted last-pushed timestamps
//!
//! This crate owns the durable side of a check run: a flat mapping from a
//! canonical image reference (e.g. `php:8.2.30-fpm`) to the last push
//! timestamp observed for that tag.
//!
//! ## Key Components
//!
//! - `StateStore`: async load/save contract keyed by canonical reference
//! - `JsonStateStore`: single JSON document on disk, atomic temp-file + rename writes
//! - `MemoryStateStore`: in-memory fake for tests (see [`fakes`])

mod error;
pub mod fakes;
pub mod json_store;
pub mod storage_traits;

pub use error::StateError;
pub use json_store::JsonStateStore;
pub use storage_traits::{ImageState, StateResult, StateStore};
