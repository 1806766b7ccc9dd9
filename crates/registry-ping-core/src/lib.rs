//! registry-ping core library
//!
//! Image reference parsing, scraper selection, change notification and the
//! batch check pipeline. Persistence lives in `registry_ping_state`; the
//! Docker Hub client in `registry_ping_dockerhub`.

pub mod checker;
pub mod config;
pub mod fakes;
pub mod image_ref;
pub mod notify;
pub mod obs;
pub mod scraper;
pub mod telemetry;

pub use checker::{AggregateError, CheckError, CheckOutcome, Checker, EntryError, RunReport};
pub use config::{Config, ConfigError, ImageEntry};
pub use image_ref::{ImageRef, RefError};
pub use notify::{format_line, ChangeEvent, Notifier, NotifyError, StdoutNotifier};
pub use obs::{
    emit_change, emit_check_failed, emit_run_finished, emit_run_started, emit_unchanged,
};
pub use scraper::{FetchError, FetchResult, ImageInfo, NoScraperForHost, Scraper, ScraperRegistry};
pub use telemetry::init_tracing;

pub use registry_ping_state::{ImageState, JsonStateStore, StateError, StateStore};

/// Crate version, shared by every workspace member.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
