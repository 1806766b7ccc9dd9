//! Tracing initialisation for the `registry-ping` binary.
//!
//! Logs go to stderr; stdout is reserved for change notifications.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const WORKSPACE_TARGETS: &[&str] = &[
    "registry_ping",
    "registry_ping_core",
    "registry_ping_state",
    "registry_ping_dockerhub",
];

/// Default filter: `level` for workspace crates, `warn` for dependencies.
pub fn default_filter(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{target}={}", level.as_str().to_lowercase())),
    );
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. With `json`, every line
/// is a JSON object. Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_dependencies() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("registry_ping_core=debug"));
        assert!(filter.contains("registry_ping=debug"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
