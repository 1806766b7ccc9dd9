//! Docker Hub scraper for registry-ping
//!
//! Reads `tag_last_pushed` from the public Docker Hub REST API
//! (`/v2/repositories/{namespace}/{name}/tags/{tag}`).

pub mod scraper;

pub use scraper::{build_http_client, DockerHubScraper, DEFAULT_BASE_URL, USER_AGENT};
