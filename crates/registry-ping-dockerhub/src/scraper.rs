use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use registry_ping_core::image_ref::LIBRARY_NAMESPACE;
use registry_ping_core::{FetchError, FetchResult, ImageInfo, ImageRef, Scraper};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

/// Public Docker Hub API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://hub.docker.com";

pub const USER_AGENT: &str = concat!("registry-ping/", env!("CARGO_PKG_VERSION"));

const HANDLED_HOSTS: &[&str] = &["", "docker.io", "hub.docker.com"];

/// Build the HTTP client used for registry lookups.
///
/// `timeout` bounds each request from connect to end of body.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    tag_last_pushed: Option<DateTime<Utc>>,
}

/// Scraper for the default public registry.
///
/// Handles the empty host (`php:8.2`), `docker.io` and `hub.docker.com`.
#[derive(Debug, Clone)]
pub struct DockerHubScraper {
    client: reqwest::Client,
    base_url: String,
}

impl DockerHubScraper {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the scraper at another API root, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Tag endpoint for `image`. Host-qualified refs without a namespace
    /// (`docker.io/nginx:1`) resolve to the official `library` repositories.
    pub fn tag_url(&self, image: &ImageRef) -> String {
        let namespace = match image.namespace() {
            "" => LIBRARY_NAMESPACE,
            ns => ns,
        };
        format!(
            "{}/v2/repositories/{}/{}/tags/{}",
            self.base_url,
            namespace,
            image.name(),
            image.tag()
        )
    }
}

#[async_trait]
impl Scraper for DockerHubScraper {
    fn name(&self) -> &str {
        "dockerhub"
    }

    fn can_handle(&self, host: &str) -> bool {
        HANDLED_HOSTS.contains(&host)
    }

    async fn fetch(&self, image: &ImageRef) -> FetchResult<ImageInfo> {
        let url = self.tag_url(image);
        debug!(url = %url, "querying Docker Hub");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("{image}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                reference: image.to_string(),
            });
        }
        if !status.is_success() {
            warn!(image = %image, status = status.as_u16(), "Docker Hub returned an error status");
            return Err(FetchError::UnexpectedStatus {
                reference: image.to_string(),
                status: status.as_u16(),
            });
        }

        let body: TagResponse = response.json().await.map_err(|e| FetchError::Decode {
            reference: image.to_string(),
            detail: e.to_string(),
        })?;
        let last_pushed = body.tag_last_pushed.ok_or_else(|| FetchError::Decode {
            reference: image.to_string(),
            detail: "tag_last_pushed is missing or null".to_string(),
        })?;

        Ok(ImageInfo {
            image: image.clone(),
            last_pushed,
        })
    }
}
