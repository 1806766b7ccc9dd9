//! Image references: parsing free-form `[host/][namespace/]name:tag` strings
//! into a canonical tuple and formatting them back into state-file keys.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Namespace used by official images on the default public registry.
pub const LIBRARY_NAMESPACE: &str = "library";

/// Why a reference string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefError {
    #[error("invalid reference {input:?}: tag required (use name:tag)")]
    MissingTag { input: String },

    #[error("invalid reference {input:?}: tag must not be empty")]
    EmptyTag { input: String },

    #[error("invalid reference {input:?}: unsupported path format")]
    UnsupportedPath { input: String },

    #[error("invalid reference {input:?}: name must not be empty")]
    EmptyName { input: String },
}

/// A specific tag of an image in a registry.
///
/// `host` is empty for the default public registry (Docker Hub). For that
/// registry a single-segment name is normalized into the `library` namespace;
/// third-party hosts keep an empty namespace instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    host: String,
    namespace: String,
    name: String,
    tag: String,
}

impl ImageRef {
    /// Parse a reference such as `php:8.2.30-fpm`, `myorg/img:1.0` or
    /// `ghcr.io/org/img:latest`. A tag is required.
    pub fn parse(input: &str) -> Result<Self, RefError> {
        let (path, tag) = input.rsplit_once(':').ok_or_else(|| RefError::MissingTag {
            input: input.to_string(),
        })?;
        if tag.is_empty() {
            return Err(RefError::EmptyTag {
                input: input.to_string(),
            });
        }

        let mut segments: Vec<&str> = path.split('/').collect();

        let mut host = "";
        if segments[0].contains('.') || segments[0] == "localhost" {
            host = segments.remove(0);
        }

        let (namespace, name) = match segments.as_slice() {
            [name] if host.is_empty() => (LIBRARY_NAMESPACE, *name),
            [name] => ("", *name),
            [namespace, name] if !namespace.is_empty() => (*namespace, *name),
            _ => {
                return Err(RefError::UnsupportedPath {
                    input: input.to_string(),
                })
            }
        };

        if name.is_empty() {
            return Err(RefError::EmptyName {
                input: input.to_string(),
            });
        }

        Ok(Self {
            host: host.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Registry host, empty for the default public registry.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Canonical string form, used as the state-store key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

/// Omits an empty host. On the default registry the `library` namespace is
/// implied and omitted; host-qualified refs always keep a non-empty namespace
/// verbatim, so `ghcr.io/library/img:latest` and `ghcr.io/img:latest` stay
/// distinct keys.
impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implied_namespace = self.host.is_empty() && self.namespace == LIBRARY_NAMESPACE;
        if !self.host.is_empty() {
            write!(f, "{}/", self.host)?;
        }
        if !self.namespace.is_empty() && !implied_namespace {
            write!(f, "{}/", self.namespace)?;
        }
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
