//! Image reference resolution.
//!
//! Splits strings such as `nginx:1.21`, `quay.io/org/app:v2` or
//! `localhost:5000/tools/probe@sha256:...` into registry, repository path,
//! tag and digest, applying the same normalisation Docker does for
//! references without an explicit registry.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

/// Registry implied when an image string names none.
pub const DEFAULT_REGISTRY_HOSTNAME: &str = "index.docker.io";

/// Older spelling of the default registry, normalised on parse.
pub const LEGACY_DEFAULT_REGISTRY_HOSTNAME: &str = "docker.io";

/// Tag assumed when an image string carries none.
pub const DEFAULT_TAG: &str = "latest";

/// Namespace for official images on the default registry.
const OFFICIAL_REPO_PREFIX: &str = "library/";

static PATH_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("path component regex is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("tag regex is valid"));

static DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.+_-][a-z0-9]+)*:[a-fA-F0-9]{32,}$").expect("digest regex is valid")
});

/// A parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    registry: String,
    path: String,
    tag: String,
    digest: Option<String>,
}

impl ImageReference {
    /// Parse a free-form image string.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(ReferenceError::InvalidFormat(input.to_string()));
        }

        let (name_and_tag, digest) = match input.split_once('@') {
            Some((name, digest)) => {
                if !DIGEST.is_match(digest) {
                    return Err(ReferenceError::InvalidDigest(digest.to_string()));
                }
                (name, Some(digest.to_string()))
            }
            None => (input, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let last_slash = name_and_tag.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match name_and_tag[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &name_and_tag[split + 1..];
                if !TAG.is_match(tag) {
                    return Err(ReferenceError::InvalidTag(tag.to_string()));
                }
                (&name_and_tag[..split], Some(tag))
            }
            None => (name_and_tag, None),
        };

        let (registry, path) = split_registry(name)?;

        if path.is_empty() {
            return Err(ReferenceError::InvalidFormat(input.to_string()));
        }
        for component in path.split('/') {
            if PATH_COMPONENT.is_match(component) {
                continue;
            }
            if PATH_COMPONENT.is_match(&component.to_lowercase()) {
                return Err(ReferenceError::UppercaseRepository(path.to_string()));
            }
            return Err(ReferenceError::InvalidFormat(input.to_string()));
        }

        let path = if registry == DEFAULT_REGISTRY_HOSTNAME && !path.contains('/') {
            format!("{OFFICIAL_REPO_PREFIX}{path}")
        } else {
            path.to_string()
        };

        Ok(Self {
            registry,
            path,
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
            digest,
        })
    }

    /// Registry hostname, including a port when one was given.
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path within the registry, e.g. `library/nginx`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Repository path as a user would write it for the default registry
    /// (`nginx` rather than `library/nginx`).
    pub fn short_name(&self) -> &str {
        if self.registry == DEFAULT_REGISTRY_HOSTNAME {
            self.path
                .strip_prefix(OFFICIAL_REPO_PREFIX)
                .unwrap_or(&self.path)
        } else {
            &self.path
        }
    }

    /// Registry-qualified repository, the identity used for matching.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.registry, self.path)
    }

    /// Repository path with tag, without registry.
    pub fn name(&self) -> String {
        format!("{}:{}", self.path, self.tag)
    }

    /// Fully qualified display form.
    pub fn remote(&self) -> String {
        format!("{}/{}:{}", self.registry, self.path, self.tag)
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.remote())?;
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

fn split_registry(name: &str) -> Result<(String, &str), ReferenceError> {
    match name.split_once('/') {
        Some((first, rest)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            if first.is_empty() || first.starts_with(':') || first.ends_with(':') {
                return Err(ReferenceError::InvalidFormat(name.to_string()));
            }
            let registry = if first == LEGACY_DEFAULT_REGISTRY_HOSTNAME {
                DEFAULT_REGISTRY_HOSTNAME.to_string()
            } else {
                first.to_string()
            };
            Ok((registry, rest))
        }
        _ => Ok((DEFAULT_REGISTRY_HOSTNAME.to_string(), name)),
    }
}
