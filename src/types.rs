//! Data structures used throughout the planner.
//!
//! These types are serialised using [`serde`](https://serde.rs/) so that
//! the collaborators feeding the planner (registry listeners, cluster
//! watchers) can hand over snapshots as JSON, and so the dry-run driver
//! can print outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Update strategy in force for a workload.
///
/// The planner does not interpret the policy; it only carries it into
/// log records so decisions can be traced back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    All,
    Major,
    Minor,
    Patch,
    Force,
    #[default]
    None,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::All => "all",
            Policy::Major => "major",
            Policy::Minor => "minor",
            Policy::Patch => "patch",
            Policy::Force => "force",
            Policy::None => "none",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Policy::All),
            "major" => Ok(Policy::Major),
            "minor" => Ok(Policy::Minor),
            "patch" => Ok(Policy::Patch),
            "force" => Ok(Policy::Force),
            "none" | "" => Ok(Policy::None),
            other => Err(format!("unknown policy: {}", other)),
        }
    }
}

/// Notification that a new version of an image exists in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryEvent {
    /// Registry host, when the event source reports it separately from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub repository_name: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl RepositoryEvent {
    pub fn new(repository_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            host: None,
            repository_name: repository_name.into(),
            tag: tag.into(),
            digest: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Digest carried by the event, if any and not blank.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref().filter(|d| !d.is_empty())
    }
}

/// Combined `[host/]name[:tag]` form, parseable as an image reference.
impl fmt::Display for RepositoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
            write!(f, "{}/", host)?;
        }
        f.write_str(&self.repository_name)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// Pod template portion of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PodTemplate {
    /// Template-level annotations. Changing these forces a rollout even
    /// when no image string changes.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Containers in declaration order. Order is significant.
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// Snapshot of a workload under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Workload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub template: PodTemplate,
}

impl Workload {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.template.containers.push(container);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn containers(&self) -> &[Container] {
        &self.template.containers
    }
}

/// One container image rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerChange {
    /// Position of the container in the template.
    pub index: usize,
    pub container: String,
    pub previous_image: String,
    pub new_image: String,
    pub previous_version: String,
    pub new_version: String,
}

/// Result of planning one event against one workload.
///
/// `current_version` and `new_version` describe the last matching
/// container only; `changes` lists every container that was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdatePlan {
    pub current_version: String,
    pub new_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<Workload>,
    #[serde(default)]
    pub changes: Vec<ContainerChange>,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Why a container was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The container image could not be parsed.
    InvalidImage { error: String },
    /// The container runs a different repository.
    RepositoryMismatch { repository: String },
    /// Poll-schedule gate: tags differ.
    PollTagMismatch { tag: String },
    /// Force-tag-match gate: tags differ.
    ForceTagMismatch { tag: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidImage { error } => write!(f, "invalid image: {}", error),
            SkipReason::RepositoryMismatch { repository } => {
                write!(f, "repository {} does not match", repository)
            }
            SkipReason::PollTagMismatch { tag } => {
                write!(f, "poll schedule requires matching tag, found {}", tag)
            }
            SkipReason::ForceTagMismatch { tag } => {
                write!(f, "force tag match requires matching tag, found {}", tag)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedContainer {
    pub index: usize,
    pub container: String,
    pub image: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Everything the planner reports back for a non-fatal run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: UpdatePlan,
    pub should_update: bool,
    #[serde(default)]
    pub skipped: Vec<SkippedContainer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Minor".parse::<Policy>(), Ok(Policy::Minor));
        assert_eq!(" FORCE ".parse::<Policy>(), Ok(Policy::Force));
        assert_eq!("".parse::<Policy>(), Ok(Policy::None));
        assert!("sometimes".parse::<Policy>().is_err());
    }

    #[test]
    fn policy_serializes_lowercase() {
        let json = serde_json::to_string(&Policy::Patch).expect("serialize");
        assert_eq!(json, "\"patch\"");
        assert_eq!(Policy::Patch.to_string(), "patch");
    }

    #[test]
    fn event_display_combines_host_name_and_tag() {
        assert_eq!(RepositoryEvent::new("nginx", "1.21").to_string(), "nginx:1.21");
        assert_eq!(
            RepositoryEvent::new("org/app", "v2")
                .with_host("quay.io")
                .to_string(),
            "quay.io/org/app:v2"
        );
        assert_eq!(RepositoryEvent::new("nginx", "").to_string(), "nginx");
    }

    #[test]
    fn blank_digest_is_treated_as_absent() {
        let event = RepositoryEvent::new("nginx", "1.21").with_digest("");
        assert_eq!(event.digest(), None);
    }

    #[test]
    fn workload_deserializes_with_missing_sections() {
        let workload: Workload = serde_json::from_str(
            r#"{"name":"web","template":{"containers":[{"name":"app","image":"nginx:1.20"}]}}"#,
        )
        .expect("deserialize");
        assert_eq!(workload.name, "web");
        assert!(workload.annotations.is_empty());
        assert_eq!(workload.containers().len(), 1);
    }

    #[test]
    fn skipped_container_flattens_reason() {
        let skipped = SkippedContainer {
            index: 1,
            container: "sidecar".into(),
            image: "envoy:1.0".into(),
            reason: SkipReason::RepositoryMismatch {
                repository: "index.docker.io/library/envoy".into(),
            },
        };
        let value = serde_json::to_value(&skipped).expect("serialize");
        assert_eq!(value["reason"], "repository_mismatch");
        assert_eq!(value["repository"], "index.docker.io/library/envoy");
    }
}
