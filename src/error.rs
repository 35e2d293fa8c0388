//! Error types for reference parsing and planning.

use thiserror::Error;

/// Reasons an image string cannot be resolved into an [`ImageReference`].
///
/// [`ImageReference`]: crate::reference::ImageReference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("image reference is empty")]
    Empty,

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),

    #[error("repository name must be lowercase: {0}")]
    UppercaseRepository(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

/// Fatal planning errors. Per-container problems are never reported here.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to parse event image {event}: {source}")]
    EventReference {
        event: String,
        #[source]
        source: ReferenceError,
    },
}

/// Result type for planning operations
pub type Result<T> = std::result::Result<T, PlanError>;
