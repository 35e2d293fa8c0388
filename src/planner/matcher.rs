use log::{debug, error};

use crate::annotations::Gate;
use crate::reference::ImageReference;
use crate::types::{Container, SkipReason};

/// Outcome of checking one container against an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    Skip(SkipReason),
    Update {
        /// The container's current image, parsed.
        reference: ImageReference,
        /// Stamp the template so the workload rolls even without an image change.
        stamp_rollout: bool,
    },
}

/// Decide whether `container` should move to the version named by `event_ref`.
///
/// Matching is on repository identity only. Gates then narrow the match:
/// both require the container tag to equal the event tag, and the
/// force-tag-match gate additionally asks for a rollout stamp.
pub(crate) fn match_container(
    container: &Container,
    event_ref: &ImageReference,
    gates: &[Gate],
) -> Decision {
    let reference = match ImageReference::parse(&container.image) {
        Ok(reference) => reference,
        Err(e) => {
            error!(
                "Failed to parse image {} of container {}: {}",
                container.image, container.name, e
            );
            return Decision::Skip(SkipReason::InvalidImage {
                error: e.to_string(),
            });
        }
    };

    debug!(
        "Checking container {} ({}) against {}",
        container.name,
        reference.remote(),
        event_ref.remote()
    );

    if reference.repository() != event_ref.repository() {
        debug!(
            "Images do not match, ignoring {} (target {})",
            reference.remote(),
            event_ref.repository()
        );
        return Decision::Skip(SkipReason::RepositoryMismatch {
            repository: reference.repository(),
        });
    }

    let tags_equal = reference.tag() == event_ref.tag();

    if gates.contains(&Gate::PollSchedule) && !tags_equal {
        debug!(
            "Tags differ, not updating {} ({} != {})",
            container.name,
            event_ref.tag(),
            reference.tag()
        );
        return Decision::Skip(SkipReason::PollTagMismatch {
            tag: reference.tag().to_string(),
        });
    }

    let stamp_rollout = gates.contains(&Gate::ForceTagMatch);
    if stamp_rollout && !tags_equal {
        debug!(
            "Force tag match set, not updating {} ({} != {})",
            container.name,
            event_ref.tag(),
            reference.tag()
        );
        return Decision::Skip(SkipReason::ForceTagMismatch {
            tag: reference.tag().to_string(),
        });
    }

    Decision::Update {
        reference,
        stamp_rollout,
    }
}
