//! Annotation keys the planner reads and writes.

use std::collections::BTreeMap;

/// Present when the workload is checked on a poll schedule.
pub const POLL_SCHEDULE: &str = "keel.sh/pollSchedule";

/// Present when updates must only be honoured for an identical tag.
pub const FORCE_TAG_MATCH: &str = "keel.sh/match-tag";

/// Comma-separated list of images the caller should pre-pull.
pub const UPDATE_IMAGE: &str = "keel.sh/update-image";

/// Reserved for per-image digests. Not written yet.
pub const DIGEST: &str = "keel.sh/digest";

/// Template annotation stamped to force a rollout.
pub const TEMPLATE_TIME: &str = "time";

/// Workload-level markers that narrow when a repository match is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// The container tag must equal the event tag.
    PollSchedule,
    /// The container tag must equal the event tag, and the template is
    /// stamped so the workload rolls even if the image string is unchanged.
    ForceTagMatch,
}

impl Gate {
    pub const ALL: [Gate; 2] = [Gate::PollSchedule, Gate::ForceTagMatch];

    pub fn key(&self) -> &'static str {
        match self {
            Gate::PollSchedule => POLL_SCHEDULE,
            Gate::ForceTagMatch => FORCE_TAG_MATCH,
        }
    }

    /// Gates present on the workload. Only presence matters, values are ignored.
    pub fn active(annotations: &BTreeMap<String, String>) -> Vec<Gate> {
        Self::ALL
            .into_iter()
            .filter(|gate| annotations.contains_key(gate.key()))
            .collect()
    }
}

/// Whether `image` is already listed in the pull-set annotation.
pub fn should_pull_image(annotations: &BTreeMap<String, String>, image: &str) -> bool {
    annotations
        .get(UPDATE_IMAGE)
        .map(|images| images.split(',').any(|listed| listed == image))
        .unwrap_or(false)
}

/// Append `image` to the pull-set annotation unless it is already listed.
pub fn add_image_to_pull(annotations: &mut BTreeMap<String, String>, image: &str) {
    if should_pull_image(annotations, image) {
        return;
    }
    annotations
        .entry(UPDATE_IMAGE.to_string())
        .and_modify(|images| {
            if images.is_empty() {
                images.push_str(image);
            } else {
                images.push(',');
                images.push_str(image);
            }
        })
        .or_insert_with(|| image.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_gates_follow_presence_only() {
        let mut annotations = BTreeMap::new();
        assert!(Gate::active(&annotations).is_empty());

        annotations.insert(FORCE_TAG_MATCH.to_string(), String::new());
        assert_eq!(Gate::active(&annotations), vec![Gate::ForceTagMatch]);

        annotations.insert(POLL_SCHEDULE.to_string(), "@every 1m".to_string());
        assert_eq!(
            Gate::active(&annotations),
            vec![Gate::PollSchedule, Gate::ForceTagMatch]
        );
    }

    #[test]
    fn pull_set_appends_without_duplicates() {
        let mut annotations = BTreeMap::new();
        add_image_to_pull(&mut annotations, "nginx:1.21");
        add_image_to_pull(&mut annotations, "redis:7");
        add_image_to_pull(&mut annotations, "nginx:1.21");

        assert_eq!(annotations[UPDATE_IMAGE], "nginx:1.21,redis:7");
        assert!(should_pull_image(&annotations, "redis:7"));
        assert!(!should_pull_image(&annotations, "redis"));
    }

    #[test]
    fn pull_set_reuses_blank_annotation() {
        let mut annotations = BTreeMap::from([(UPDATE_IMAGE.to_string(), String::new())]);
        add_image_to_pull(&mut annotations, "nginx:1.21");
        assert_eq!(annotations[UPDATE_IMAGE], "nginx:1.21");
    }
}
