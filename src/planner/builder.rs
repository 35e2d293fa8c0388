use crate::annotations;
use crate::reference::ImageReference;
use crate::types::{ContainerChange, UpdatePlan, Workload};

/// Accumulates container rewrites for one planning run.
pub(crate) struct PlanBuilder<'a> {
    default_registry: &'a str,
    plan: UpdatePlan,
    pull_set: Vec<String>,
}

impl<'a> PlanBuilder<'a> {
    pub(crate) fn new(default_registry: &'a str) -> Self {
        Self {
            default_registry,
            plan: UpdatePlan::default(),
            pull_set: Vec::new(),
        }
    }

    /// Rewrite the container at `index` to `new_tag`.
    ///
    /// The plan's version summary is overwritten on every call, so after
    /// several matches it describes the last one.
    pub(crate) fn apply(
        &mut self,
        workload: &mut Workload,
        index: usize,
        reference: &ImageReference,
        new_tag: &str,
    ) -> ContainerChange {
        let new_image = render_image(reference, self.default_registry, new_tag);
        let container = &mut workload.template.containers[index];
        let previous_image = std::mem::replace(&mut container.image, new_image.clone());

        if !self.pull_set.contains(&new_image) {
            self.pull_set.push(new_image.clone());
        }

        let change = ContainerChange {
            index,
            container: container.name.clone(),
            previous_image,
            new_image,
            previous_version: reference.tag().to_string(),
            new_version: new_tag.to_string(),
        };

        self.plan.current_version = change.previous_version.clone();
        self.plan.new_version = change.new_version.clone();
        self.plan.changes.push(change.clone());
        change
    }

    /// Merge the pull-set into the workload annotations and snapshot the result.
    pub(crate) fn finish(mut self, workload: &mut Workload) -> (UpdatePlan, bool) {
        if self.plan.changes.is_empty() {
            return (self.plan, false);
        }

        let mut updated = workload.annotations.clone();
        for image in &self.pull_set {
            annotations::add_image_to_pull(&mut updated, image);
        }
        workload.annotations = updated;

        self.plan.workload = Some(workload.clone());
        (self.plan, true)
    }
}

/// Image string for `reference` moved to `tag`. The registry is dropped
/// for the default registry; other registries keep their hostname.
pub(crate) fn render_image(reference: &ImageReference, default_registry: &str, tag: &str) -> String {
    if reference.registry() == default_registry {
        format!("{}:{}", reference.short_name(), tag)
    } else {
        format!("{}:{}", reference.repository(), tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::DEFAULT_REGISTRY_HOSTNAME;
    use crate::types::Container;

    fn parse(image: &str) -> ImageReference {
        ImageReference::parse(image).expect("image")
    }

    #[test]
    fn default_registry_renders_short_name() {
        assert_eq!(
            render_image(&parse("nginx:1.20"), DEFAULT_REGISTRY_HOSTNAME, "1.21"),
            "nginx:1.21"
        );
        assert_eq!(
            render_image(
                &parse("docker.io/karolisr/keel:0.1"),
                DEFAULT_REGISTRY_HOSTNAME,
                "0.2"
            ),
            "karolisr/keel:0.2"
        );
    }

    #[test]
    fn other_registry_renders_full_repository() {
        assert_eq!(
            render_image(&parse("gcr.io/proj/svc:1"), DEFAULT_REGISTRY_HOSTNAME, "2"),
            "gcr.io/proj/svc:2"
        );
    }

    #[test]
    fn digest_pinned_image_loses_digest_on_rewrite() {
        let image = "nginx:1.20@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        assert_eq!(
            render_image(&parse(image), DEFAULT_REGISTRY_HOSTNAME, "1.21"),
            "nginx:1.21"
        );
    }

    #[test]
    fn finish_merges_pull_set_once() {
        let mut workload = Workload::new("web", "default")
            .with_annotation(annotations::UPDATE_IMAGE, "busybox:1")
            .with_container(Container::new("a", "nginx:1.20"))
            .with_container(Container::new("b", "nginx:1.19"));

        let mut builder = PlanBuilder::new(DEFAULT_REGISTRY_HOSTNAME);
        builder.apply(&mut workload, 0, &parse("nginx:1.20"), "1.21");
        builder.apply(&mut workload, 1, &parse("nginx:1.19"), "1.21");
        assert_eq!(workload.annotations[annotations::UPDATE_IMAGE], "busybox:1");

        let (plan, should_update) = builder.finish(&mut workload);
        assert!(should_update);
        assert_eq!(
            workload.annotations[annotations::UPDATE_IMAGE],
            "busybox:1,nginx:1.21"
        );
        assert_eq!(plan.current_version, "1.19");
        assert_eq!(plan.changes.len(), 2);
        assert_eq!(plan.workload.as_ref(), Some(&workload));
    }
}
