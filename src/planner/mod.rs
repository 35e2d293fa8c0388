//! Update planner.
//!
//! Decides which containers of a workload run the repository named by a
//! [`RepositoryEvent`], applies the gating annotations, and rewrites the
//! matching container images in place.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::annotations::{self, Gate};
use crate::error::{PlanError, Result};
use crate::reference::{ImageReference, DEFAULT_REGISTRY_HOSTNAME};
use crate::types::{PlanOutcome, Policy, RepositoryEvent, SkippedContainer, Workload};

mod builder;
mod clock;
mod matcher;

pub use clock::{FixedClock, SystemClock};

use builder::PlanBuilder;
use matcher::Decision;

/// Source of the timestamp written when a rollout is forced.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Settings the planner needs from its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Registry whose hostname is omitted when rendering new image strings.
    pub default_registry: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_registry: DEFAULT_REGISTRY_HOSTNAME.to_string(),
        }
    }
}

pub struct Planner<C = SystemClock> {
    config: PlannerConfig,
    clock: C,
}

impl Planner<SystemClock> {
    pub fn new(config: PlannerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for Planner<SystemClock> {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl<C: Clock> Planner<C> {
    pub fn with_clock(config: PlannerConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan the update of `workload` for `event`.
    ///
    /// The workload is mutated in place: matching container images are
    /// rewritten, the pull-set annotation is extended, and the template may
    /// be stamped with a rollout time. Containers whose image cannot be
    /// parsed are skipped and reported in [`PlanOutcome::skipped`]. The only
    /// error is an event that does not form a valid image reference, in
    /// which case the workload is left untouched.
    pub fn plan(
        &self,
        policy: Policy,
        event: &RepositoryEvent,
        workload: &mut Workload,
    ) -> Result<PlanOutcome> {
        let event_display = event.to_string();
        let event_ref = ImageReference::parse(&event_display).map_err(|source| {
            warn!("Failed to parse event image {}: {}", event_display, source);
            PlanError::EventReference {
                event: event_display.clone(),
                source,
            }
        })?;

        info!(
            "Checking workload {}/{} (policy: {}, labels: {:?}) for {}",
            workload.namespace, workload.name, policy, workload.labels, event_display
        );

        let gates = Gate::active(&workload.annotations);
        let mut builder = PlanBuilder::new(&self.config.default_registry);
        let mut skipped = Vec::new();

        for index in 0..workload.template.containers.len() {
            let container = &workload.template.containers[index];
            match matcher::match_container(container, &event_ref, &gates) {
                Decision::Skip(reason) => {
                    skipped.push(SkippedContainer {
                        index,
                        container: container.name.clone(),
                        image: container.image.clone(),
                        reason,
                    });
                }
                Decision::Update {
                    reference,
                    stamp_rollout,
                } => {
                    if stamp_rollout {
                        workload.template.annotations.insert(
                            annotations::TEMPLATE_TIME.to_string(),
                            self.clock.now().to_rfc3339(),
                        );
                    }

                    let change = builder.apply(workload, index, &reference, event_ref.tag());

                    if let Some(digest) = event.digest() {
                        // Digest annotations are not recorded until their format is settled.
                        debug!(
                            "Event for {} carries digest {}, not recorded",
                            reference.remote(),
                            digest
                        );
                    }

                    info!(
                        "Impacted container {} found in {}/{}: {} -> {} (policy: {})",
                        change.container,
                        workload.namespace,
                        workload.name,
                        change.previous_image,
                        change.new_image,
                        policy
                    );
                }
            }
        }

        let (plan, should_update) = builder.finish(workload);
        Ok(PlanOutcome {
            plan,
            should_update,
            skipped,
        })
    }
}

/// Plan with the default registry settings and the system clock.
pub fn plan(policy: Policy, event: &RepositoryEvent, workload: &mut Workload) -> Result<PlanOutcome> {
    Planner::default().plan(policy, event, workload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{FORCE_TAG_MATCH, POLL_SCHEDULE, TEMPLATE_TIME, UPDATE_IMAGE};
    use crate::types::{Container, SkipReason};
    use chrono::TimeZone;

    fn fixed_planner() -> Planner<FixedClock> {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        Planner::with_clock(PlannerConfig::default(), FixedClock(at))
    }

    fn web(images: &[&str]) -> Workload {
        images
            .iter()
            .enumerate()
            .fold(Workload::new("web", "default"), |w, (i, image)| {
                w.with_container(Container::new(format!("c{}", i), *image))
            })
    }

    #[test]
    fn unparsable_event_fails_without_touching_workload() {
        let mut workload = web(&["nginx:1.20"]);
        let before = workload.clone();

        let err = fixed_planner()
            .plan(Policy::All, &RepositoryEvent::new("Not A Repo", "1.0"), &mut workload)
            .expect_err("event must not parse");

        assert!(matches!(err, PlanError::EventReference { .. }));
        assert_eq!(workload, before);
    }

    #[test]
    fn no_match_returns_empty_plan() {
        let mut workload = web(&["redis:7"]);
        let outcome = fixed_planner()
            .plan(Policy::Minor, &RepositoryEvent::new("nginx", "1.21"), &mut workload)
            .expect("plan");

        assert!(!outcome.should_update);
        assert!(outcome.plan.is_empty());
        assert!(outcome.plan.workload.is_none());
        assert_eq!(outcome.plan.current_version, "");
        assert!(!workload.annotations.contains_key(UPDATE_IMAGE));
        assert_eq!(workload.containers()[0].image, "redis:7");
    }

    #[test]
    fn force_tag_match_stamps_template_with_clock_time() {
        let mut workload = web(&["nginx:1.21"]).with_annotation(FORCE_TAG_MATCH, "true");
        let outcome = fixed_planner()
            .plan(Policy::Force, &RepositoryEvent::new("nginx", "1.21"), &mut workload)
            .expect("plan");

        assert!(outcome.should_update);
        assert_eq!(
            workload.template.annotations[TEMPLATE_TIME],
            "2024-03-01T12:00:00+00:00"
        );
        assert_eq!(workload.containers()[0].image, "nginx:1.21");
    }

    #[test]
    fn poll_gate_is_checked_before_force_gate() {
        let mut workload = web(&["nginx:1.20"])
            .with_annotation(POLL_SCHEDULE, "@every 5m")
            .with_annotation(FORCE_TAG_MATCH, "true");
        let outcome = fixed_planner()
            .plan(Policy::All, &RepositoryEvent::new("nginx", "1.21"), &mut workload)
            .expect("plan");

        assert!(!outcome.should_update);
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::PollTagMismatch {
                tag: "1.20".to_string()
            }
        );
        assert!(workload.template.annotations.is_empty());
    }

    #[test]
    fn event_without_tag_targets_latest() {
        let mut workload = web(&["nginx"]);
        let outcome = fixed_planner()
            .plan(Policy::Force, &RepositoryEvent::new("nginx", ""), &mut workload)
            .expect("plan");

        assert!(outcome.should_update);
        assert_eq!(workload.containers()[0].image, "nginx:latest");
        assert_eq!(outcome.plan.current_version, "latest");
        assert_eq!(outcome.plan.new_version, "latest");
    }

    #[test]
    fn custom_default_registry_controls_short_rendering() {
        let planner = Planner::with_clock(
            PlannerConfig {
                default_registry: "registry.internal:5000".to_string(),
            },
            fixed_planner().clock,
        );
        let mut workload = web(&["registry.internal:5000/team/api:1.0", "nginx:1.0"]);

        planner
            .plan(
                Policy::Patch,
                &RepositoryEvent::new("team/api", "1.1").with_host("registry.internal:5000"),
                &mut workload,
            )
            .expect("plan");
        assert_eq!(workload.containers()[0].image, "team/api:1.1");

        planner
            .plan(Policy::Patch, &RepositoryEvent::new("nginx", "1.1"), &mut workload)
            .expect("plan");
        assert_eq!(workload.containers()[1].image, "index.docker.io/library/nginx:1.1");
    }
}
