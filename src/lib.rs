//! Container image update planning.
//!
//! Given a notification that a new tag of an image exists and a snapshot
//! of a workload, work out which containers run that image, whether the
//! workload's gating annotations allow the update, and rewrite the
//! snapshot accordingly. The crate performs no I/O; applying the plan to a
//! cluster is left to the caller.

pub mod annotations;
pub mod config;
pub mod error;
pub mod planner;
pub mod reference;
pub mod types;

pub use error::{PlanError, ReferenceError};
pub use planner::{plan, Clock, FixedClock, Planner, PlannerConfig, SystemClock};
pub use reference::ImageReference;
pub use types::{
    Container, ContainerChange, PlanOutcome, PodTemplate, Policy, RepositoryEvent, SkipReason,
    SkippedContainer, UpdatePlan, Workload,
};
