//! Rollplan dry-run entry point.
//!
//! Reads one planning request as JSON from the file named on the command
//! line (or stdin when none is given), runs the planner and prints the
//! outcome. Nothing is applied to a cluster.

use std::io::Read;

use log::{error, info};
use serde::Deserialize;

use rollplan::config::Config;
use rollplan::{Planner, Policy, RepositoryEvent, Workload};

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    policy: Policy,
    event: RepositoryEvent,
    workload: Workload,
}

fn read_request(path: Option<String>) -> anyhow::Result<Request> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("Invalid request: {}", e))
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting rollplan with config: {:?}", cfg);

    let Request {
        policy,
        event,
        mut workload,
    } = read_request(std::env::args().nth(1))?;

    let planner = Planner::new(cfg.planner());
    let outcome = match planner.plan(policy, &event, &mut workload) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Planning failed: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Plan for {}/{}: should_update={}, {} change(s), {} skipped",
        workload.namespace,
        workload.name,
        outcome.should_update,
        outcome.plan.changes.len(),
        outcome.skipped.len()
    );

    let rendered = if cfg.pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{}", rendered);

    Ok(())
}
