//! Plan stage: one free-text generation call before the edit loop.

use anyhow::{Context, Result};
use tracing::info;

use crate::io::generator::{GenerationService, PlanRequest};
use crate::io::plan_store::PlanStore;

/// Ask the service which files must change to reach `goal`.
///
/// The plan is advisory and is never parsed. It is persisted for inspection
/// and does not touch the conversation history.
pub fn generate_plan<G: GenerationService>(
    service: &G,
    store: &PlanStore,
    goal: &str,
) -> Result<String> {
    let plan = service
        .plan(&PlanRequest {
            goal: goal.to_string(),
        })
        .context("generate plan")?;
    store.write(&plan).context("persist plan")?;
    info!(plan_bytes = plan.len(), "plan generated");
    Ok(plan)
}
