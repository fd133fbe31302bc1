//! `shipctl gate` - evaluate the approval gate without starting a workflow

use anyhow::{Context, Result};
use ship_core::{GateRequest, ShipConfig};
use ship_runtime::ApprovalGate;
use tracing::info;

pub async fn execute(
    config: &ShipConfig,
    blueprint: &str,
    environment: &str,
    automation_level: u8,
) -> Result<()> {
    let collaborators = ship_clients::from_config(&config.spec.services)?;
    let gate = ApprovalGate::new(config.spec.thresholds.clone(), &collaborators);

    let request = GateRequest::new(blueprint, environment, automation_level);
    let decision = gate.evaluate(&request).await;
    info!(
        blueprint,
        environment,
        approved = decision.approved,
        "Approval gate evaluated"
    );

    let json = serde_json::to_string_pretty(&decision).context("failed to render decision")?;
    println!("{}", json);
    Ok(())
}
