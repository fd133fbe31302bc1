//! Ship Clients - HTTP implementations of the collaborator traits
//!
//! ## Services
//!
//! | Client | Default endpoint | Calls |
//! |--------|------------------|-------|
//! | `HttpBlueprintService` | blueprint-service:3001 | `POST /api/blueprints` |
//! | `HttpGuardrailService` | guardrails-engine:3003 | `POST /api/guardrails/{validate,remediate}` |
//! | `HttpRiskEngine` | ai-engine:3008 | `POST /api/risk/assess` |
//! | `HttpCostService` | costing-service:3005 | `POST /api/estimates` |
//! | `HttpIacGenerator` | iac-generator:3002 | `POST /api/generate` |
//! | `HttpProvisioner` | orchestrator-service:3004 | `/api/deployments` (deploy, verify, rollback, history) |

pub mod http;
pub mod services;

use ship_core::{Collaborators, ServicesConfig, ShipResult};
use std::sync::Arc;
use std::time::Duration;

pub use http::{create_http_client, ServiceClient};
pub use services::{
    HttpBlueprintService, HttpCostService, HttpGuardrailService, HttpIacGenerator,
    HttpProvisioner, HttpRiskEngine,
};

/// Build HTTP-backed collaborators for every configured endpoint
pub fn from_config(config: &ServicesConfig) -> ShipResult<Collaborators> {
    let client = create_http_client(Duration::from_secs(config.timeout_secs))?;
    let provisioner = Arc::new(HttpProvisioner::new(&config.provisioning, client.clone()));

    Ok(Collaborators {
        blueprints: Arc::new(HttpBlueprintService::new(&config.blueprint, client.clone())),
        guardrails: Arc::new(HttpGuardrailService::new(&config.guardrails, client.clone())),
        risk: Arc::new(HttpRiskEngine::new(&config.risk, client.clone())),
        costing: Arc::new(HttpCostService::new(&config.costing, client.clone())),
        staging: provisioner.clone(),
        iac: Arc::new(HttpIacGenerator::new(&config.iac_generator, client)),
        provisioner,
    })
}
