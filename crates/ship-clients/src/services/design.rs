//! Blueprint and guardrail service clients

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use ship_core::{
    BlueprintRef, BlueprintService, GuardrailService, ShipResult, ValidationReport, Violation,
};

use crate::http::ServiceClient;

/// `POST /api/blueprints` on the blueprint service
#[derive(Debug, Clone)]
pub struct HttpBlueprintService {
    http: ServiceClient,
}

impl HttpBlueprintService {
    pub const SERVICE: &'static str = "blueprint-service";

    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            http: ServiceClient::new(Self::SERVICE, base_url, client),
        }
    }
}

#[async_trait]
impl BlueprintService for HttpBlueprintService {
    async fn generate(&self, requirements: &str, auto_fix: bool) -> ShipResult<BlueprintRef> {
        self.http
            .post_json(
                "/api/blueprints",
                &json!({ "requirements": requirements, "autoFix": auto_fix }),
            )
            .await
    }
}

/// Validation and remediation endpoints on the guardrails engine
#[derive(Debug, Clone)]
pub struct HttpGuardrailService {
    http: ServiceClient,
}

impl HttpGuardrailService {
    pub const SERVICE: &'static str = "guardrails-engine";

    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            http: ServiceClient::new(Self::SERVICE, base_url, client),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemediateRequest<'a> {
    blueprint_id: &'a str,
    violations: &'a [Violation],
}

#[async_trait]
impl GuardrailService for HttpGuardrailService {
    async fn validate(
        &self,
        blueprint_id: &str,
        auto_remediate: bool,
    ) -> ShipResult<ValidationReport> {
        self.http
            .post_json(
                "/api/guardrails/validate",
                &json!({ "blueprintId": blueprint_id, "autoRemediate": auto_remediate }),
            )
            .await
    }

    async fn remediate(&self, blueprint_id: &str, violations: &[Violation]) -> ShipResult<()> {
        self.http
            .post_ack(
                "/api/guardrails/remediate",
                &RemediateRequest {
                    blueprint_id,
                    violations,
                },
            )
            .await
    }
}
