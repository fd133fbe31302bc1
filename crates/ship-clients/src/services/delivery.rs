//! IaC generation and provisioning clients

use async_trait::async_trait;
use serde_json::{json, Value};
use ship_core::{
    DeploymentRef, IacGenerator, IacJob, Provisioner, ShipResult, StagingLookup,
    VerificationReport,
};

use crate::http::ServiceClient;

#[derive(Debug, Clone)]
pub struct HttpIacGenerator {
    http: ServiceClient,
}

impl HttpIacGenerator {
    pub const SERVICE: &'static str = "iac-generator";

    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            http: ServiceClient::new(Self::SERVICE, base_url, client),
        }
    }
}

#[async_trait]
impl IacGenerator for HttpIacGenerator {
    async fn generate(&self, blueprint_id: &str) -> ShipResult<IacJob> {
        self.http
            .post_json("/api/generate", &json!({ "blueprintId": blueprint_id }))
            .await
    }
}

/// Deployment lifecycle on the provisioning service
///
/// Also answers the staging-history lookup, since deployment records live
/// on the same service.
#[derive(Debug, Clone)]
pub struct HttpProvisioner {
    http: ServiceClient,
}

impl HttpProvisioner {
    pub const SERVICE: &'static str = "provisioning-service";

    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            http: ServiceClient::new(Self::SERVICE, base_url, client),
        }
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn deploy(&self, iac_job_id: &str, auto_approve: bool) -> ShipResult<DeploymentRef> {
        let created: Value = self
            .http
            .post_json(
                "/api/deployments",
                &json!({ "generationJobId": iac_job_id, "autoApprove": auto_approve }),
            )
            .await?;
        let deployment_id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ship_core::ShipError::collaborator(Self::SERVICE, "deployment response has no id")
            })?;
        Ok(DeploymentRef {
            deployment_id: deployment_id.to_string(),
        })
    }

    async fn verify(&self, deployment_id: &str) -> ShipResult<VerificationReport> {
        self.http
            .post_empty(&format!("/api/deployments/{}/verify", deployment_id))
            .await
    }

    async fn rollback(&self, deployment_id: &str, reason: &str) -> ShipResult<()> {
        self.http
            .post_ack(
                &format!("/api/deployments/{}/rollback", deployment_id),
                &json!({ "reason": reason }),
            )
            .await
    }
}

#[async_trait]
impl StagingLookup for HttpProvisioner {
    async fn has_successful_staging(&self, blueprint_id: &str) -> ShipResult<bool> {
        let found: Value = self
            .http
            .get_json(
                "/api/deployments",
                &[
                    ("blueprintId", blueprint_id),
                    ("environment", "staging"),
                    ("status", "completed"),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(has_records(&found))
    }
}

// Accept a bare array or a `{ deployments | data | items: [...] }` envelope.
fn has_records(body: &Value) -> bool {
    if let Some(items) = body.as_array() {
        return !items.is_empty();
    }
    ["deployments", "data", "items"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_array))
        .any(|items| !items.is_empty())
}
