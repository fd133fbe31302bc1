//! Risk and cost assessment clients

use async_trait::async_trait;
use serde_json::json;
use ship_core::{CostEstimate, CostService, RiskAssessment, RiskEngine, ShipResult};

use crate::http::ServiceClient;

#[derive(Debug, Clone)]
pub struct HttpRiskEngine {
    http: ServiceClient,
}

impl HttpRiskEngine {
    pub const SERVICE: &'static str = "risk-engine";

    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            http: ServiceClient::new(Self::SERVICE, base_url, client),
        }
    }
}

#[async_trait]
impl RiskEngine for HttpRiskEngine {
    async fn assess(&self, blueprint_id: &str, environment: &str) -> ShipResult<RiskAssessment> {
        self.http
            .post_json(
                "/api/risk/assess",
                &json!({ "blueprintId": blueprint_id, "environment": environment }),
            )
            .await
    }
}

#[derive(Debug, Clone)]
pub struct HttpCostService {
    http: ServiceClient,
}

impl HttpCostService {
    pub const SERVICE: &'static str = "costing-service";

    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            http: ServiceClient::new(Self::SERVICE, base_url, client),
        }
    }
}

#[async_trait]
impl CostService for HttpCostService {
    async fn estimate(&self, blueprint_id: &str) -> ShipResult<CostEstimate> {
        self.http
            .post_json("/api/estimates", &json!({ "blueprintId": blueprint_id }))
            .await
    }
}
