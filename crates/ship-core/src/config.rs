//! Orchestrator configuration
//!
//! Loaded from a YAML document in the usual `apiVersion/kind/metadata/spec`
//! shape. Every field has a default, so an empty `spec: {}` is a valid config.
//!
//! ```yaml
//! apiVersion: ship.dev/v1
//! kind: OrchestratorConfig
//! metadata:
//!   name: platform-prod
//! spec:
//!   thresholds:
//!     design: { minSecurity: 85, maxRisk: 30, maxComplexity: 70 }
//!     deployment:
//!       prod: { minSecurity: 95, maxRisk: 10 }
//!   services:
//!     provisioning: http://orchestrator-service:3004
//!   runtime:
//!     maxConcurrentWorkflows: 16
//!     store: { type: file, path: /var/lib/ship/workflows.json }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{ShipError, ShipResult};

pub const API_VERSION: &str = "ship.dev/v1";
pub const CONFIG_KIND: &str = "OrchestratorConfig";

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: ShipSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    CONFIG_KIND.to_string()
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ConfigMetadata::default(),
            spec: ShipSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipSpec {
    #[serde(default)]
    pub thresholds: ApprovalThresholds,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

// ============================================================================
// Approval thresholds
// ============================================================================

/// Numeric limits applied by the approval gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalThresholds {
    /// Design-time limits, applied in every environment
    #[serde(default)]
    pub design: DesignThresholds,

    /// Per-environment deployment limits; environments without an entry
    /// skip the environment check
    #[serde(default = "default_deployment_thresholds")]
    pub deployment: BTreeMap<String, EnvironmentThresholds>,
}

impl Default for ApprovalThresholds {
    fn default() -> Self {
        Self {
            design: DesignThresholds::default(),
            deployment: default_deployment_thresholds(),
        }
    }
}

impl ApprovalThresholds {
    pub fn for_environment(&self, environment: &str) -> Option<&EnvironmentThresholds> {
        self.deployment.get(environment)
    }

    pub fn validate(&self) -> ShipResult<()> {
        let d = &self.design;
        check_score("design.minSecurity", d.min_security)?;
        check_score("design.maxRisk", d.max_risk)?;
        check_score("design.maxComplexity", d.max_complexity)?;
        for (env, t) in &self.deployment {
            check_score(&format!("deployment.{}.minSecurity", env), t.min_security)?;
            check_score(&format!("deployment.{}.maxRisk", env), t.max_risk)?;
        }
        Ok(())
    }
}

fn check_score(field: &str, value: f64) -> ShipResult<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ShipError::config(format!(
            "threshold {} must be within 0-100, got {}",
            field, value
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignThresholds {
    #[serde(default = "default_design_min_security")]
    pub min_security: f64,
    /// Carried for blueprint review tooling; deployment risk is judged by the
    /// environment table
    #[serde(default = "default_design_max_risk")]
    pub max_risk: f64,
    #[serde(default = "default_design_max_complexity")]
    pub max_complexity: f64,
}

fn default_design_min_security() -> f64 {
    85.0
}

fn default_design_max_risk() -> f64 {
    30.0
}

fn default_design_max_complexity() -> f64 {
    70.0
}

impl Default for DesignThresholds {
    fn default() -> Self {
        Self {
            min_security: default_design_min_security(),
            max_risk: default_design_max_risk(),
            max_complexity: default_design_max_complexity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentThresholds {
    pub min_security: f64,
    pub max_risk: f64,
}

impl EnvironmentThresholds {
    pub const fn new(min_security: f64, max_risk: f64) -> Self {
        Self {
            min_security,
            max_risk,
        }
    }
}

fn default_deployment_thresholds() -> BTreeMap<String, EnvironmentThresholds> {
    BTreeMap::from([
        ("dev".to_string(), EnvironmentThresholds::new(70.0, 50.0)),
        ("staging".to_string(), EnvironmentThresholds::new(80.0, 30.0)),
        ("prod".to_string(), EnvironmentThresholds::new(90.0, 20.0)),
    ])
}

// ============================================================================
// Collaborator endpoints
// ============================================================================

/// Base URLs of the remote collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    #[serde(default = "default_blueprint_url")]
    pub blueprint: String,

    #[serde(default = "default_guardrails_url")]
    pub guardrails: String,

    #[serde(default = "default_risk_url")]
    pub risk: String,

    #[serde(default = "default_costing_url")]
    pub costing: String,

    #[serde(default = "default_iac_url")]
    pub iac_generator: String,

    #[serde(default = "default_provisioning_url")]
    pub provisioning: String,

    /// Per-request timeout applied by the HTTP clients
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_blueprint_url() -> String {
    "http://blueprint-service:3001".to_string()
}

fn default_iac_url() -> String {
    "http://iac-generator:3002".to_string()
}

fn default_guardrails_url() -> String {
    "http://guardrails-engine:3003".to_string()
}

fn default_provisioning_url() -> String {
    "http://orchestrator-service:3004".to_string()
}

fn default_costing_url() -> String {
    "http://costing-service:3005".to_string()
}

fn default_risk_url() -> String {
    "http://ai-engine:3008".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            blueprint: default_blueprint_url(),
            guardrails: default_guardrails_url(),
            risk: default_risk_url(),
            costing: default_costing_url(),
            iac_generator: default_iac_url(),
            provisioning: default_provisioning_url(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl ServicesConfig {
    /// Environment variables that override each endpoint
    pub const ENV_OVERRIDES: [&'static str; 6] = [
        "BLUEPRINT_SERVICE_URL",
        "GUARDRAILS_SERVICE_URL",
        "RISK_ENGINE_URL",
        "COSTING_SERVICE_URL",
        "IAC_GENERATOR_URL",
        "PROVISIONING_SERVICE_URL",
    ];

    /// Replace endpoints with values returned by `lookup` (usually the process env)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let slots: [&mut String; 6] = [
            &mut self.blueprint,
            &mut self.guardrails,
            &mut self.risk,
            &mut self.costing,
            &mut self.iac_generator,
            &mut self.provisioning,
        ];
        for (slot, var) in slots.into_iter().zip(Self::ENV_OVERRIDES) {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }

    pub fn validate(&self) -> ShipResult<()> {
        let endpoints = [
            ("blueprint", &self.blueprint),
            ("guardrails", &self.guardrails),
            ("risk", &self.risk),
            ("costing", &self.costing),
            ("iacGenerator", &self.iac_generator),
            ("provisioning", &self.provisioning),
        ];
        for (name, url) in endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ShipError::config(format!(
                    "services.{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ShipError::config("services.timeoutSecs must be greater than 0"));
        }
        Ok(())
    }
}

// ============================================================================
// Server and runtime
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Upper bound on concurrently executing pipelines (unset = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_workflows: Option<usize>,

    /// How long shutdown waits for in-flight pipelines
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: None,
            shutdown_timeout_secs: default_shutdown_timeout(),
            store: StoreConfig::default(),
        }
    }
}

/// Which workflow store backend to open
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Ephemeral, lost on restart
    #[default]
    Memory,
    /// JSON file rewritten after every mutation
    File { path: PathBuf },
}

// ============================================================================
// Loading
// ============================================================================

impl ShipConfig {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> ShipResult<Self> {
        let config: ShipConfig = serde_yaml::from_str(content)
            .map_err(|e| ShipError::config(format!("failed to parse config YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ShipResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShipError::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Apply `*_URL` environment overrides to the service endpoints
    pub fn with_env_overrides(mut self) -> Self {
        self.spec.services.apply_overrides(|var| std::env::var(var).ok());
        self
    }

    pub fn validate(&self) -> ShipResult<()> {
        if self.api_version != API_VERSION {
            return Err(ShipError::config(format!(
                "unsupported apiVersion '{}', expected '{}'",
                self.api_version, API_VERSION
            )));
        }
        if self.kind != CONFIG_KIND {
            return Err(ShipError::config(format!(
                "unsupported kind '{}', expected '{}'",
                self.kind, CONFIG_KIND
            )));
        }
        self.spec.thresholds.validate()?;
        self.spec.services.validate()?;
        if self.spec.runtime.max_concurrent_workflows == Some(0) {
            return Err(ShipError::config(
                "runtime.maxConcurrentWorkflows must be greater than 0",
            ));
        }
        Ok(())
    }
}
