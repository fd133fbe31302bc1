//! Config loading shared by every subcommand, and `shipctl config`

use std::path::Path;

use anyhow::{Context, Result};
use ship_core::ShipConfig;
use tracing::debug;

/// Read the config file (or take the defaults), then apply `*_URL` overrides
pub fn load(path: Option<&Path>) -> Result<ShipConfig> {
    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            ShipConfig::from_file(path)?
        }
        None => ShipConfig::default(),
    };

    let config = config.with_env_overrides();
    // Overrides bypass the parse-time checks
    config
        .validate()
        .context("configuration invalid after applying environment overrides")?;
    Ok(config)
}

/// Print the effective configuration
pub fn execute(config: &ShipConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("failed to render configuration")?;
    print!("{}", yaml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ship_core::StoreConfig;
    use std::io::Write;

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"apiVersion: ship.dev/v1
kind: OrchestratorConfig
metadata:
  name: edge
spec:
  server:
    port: 9400
  runtime:
    maxConcurrentWorkflows: 4
    store:
      type: file
      path: /var/lib/ship/workflows.json
"#
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.metadata.name.as_deref(), Some("edge"));
        assert_eq!(config.spec.server.port, 9400);
        assert_eq!(config.spec.runtime.max_concurrent_workflows, Some(4));
        assert!(matches!(config.spec.runtime.store, StoreConfig::File { .. }));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_effective_config_round_trips() {
        let config = ShipConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = ShipConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.spec.thresholds, config.spec.thresholds);
        assert_eq!(parsed.spec.services, config.spec.services);
    }
}
