use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;

/// shipctl - drive infrastructure from requirements to verified deployment
#[derive(Parser, Debug)]
#[command(name = "shipctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Orchestrator config file (apiVersion: ship.dev/v1, kind: OrchestratorConfig)
    ///
    /// Without a file the built-in defaults are used. Service URLs can still
    /// be overridden through the *_URL environment variables.
    #[arg(long, short = 'c', global = true, env = "SHIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator behind an HTTP API
    Serve {
        /// Host to bind to (overrides spec.server.host)
        #[arg(long, env = "SHIP_HOST")]
        host: Option<String>,

        /// Port to listen on (overrides spec.server.port)
        #[arg(short, long, env = "SHIP_PORT")]
        port: Option<u16>,
    },

    /// Evaluate the approval gate once and print the decision
    Gate {
        /// Blueprint to evaluate
        #[arg(long, short = 'b')]
        blueprint: String,

        /// Target environment
        #[arg(long, short = 'e', default_value = "dev")]
        environment: String,

        /// Automation level of the hypothetical workflow
        #[arg(long, short = 'l', default_value_t = 2)]
        automation_level: u8,
    },

    /// Print the effective configuration as YAML
    Config,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: commands::completion::Shell,
    },
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Serve { host, port } => {
                let config = commands::config::load(self.config.as_deref())?;
                commands::serve::execute(config, host.as_deref(), port).await
            }
            Commands::Gate {
                blueprint,
                environment,
                automation_level,
            } => {
                let config = commands::config::load(self.config.as_deref())?;
                commands::gate::execute(&config, &blueprint, &environment, automation_level).await
            }
            Commands::Config => {
                let config = commands::config::load(self.config.as_deref())?;
                commands::config::execute(&config)
            }
            Commands::Completion { shell } => commands::completion::execute(shell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_gate() {
        let cli = Cli::try_parse_from([
            "shipctl",
            "gate",
            "--blueprint",
            "bp-42",
            "-e",
            "prod",
            "--automation-level",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Gate {
                blueprint,
                environment,
                automation_level,
            } => {
                assert_eq!(blueprint, "bp-42");
                assert_eq!(environment, "prod");
                assert_eq!(automation_level, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_gate_defaults() {
        let cli = Cli::try_parse_from(["shipctl", "gate", "-b", "bp-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Gate { ref environment, automation_level: 2, .. } if environment == "dev"
        ));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli =
            Cli::try_parse_from(["shipctl", "serve", "--port", "9090", "-c", "ship.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ship.yaml")));
        assert!(matches!(cli.command, Commands::Serve { port: Some(9090), .. }));
    }

    #[test]
    fn test_gate_requires_blueprint() {
        assert!(Cli::try_parse_from(["shipctl", "gate"]).is_err());
    }
}
