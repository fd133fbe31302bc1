//! Shell completion scripts
//!
//! - shipctl completion bash > /etc/bash_completion.d/shipctl
//! - shipctl completion zsh > ~/.zsh/completion/_shipctl
//! - shipctl completion fish > ~/.config/fish/completions/shipctl.fish

use anyhow::Result;
use clap::{CommandFactory, ValueEnum};
use clap_complete::{generate, Shell as ClapShell};
use std::io;

use crate::cli::Cli;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
    Elvish,
}

impl Shell {
    /// Where the generated script is usually installed
    fn install_hint(self) -> &'static str {
        match self {
            Shell::Bash => "shipctl completion bash > /etc/bash_completion.d/shipctl",
            Shell::Zsh => "shipctl completion zsh > ~/.zsh/completion/_shipctl  (then run compinit)",
            Shell::Fish => "shipctl completion fish > ~/.config/fish/completions/shipctl.fish",
            Shell::Powershell => "shipctl completion powershell > shipctl.ps1  (dot-source it from $PROFILE)",
            Shell::Elvish => "shipctl completion elvish > ~/.elvish/lib/shipctl.elv",
        }
    }
}

impl From<Shell> for ClapShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => ClapShell::Bash,
            Shell::Zsh => ClapShell::Zsh,
            Shell::Fish => ClapShell::Fish,
            Shell::Powershell => ClapShell::PowerShell,
            Shell::Elvish => ClapShell::Elvish,
        }
    }
}

/// Write the completion script to stdout, install hint to stderr
pub fn execute(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(ClapShell::from(shell), &mut cmd, name, &mut io::stdout());

    eprintln!();
    eprintln!("# Install with:");
    eprintln!("#    {}", shell.install_hint());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_conversion() {
        assert!(matches!(ClapShell::from(Shell::Bash), ClapShell::Bash));
        assert!(matches!(ClapShell::from(Shell::Powershell), ClapShell::PowerShell));
    }

    #[test]
    fn test_generates_script_for_every_shell() {
        for shell in Shell::value_variants() {
            let mut cmd = Cli::command();
            let mut out = Vec::new();
            generate(ClapShell::from(*shell), &mut cmd, "shipctl", &mut out);
            let script = String::from_utf8(out).unwrap();
            assert!(script.contains("shipctl"), "{:?}", shell);
            assert!(shell.install_hint().starts_with("shipctl completion"));
        }
    }
}
