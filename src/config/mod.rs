pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{validate_path, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "kube-ship")]
#[command(about = "Build, test, scan and GitOps-promote container images")]
pub struct CliConfig {
    /// Path to the pipeline TOML file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: String,

    /// Branch being built (falls back to git)
    #[arg(long, env = "BRANCH_NAME")]
    pub branch: Option<String>,

    /// Commit sha being built (falls back to git)
    #[arg(long, env = "GIT_COMMIT")]
    pub commit: Option<String>,

    /// Commit message used for the skip check (falls back to git)
    #[arg(long)]
    pub message: Option<String>,

    /// Changed paths used for the skip check (falls back to git)
    #[arg(long, value_delimiter = ',')]
    pub changed: Option<Vec<String>>,

    /// Repository checkout the stages run in
    #[arg(long, default_value = ".")]
    pub workspace: String,

    /// Print the commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log resource usage after each stage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("config", &self.config)?;
        validate_path("workspace", &self.workspace)?;
        if let Some(report) = &self.report {
            validate_path("report", report)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_args() {
        let config = CliConfig::parse_from([
            "kube-ship",
            "--config",
            "ci/pipeline.toml",
            "--branch",
            "main",
            "--changed",
            "backend/app.py,README.md",
            "--dry-run",
        ]);
        assert_eq!(config.config, "ci/pipeline.toml");
        assert_eq!(config.branch.as_deref(), Some("main"));
        assert_eq!(
            config.changed,
            Some(vec!["backend/app.py".to_string(), "README.md".to_string()])
        );
        assert!(config.dry_run);
        assert_eq!(config.workspace, ".");
        assert!(config.validate().is_ok());
    }
}
