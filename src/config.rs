use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::WfGraphError;

const CANDIDATES: [&str; 4] = ["wfgraph.toml", "wfgraph.json", "wfgraph.yaml", "wfgraph.yml"];

/// Configuration file structure for wfgraph.
///
/// Every section is optional. Values given on the command line win over the
/// ones loaded here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub diagrams: DiagramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    /// Directory holding the workflow definitions
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Where the Markdown report is written
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Print the generation summary table after writing
    #[serde(default = "default_true")]
    pub show_summary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiagramConfig {
    /// Workflow files that also get a job dependency diagram
    #[serde(default = "default_dependency_diagrams")]
    pub dependency_diagrams: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            workflows_dir: default_workflows_dir(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            show_summary: true,
        }
    }
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            dependency_diagrams: default_dependency_diagrams(),
        }
    }
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from(".github/workflows")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("workflow-diagram.md")
}

fn default_true() -> bool {
    true
}

fn default_dependency_diagrams() -> Vec<String> {
    vec![
        "continuous-deployment.yml".to_string(),
        "sub-deploy-code-slot.yml".to_string(),
    ]
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./wfgraph.toml, ./wfgraph.json, ./wfgraph.yaml, ./wfgraph.yml
    /// 3. <user config dir>/wfgraph/config.toml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(WfGraphError::Config(format!(
                    "config file not found: {}",
                    path.display()
                ))
                .into());
            }
            return Self::load_from_path(path);
        }

        match discover(Path::new("."), dirs::config_dir().as_deref()) {
            Some(found) => {
                debug!("Using config file {}", found.display());
                Self::load_from_path(&found)
            }
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

/// First existing config file under `base`, then under the user config dir.
fn discover(base: &Path, user_config_dir: Option<&Path>) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| base.join(candidate))
        .chain(user_config_dir.map(|dir| dir.join("wfgraph").join("config.toml")))
        .find(|path| path.is_file())
}
