use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WfGraphError {
    #[error("Workflows directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid workflow definition {}: {reason}", path.display())]
    InvalidDefinition { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WfGraphError>;
