use std::path::PathBuf;
use thiserror::Error;
use waypoint_core::GatewayError;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} in {path}: {message}")]
    Parse {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl From<ConfigFileError> for GatewayError {
    fn from(error: ConfigFileError) -> Self {
        GatewayError::Configuration {
            route_id: None,
            name: None,
            message: error.to_string(),
        }
    }
}
