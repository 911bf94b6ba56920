use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("credentials file not found: {}", .0.display())]
    CredentialsNotFound(PathBuf),

    #[error("invalid version '{0}': expected MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("cooldown_secs {0} is out of range")]
    InvalidCooldown(i64),

    #[error("no version assignment line found in metadata")]
    VersionLineMissing,

    #[error("no distribution files for version {version} in {}", .dir.display())]
    NoDistributions { version: String, dir: PathBuf },

    #[error("command not found: {0}")]
    ToolNotFound(String),

    #[error("step '{step}' could not be started: {message}")]
    StepSpawnFailed { step: String, message: String },

    #[error("step '{step}' failed with exit code {code}")]
    StepFailed { step: String, code: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CdError>;
