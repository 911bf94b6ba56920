use crate::error::{CdError, Result};
use crate::guard::{DEFAULT_COOLDOWN_SECS, MAX_COOLDOWN_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RepositoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repo_url")]
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Directory the checkout is created in.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Checkout directory name, relative to `workspace`.
    #[serde(default = "default_checkout_dir")]
    pub checkout_dir: PathBuf,
}

fn default_repo_url() -> String {
    "git@github.com:eventifyio/eventify.git".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_checkout_dir() -> PathBuf {
    PathBuf::from("eventify")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: default_repo_url(),
            branch: default_branch(),
            remote: default_remote(),
            workspace: default_workspace(),
            checkout_dir: default_checkout_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// PackageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Distribution name, as it appears in `<name>-X.Y.Z.tar.gz`.
    #[serde(default = "default_package_name")]
    pub name: String,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: PathBuf,
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,
}

fn default_package_name() -> String {
    "eventify".to_string()
}

fn default_metadata_file() -> PathBuf {
    PathBuf::from("setup.py")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: default_package_name(),
            metadata_file: default_metadata_file(),
            dist_dir: default_dist_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_build")]
    pub build: Vec<String>,
    /// Distribution files are appended to this argv.
    #[serde(default = "default_publish")]
    pub publish: Vec<String>,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

fn default_build() -> Vec<String> {
    ["python", "setup.py", "sdist", "bdist_wheel"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_publish() -> Vec<String> {
    vec!["twine".to_string(), "upload".to_string()]
}

fn default_commit_message() -> String {
    "increment version".to_string()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            build: default_build(),
            publish: default_publish(),
            commit_message: default_commit_message(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("pypi.json")
}

fn default_cooldown_secs() -> i64 {
    DEFAULT_COOLDOWN_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: RepositoryConfig::default(),
            package: PackageConfig::default(),
            commands: CommandsConfig::default(),
            credentials_file: default_credentials_file(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CdError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if given, otherwise use the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn checkout_path(&self) -> PathBuf {
        self.repository
            .workspace
            .join(&self.repository.checkout_dir)
    }

    pub fn cooldown(&self) -> Result<chrono::Duration> {
        if !(0..=MAX_COOLDOWN_SECS).contains(&self.cooldown_secs) {
            return Err(CdError::InvalidCooldown(self.cooldown_secs));
        }
        chrono::Duration::try_seconds(self.cooldown_secs)
            .ok_or(CdError::InvalidCooldown(self.cooldown_secs))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.repository.url.trim().is_empty() {
            push(WarnLevel::Error, "repository.url is empty".to_string());
        }
        if self.repository.branch.trim().is_empty() {
            push(WarnLevel::Error, "repository.branch is empty".to_string());
        }
        if self.commands.build.is_empty() {
            push(WarnLevel::Error, "commands.build has no program".to_string());
        }
        if self.commands.publish.is_empty() {
            push(WarnLevel::Error, "commands.publish has no program".to_string());
        }
        if self.package.name.trim().is_empty() {
            push(WarnLevel::Error, "package.name is empty".to_string());
        }
        if self.cooldown_secs < 0 {
            push(
                WarnLevel::Error,
                format!("cooldown_secs is negative ({})", self.cooldown_secs),
            );
        } else if self.cooldown_secs > MAX_COOLDOWN_SECS {
            push(
                WarnLevel::Error,
                format!(
                    "cooldown_secs {} exceeds the maximum of {MAX_COOLDOWN_SECS}",
                    self.cooldown_secs
                ),
            );
        } else if self.cooldown_secs == 0 {
            push(
                WarnLevel::Warning,
                "cooldown_secs is 0: every trigger will deploy".to_string(),
            );
        }
        if self.repository.checkout_dir.is_absolute() {
            push(
                WarnLevel::Warning,
                format!(
                    "repository.checkout_dir '{}' is absolute and ignores repository.workspace",
                    self.repository.checkout_dir.display()
                ),
            );
        }
        if self.package.metadata_file.extension().and_then(|e| e.to_str()) != Some("py") {
            push(
                WarnLevel::Warning,
                format!(
                    "package.metadata_file '{}' is not a .py file",
                    self.package.metadata_file.display()
                ),
            );
        }

        warnings
    }
}
