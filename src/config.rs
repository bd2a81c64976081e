use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Represents the complete configuration for relbot.
///
/// Covers branch roles, the tracked version marker, retry behavior and the
/// host endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub branches: BranchesConfig,

    #[serde(default)]
    pub marker: MarkerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default = "default_bump_message")]
    pub bump_message: String,
}

fn default_release_branch() -> String {
    "main".to_string()
}

fn default_stable_branch() -> String {
    "release".to_string()
}

/// Branch roles: `release` is the branch whose builds may trigger releases,
/// `stable` always tracks the latest released commit.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BranchesConfig {
    #[serde(default = "default_release_branch")]
    pub release: String,

    #[serde(default = "default_stable_branch")]
    pub stable: String,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        BranchesConfig {
            release: default_release_branch(),
            stable: default_stable_branch(),
        }
    }
}

fn default_marker_path() -> String {
    "Cargo.toml".to_string()
}

fn default_marker_key() -> String {
    "version".to_string()
}

/// Location of the version marker inside the repository tree.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MarkerConfig {
    #[serde(default = "default_marker_path")]
    pub path: String,

    #[serde(default = "default_marker_key")]
    pub key: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig {
            path: default_marker_path(),
            key: default_marker_key(),
        }
    }
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

/// Bounded backoff applied to host requests.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.base_delay_ms))
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_upload_url() -> String {
    "https://uploads.github.com".to_string()
}

/// Host endpoint settings. `repo` may be supplied here, on the command line,
/// or through the environment.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    #[serde(default)]
    pub repo: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: default_api_url(),
            upload_url: default_upload_url(),
            repo: None,
        }
    }
}

fn default_bump_message() -> String {
    "Bump version to {version}".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            branches: BranchesConfig::default(),
            marker: MarkerConfig::default(),
            retry: RetryConfig::default(),
            github: GithubConfig::default(),
            bump_message: default_bump_message(),
        }
    }
}

impl Config {
    /// Commit message for the version-bump commit
    pub fn bump_commit_message(&self, version: &Version) -> String {
        self.bump_message.replace("{version}", &version.to_string())
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `relbot.toml` in current directory
/// 3. `relbot.toml` in the user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./relbot.toml").exists() {
        fs::read_to_string("./relbot.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("relbot.toml");
        if path.exists() {
            fs::read_to_string(path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    toml::from_str(&config_str)
        .map_err(|e| ReleaseError::config(format!("failed to parse configuration: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.branches.release, "main");
        assert_eq!(config.branches.stable, "release");
        assert_eq!(config.marker.path, "Cargo.toml");
        assert_eq!(config.marker.key, "version");
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert!(config.github.repo.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [branches]
            release = "trunk"
            "#,
        )
        .unwrap();
        assert_eq!(config.branches.release, "trunk");
        assert_eq!(config.branches.stable, "release");
        assert_eq!(config.marker.path, "Cargo.toml");
    }

    #[test]
    fn test_full_toml() {
        let config: Config = toml::from_str(
            r#"
            bump_message = "chore: release {version}"

            [branches]
            release = "main"
            stable = "stable"

            [marker]
            path = "app.toml"
            key = "app_version"

            [retry]
            attempts = 5
            base_delay_ms = 100

            [github]
            api_url = "https://github.example.test/api/v3"
            repo = "acme/widget"
            "#,
        )
        .unwrap();
        assert_eq!(config.branches.stable, "stable");
        assert_eq!(config.marker.key, "app_version");
        assert_eq!(config.retry.policy().attempts, 5);
        assert_eq!(config.github.repo.as_deref(), Some("acme/widget"));
        assert_eq!(
            config.bump_commit_message(&Version::new(1, 2, 3)),
            "chore: release 1.2.3"
        );
    }

    #[test]
    fn test_bump_commit_message_default() {
        let config = Config::default();
        assert_eq!(
            config.bump_commit_message(&Version::new(0, 4, 0)),
            "Bump version to 0.4.0"
        );
    }
}
