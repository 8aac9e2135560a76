//! Application configuration module
//!
//! Loads settings once at startup from environment variables (and `.env`).
//! Nothing below `main` reads the environment; each component receives the
//! slice of settings it needs.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Which change-request store backs the proposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    GitHub,
    Memory,
}

/// GitHub repository holding the proposal pull requests
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub token: String,
}

/// Voting rules, handed to every proposal service and sweep
#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    pub target_branch: String,
    pub branch_prefix: String,
    pub file_extension: String,
    pub voting_window_days: i64,
    pub minimum_votes: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            target_branch: "main".to_string(),
            branch_prefix: "proposal-".to_string(),
            file_extension: ".md".to_string(),
            voting_window_days: 7,
            minimum_votes: 1,
        }
    }
}

/// Identity registry location
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// JSON file with `[{signature, name, status}]`
    pub registry_path: Option<PathBuf>,
}

/// Periodic sweep settings
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Pause between store-mutating calls
    pub pause_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 86_400,
            pause_ms: 1_000,
        }
    }
}

/// Sweep summary notifications
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub destination: Option<String>,
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub store: StoreBackend,
    pub github: Option<GitHubConfig>,
    pub voting: VotingConfig,
    pub identity: IdentityConfig,
    pub sweep: SweepConfig,
    pub notify: NotifyConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            store: StoreBackend::Memory,
            github: None,
            voting: VotingConfig::default(),
            identity: IdentityConfig {
                registry_path: None,
            },
            sweep: SweepConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parsed = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server = ServerConfig {
            host: parse_or(&get, "HOST", ServerConfig::default().host)?,
            port: parse_or(&get, "PORT", ServerConfig::default().port)?,
        };

        let cors = CorsConfig {
            allowed_origins: parsed("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let store = match parsed("STORE_BACKEND").as_deref() {
            None | Some("github") => StoreBackend::GitHub,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "STORE_BACKEND must be 'github' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let github = match store {
            StoreBackend::GitHub => Some(Self::github_config(&parsed)?),
            StoreBackend::Memory => None,
        };

        let defaults = VotingConfig::default();
        let voting = VotingConfig {
            target_branch: parsed("TARGET_BRANCH").unwrap_or(defaults.target_branch),
            branch_prefix: parsed("BRANCH_PREFIX").unwrap_or(defaults.branch_prefix),
            file_extension: parsed("PROPOSAL_FILE_EXTENSION").unwrap_or(defaults.file_extension),
            voting_window_days: parse_or(&get, "VOTING_WINDOW_DAYS", defaults.voting_window_days)?,
            minimum_votes: parse_or(&get, "MINIMUM_VOTES", defaults.minimum_votes)?,
        };
        if voting.voting_window_days < 0 {
            return Err(ConfigError::InvalidValue(
                "VOTING_WINDOW_DAYS must not be negative".to_string(),
            ));
        }

        let identity = IdentityConfig {
            registry_path: parsed("IDENTITY_REGISTRY_PATH").map(PathBuf::from),
        };

        let sweep_defaults = SweepConfig::default();
        let sweep = SweepConfig {
            enabled: parse_or(&get, "SWEEP_ENABLED", sweep_defaults.enabled)?,
            interval_secs: parse_or(&get, "SWEEP_INTERVAL_SECS", sweep_defaults.interval_secs)?,
            pause_ms: parse_or(&get, "SWEEP_PAUSE_MS", sweep_defaults.pause_ms)?,
        };
        if sweep.interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let notify = NotifyConfig {
            enabled: parse_or(&get, "NOTIFY_ENABLED", false)?,
            destination: parsed("NOTIFY_DESTINATION"),
        };
        if notify.enabled {
            let destination = notify
                .destination
                .as_deref()
                .ok_or_else(|| ConfigError::MissingVar("NOTIFY_DESTINATION".to_string()))?;
            url::Url::parse(destination).map_err(|_| {
                ConfigError::InvalidValue(format!("NOTIFY_DESTINATION is not a URL: {}", destination))
            })?;
        }

        Ok(Self {
            server,
            cors,
            store,
            github,
            voting,
            identity,
            sweep,
            notify,
        })
    }

    fn github_config(
        parsed: &impl Fn(&str) -> Option<String>,
    ) -> Result<GitHubConfig, ConfigError> {
        let api_url = parsed("GITHUB_API_URL")
            .unwrap_or_else(|| "https://api.github.com".to_string());
        url::Url::parse(&api_url)
            .map_err(|_| ConfigError::InvalidValue(format!("GITHUB_API_URL is not a URL: {}", api_url)))?;

        let repository = parsed("GITHUB_REPOSITORY")
            .ok_or_else(|| ConfigError::MissingVar("GITHUB_REPOSITORY".to_string()))?;
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "GITHUB_REPOSITORY must look like owner/repo, got '{}'",
                    repository
                ))
            })?;

        let token = parsed("GITHUB_TOKEN")
            .ok_or_else(|| ConfigError::MissingVar("GITHUB_TOKEN".to_string()))?;

        Ok(GitHubConfig {
            api_url,
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={} could not be parsed", key, raw))),
        None => Ok(default),
    }
}
