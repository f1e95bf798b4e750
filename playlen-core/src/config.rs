use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const DEFAULT_DIRECTORY_URL: &str =
    "https://api.invidious.io/instances.json?pretty=1&sort_by=type,users";
pub const DEFAULT_USER_AGENT: &str = concat!("playlen/", env!("CARGO_PKG_VERSION"));
/// Upper bound accepted for any configured timeout.
pub const MAX_TIMEOUT_SECONDS: f64 = 3600.0;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct PlaylenConfig {
    pub directory: DirectorySection,
    pub probe: ProbeSection,
    pub fetch: FetchSection,
    pub http: HttpSection,
}

impl PlaylenConfig {
    pub fn validate(&self) -> Result<()> {
        check_timeout("probe.timeout_seconds", self.probe.timeout_seconds)?;
        check_timeout("fetch.timeout_seconds", self.fetch.timeout_seconds)?;
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.directory.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "directory.url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn check_timeout(field: &'static str, seconds: f64) -> Result<()> {
    if seconds > 0.0 && seconds <= MAX_TIMEOUT_SECONDS {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        reason: format!("must be in (0, {MAX_TIMEOUT_SECONDS}] seconds, got {seconds}"),
    })
}

/// Out-of-range values clamp instead of panicking when a config skipped `validate`.
fn clamped_timeout(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds.min(MAX_TIMEOUT_SECONDS)).unwrap_or_default()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectorySection {
    pub url: String,
}

impl Default for DirectorySection {
    fn default() -> Self {
        Self {
            url: DEFAULT_DIRECTORY_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeSection {
    pub timeout_seconds: f64,
    pub connection_retries: u32,
}

impl ProbeSection {
    pub fn timeout(&self) -> Duration {
        clamped_timeout(self.timeout_seconds)
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            timeout_seconds: 0.4,
            connection_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_seconds: f64,
    pub concurrency: usize,
    /// Restricts item metadata lookups to this single mirror.
    pub pinned_mirror: Option<String>,
}

impl FetchSection {
    pub fn timeout(&self) -> Duration {
        clamped_timeout(self.timeout_seconds)
    }
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_seconds: 10.0,
            concurrency: 10,
            pinned_mirror: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSection {
    pub user_agent: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub fn load_playlen_config<P: AsRef<Path>>(path: P) -> Result<PlaylenConfig> {
    let config: PlaylenConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
