use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::permissions::GrantPolicy;

pub const AUTH_API_KEY_ENV: &str = "COLORIZER_AUTH_API_KEY";
pub const MODEL_API_KEY_ENV: &str = "COLORIZER_MODEL_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("{0}")]
    Read(#[from] std::io::Error),
    #[error("{0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    pub storage_bucket: String,
    pub timeouts: Timeouts,
    pub pipeline: PipelineConfig,
    pub paths: Paths,
    pub permissions: PermissionsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            storage_bucket: "colorizer-app.appspot.com".to_string(),
            timeouts: Timeouts::default(),
            pipeline: PipelineConfig::default(),
            paths: Paths::default(),
            permissions: PermissionsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub identity: String,
    pub token: String,
    pub storage: String,
    pub database: String,
    pub colorize: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity: "https://identitytoolkit.googleapis.com".to_string(),
            token: "https://securetoken.googleapis.com".to_string(),
            storage: "https://firebasestorage.googleapis.com".to_string(),
            database: "https://colorizer-app-default-rtdb.firebaseio.com".to_string(),
            colorize: "https://api.deepai.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub http: Duration,
    #[serde(with = "humantime_serde")]
    pub colorize: Duration,
    #[serde(with = "humantime_serde")]
    pub connectivity: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http: Duration::from_secs(30),
            colorize: Duration::from_secs(120),
            connectivity: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub discard_staged_originals: bool,
    pub probe_host: String,
    pub probe_port: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            discard_staged_originals: true,
            probe_host: "firebasestorage.googleapis.com".to_string(),
            probe_port: 443,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub state_dir: Option<PathBuf>,
    pub documents_dir: Option<PathBuf>,
    pub gallery_dir: Option<PathBuf>,
}

impl Paths {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("colorizer")
        })
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.documents_dir.clone().unwrap_or_else(|| {
            dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir)
        })
    }

    pub fn gallery_dir(&self) -> PathBuf {
        self.gallery_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub camera: GrantPolicy,
    pub library: GrantPolicy,
}

/// Service credentials. Never read from the config file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub auth_api_key: Option<String>,
    pub model_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            auth_api_key: non_empty_env(AUTH_API_KEY_ENV),
            model_api_key: non_empty_env(MODEL_API_KEY_ENV),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("colorizer").join("config.toml"))
    }

    /// Explicit path, then the central config file if it exists, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::central_config_path() {
            Some(central) if central.is_file() => Self::from_file(&central),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage_bucket.trim().is_empty() {
            return Err("storage_bucket cannot be empty".to_string());
        }
        for (name, value) in [
            ("identity", &self.endpoints.identity),
            ("token", &self.endpoints.token),
            ("storage", &self.endpoints.storage),
            ("database", &self.endpoints.database),
            ("colorize", &self.endpoints.colorize),
        ] {
            Url::parse(value).map_err(|e| format!("endpoints.{name} is not a valid URL: {e}"))?;
        }
        for (name, value) in [
            ("http", self.timeouts.http),
            ("colorize", self.timeouts.colorize),
            ("connectivity", self.timeouts.connectivity),
        ] {
            if value.is_zero() {
                return Err(format!("timeouts.{name} must be greater than zero"));
            }
        }
        if self.pipeline.probe_host.trim().is_empty() {
            return Err("pipeline.probe_host cannot be empty".to_string());
        }
        Ok(())
    }
}
