//! read configuration from a file, the environment, or AWS Secrets Manager

use std::time::Duration;

use aws_config::BehaviorVersion;
use serde::Deserialize;

use crate::errors::Error;

pub const DEFAULT_REFRESH_PATH: &str = "/api/user/refresh";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_WAITER_TIMEOUT_SECS: u64 = 30;

pub enum ConfigLocation {
    File(String),
    Env,
    Secret,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `None` (or `0`) waits for an in-flight refresh indefinitely.
    #[serde(default = "default_waiter_timeout_secs")]
    pub waiter_timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_waiter_timeout_secs() -> Option<u64> {
    Some(DEFAULT_WAITER_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    format!("bearer-refresh/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    pub fn from_values(
        base_url: impl Into<String>,
        refresh_path: Option<String>,
        request_timeout_secs: Option<u64>,
        waiter_timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: refresh_path.unwrap_or_else(default_refresh_path),
            request_timeout_secs: request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            waiter_timeout_secs: match waiter_timeout_secs {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => default_waiter_timeout_secs(),
            },
            user_agent: default_user_agent(),
        }
    }

    pub fn from_file(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("AUTH_API_BASE_URL")
            .map_err(|_| Error::Config("Missing AUTH_API_BASE_URL env var".to_string()))?;
        let waiter_timeout_secs = match parse_env_u64("AUTH_WAITER_TIMEOUT_SECS")? {
            Some(0) => None,
            Some(secs) => Some(secs),
            None => default_waiter_timeout_secs(),
        };
        Ok(Self {
            base_url,
            refresh_path: std::env::var("AUTH_REFRESH_PATH")
                .unwrap_or_else(|_| default_refresh_path()),
            request_timeout_secs: parse_env_u64("AUTH_REQUEST_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            waiter_timeout_secs,
            user_agent: std::env::var("AUTH_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
        })
    }

    /// Base URL with a scheme and without a trailing slash.
    pub fn normalized_base_url(&self) -> Result<String, Error> {
        let base = if self.base_url.starts_with("http") {
            self.base_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.base_url.trim_end_matches('/'))
        };
        reqwest::Url::parse(&base)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", base, e)))?;
        Ok(base)
    }

    pub fn refresh_url(&self) -> Result<String, Error> {
        let base = self.normalized_base_url()?;
        if self.refresh_path.starts_with('/') {
            Ok(format!("{base}{}", self.refresh_path))
        } else {
            Ok(format!("{base}/{}", self.refresh_path))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn waiter_timeout(&self) -> Option<Duration> {
        self.waiter_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

pub async fn read_config(loc: ConfigLocation) -> Result<Config, Error> {
    let config = match loc {
        ConfigLocation::File(path) => Config::from_file(&path)?,
        ConfigLocation::Env => Config::from_env()?,
        ConfigLocation::Secret => read_config_from_secret().await?,
    };
    Ok(config)
}

fn parse_env_u64(name: &str) -> Result<Option<u64>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} must be a whole number of seconds"))),
        Err(_) => Ok(None),
    }
}

async fn read_config_from_secret() -> Result<Config, Error> {
    let secret_arn = std::env::var("AUTH_CONFIG_SECRET_ARN")
        .map_err(|_| Error::Config("Missing AUTH_CONFIG_SECRET_ARN env var".to_string()))?;
    let client = aws_sdk_secretsmanager::Client::new(
        &aws_config::load_defaults(BehaviorVersion::latest()).await,
    );
    let resp = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Config(format!("Failed to get secret: {}", e)))?;
    let secret = match resp.secret_string() {
        Some(s) => Ok(s),
        None => Err(Error::Config(
            "Failed to get secret string, returned None".to_string(),
        )),
    }?;
    let config: Config = serde_json::from_str(secret)?;
    Ok(config)
}
