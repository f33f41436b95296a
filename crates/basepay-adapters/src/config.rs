use std::str::FromStr;

use thiserror::Error;

use basepay_core::{ConnectorParameters, PreferenceInput};

pub const ENV_RUNTIME_PROFILE: &str = "BASEPAY_RUNTIME_PROFILE";
pub const ENV_APP_NAME: &str = "BASEPAY_APP_NAME";
pub const ENV_APP_LOGO_URL: &str = "BASEPAY_APP_LOGO_URL";
pub const ENV_PREFERENCE: &str = "BASEPAY_PREFERENCE";
pub const ENV_EIP1193_PROXY_URL: &str = "BASEPAY_EIP1193_PROXY_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "BASEPAY_REQUEST_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown runtime profile {0:?}; expected development or production")]
    UnknownProfile(String),
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} is not a valid preference: {reason}")]
    InvalidPreference { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl FromStr for RuntimeProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::UnknownProfile(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    pub runtime_profile: RuntimeProfile,
    pub app_name: String,
    pub app_logo_url: Option<String>,
    pub preference: Option<PreferenceInput>,
    pub eip1193_proxy_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            app_name: "Base Pay SDK".to_owned(),
            app_logo_url: None,
            preference: None,
            eip1193_proxy_url: None,
            request_timeout_ms: 15_000,
        }
    }
}

impl ConnectorConfig {
    /// Reads `BASEPAY_*` variables. Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = read(ENV_RUNTIME_PROFILE) {
            match raw.parse() {
                Ok(profile) => cfg.runtime_profile = profile,
                Err(e) => tracing::warn!(error = %e, "ignoring {ENV_RUNTIME_PROFILE}"),
            }
        }
        if let Some(name) = read(ENV_APP_NAME) {
            cfg.app_name = name;
        }
        cfg.app_logo_url = read(ENV_APP_LOGO_URL);
        if let Some(raw) = read(ENV_PREFERENCE) {
            match parse_preference(&raw) {
                Ok(preference) => cfg.preference = Some(preference),
                Err(e) => tracing::warn!(error = %e, "ignoring {ENV_PREFERENCE}"),
            }
        }
        cfg.eip1193_proxy_url = read(ENV_EIP1193_PROXY_URL);
        if let Some(raw) = read(ENV_REQUEST_TIMEOUT_MS) {
            match parse_timeout(&raw) {
                Ok(ms) => cfg.request_timeout_ms = ms,
                Err(e) => tracing::warn!(error = %e, "ignoring {ENV_REQUEST_TIMEOUT_MS}"),
            }
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn connector_parameters(&self) -> ConnectorParameters {
        ConnectorParameters {
            app_name: self.app_name.clone(),
            app_logo_url: self.app_logo_url.clone(),
            preference: self.preference.clone(),
        }
    }
}

/// A value that looks like a JSON object is a structured preference; anything else is an option string.
pub fn parse_preference(raw: &str) -> Result<PreferenceInput, ConfigError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return Ok(PreferenceInput::Options(trimmed.to_owned()));
    }
    serde_json::from_str(trimmed).map_err(|e| ConfigError::InvalidPreference {
        key: ENV_PREFERENCE,
        reason: e.to_string(),
    })
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(ConfigError::InvalidNumber {
            key: ENV_REQUEST_TIMEOUT_MS,
            value: raw.to_owned(),
        }),
    }
}
