// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session engine settings
//!
//! Loaded from environment variables (after `.env`) or from a TOML file:
//!
//! ```toml
//! enabled = true
//! rpc_timeout_secs = 10
//! sdk_load_timeout_secs = 30
//! client_version_marker = "hardhat"
//! public_params_size = 2048
//! cache_dir = "/var/lib/fhevm"
//!
//! [mock_chains]
//! 31337 = "http://localhost:8545"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::chains::MockChains;

pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SDK_LOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLIENT_VERSION_MARKER: &str = "hardhat";
pub const DEFAULT_PUBLIC_PARAMS_SIZE: u32 = 2048;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// On-disk shape; chain ids are TOML keys and therefore strings
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct RawSessionConfig {
    enabled: Option<bool>,
    rpc_timeout_secs: Option<u64>,
    sdk_load_timeout_secs: Option<u64>,
    client_version_marker: Option<String>,
    public_params_size: Option<u32>,
    cache_dir: Option<PathBuf>,
    mock_chains: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Whether the controller starts building as soon as a provider is set
    pub enabled: bool,
    pub mock_chains: MockChains,
    pub rpc_timeout: Duration,
    pub sdk_load_timeout: Duration,
    /// Case-insensitive substring expected in `web3_clientVersion`
    pub client_version_marker: String,
    /// Size argument passed to `public_params` when refreshing the key cache
    pub public_params_size: u32,
    /// Directory of the durable key cache; `None` keeps it in memory
    pub cache_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mock_chains: MockChains::new(),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            sdk_load_timeout: Duration::from_secs(DEFAULT_SDK_LOAD_TIMEOUT_SECS),
            client_version_marker: DEFAULT_CLIENT_VERSION_MARKER.to_string(),
            public_params_size: DEFAULT_PUBLIC_PARAMS_SIZE,
            cache_dir: None,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `FHEVM_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(value) = env::var("FHEVM_ENABLED") {
            config.enabled = parse_bool("FHEVM_ENABLED", &value)?;
        }
        if let Ok(value) = env::var("FHEVM_MOCK_CHAINS") {
            let overrides = MockChains::parse_overrides(&value).map_err(|reason| {
                ConfigError::InvalidValue {
                    key: "FHEVM_MOCK_CHAINS".to_string(),
                    reason,
                }
            })?;
            config.mock_chains = MockChains::with_overrides(overrides);
        }
        if let Ok(value) = env::var("FHEVM_RPC_TIMEOUT_SECS") {
            config.rpc_timeout = Duration::from_secs(parse_u64("FHEVM_RPC_TIMEOUT_SECS", &value)?);
        }
        if let Ok(value) = env::var("FHEVM_SDK_LOAD_TIMEOUT_SECS") {
            config.sdk_load_timeout =
                Duration::from_secs(parse_u64("FHEVM_SDK_LOAD_TIMEOUT_SECS", &value)?);
        }
        if let Ok(value) = env::var("FHEVM_MOCK_MARKER") {
            config.client_version_marker = value;
        }
        if let Ok(value) = env::var("FHEVM_PUBLIC_PARAMS_SIZE") {
            let size = parse_u64("FHEVM_PUBLIC_PARAMS_SIZE", &value)?;
            config.public_params_size =
                u32::try_from(size).map_err(|e| ConfigError::InvalidValue {
                    key: "FHEVM_PUBLIC_PARAMS_SIZE".to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Ok(value) = env::var("FHEVM_CACHE_DIR") {
            if !value.trim().is_empty() {
                config.cache_dir = Some(PathBuf::from(value));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawSessionConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = Self::default();
        let mut overrides = Vec::with_capacity(raw.mock_chains.len());
        for (chain_id, url) in raw.mock_chains {
            let id = chain_id
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: format!("mock_chains.{}", chain_id),
                    reason: e.to_string(),
                })?;
            overrides.push((id, url));
        }

        let config = Self {
            enabled: raw.enabled.unwrap_or(defaults.enabled),
            mock_chains: MockChains::with_overrides(overrides),
            rpc_timeout: raw
                .rpc_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.rpc_timeout),
            sdk_load_timeout: raw
                .sdk_load_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sdk_load_timeout),
            client_version_marker: raw
                .client_version_marker
                .unwrap_or(defaults.client_version_marker),
            public_params_size: raw.public_params_size.unwrap_or(defaults.public_params_size),
            cache_dir: raw.cache_dir,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "rpc_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sdk_load_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "sdk_load_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.client_version_marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "client_version_marker".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        for (chain_id, url) in self.mock_chains.iter() {
            let invalid = |reason: String| ConfigError::InvalidValue {
                key: format!("mock_chains.{}", chain_id),
                reason,
            };
            let parsed = url::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
            if parsed.host_str().map_or(true, str::is_empty) {
                return Err(invalid(format!("'{}' has no host", url)));
            }
        }
        Ok(())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
