// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tracker configuration.
//!
//! Everything except `api_key` and `server_url` has a default.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! api_key = "pk_live_123"
//! server_url = "https://collect.example.com/api/track/report"
//! batch_limit = 20
//! debug = true
//!
//! [retry]
//! max_times = 3
//! base_delay_ms = 1000
//!
//! [storage]
//! enabled = true
//! max_size = 500
//! ```

use crate::error::ConfigError;
use crate::hooks::HookConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one tracker instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// API key sent with every delivery.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Collection endpoint.
    #[serde(default)]
    pub server_url: Option<String>,

    /// Batched queue length that triggers a flush.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Ceiling for in-flight immediate events.
    #[serde(default = "default_immediate_max_size")]
    pub immediate_max_size: usize,

    /// Ceiling for the batched queue.
    #[serde(default = "default_batch_max_size")]
    pub batch_max_size: usize,

    /// Maximum time a non-empty batch waits before being flushed.
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,

    /// Log every queue transition.
    #[serde(default)]
    pub debug: bool,

    /// Initial user id attached to events.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Per-request timeout for the HTTP transport.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub hooks: HookConfig,
}

fn default_batch_limit() -> usize {
    20
}

fn default_immediate_max_size() -> usize {
    100
}

fn default_batch_max_size() -> usize {
    1000
}

fn default_batch_interval_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            server_url: None,
            batch_limit: default_batch_limit(),
            immediate_max_size: default_immediate_max_size(),
            batch_max_size: default_batch_max_size(),
            batch_interval_ms: default_batch_interval_ms(),
            debug: false,
            user_id: None,
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
            hooks: HookConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Create a configuration with the two mandatory identifiers.
    pub fn new(api_key: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            server_url: Some(server_url.into()),
            ..Default::default()
        }
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_hooks(mut self, hooks: HookConfig) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("api_key"));
        }
        if self.server_url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("server_url"));
        }

        let limits = [
            ("batch_limit", self.batch_limit),
            ("immediate_max_size", self.immediate_max_size),
            ("batch_max_size", self.batch_max_size),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.batch_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.storage.enabled && self.storage.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_size",
                reason: "must be greater than zero when storage is enabled".to_string(),
            });
        }

        Ok(())
    }

    /// API key, empty if unset.
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Server URL, empty if unset.
    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or_default()
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total send attempts per unit, the first one included. Zero behaves like one.
    #[serde(default = "default_max_times")]
    pub max_times: u32,

    /// Delay before the first retry; doubles for every following retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_times() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_times: default_max_times(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Local buffering of units whose send attempts are exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of buffered events.
    #[serde(default = "default_storage_max_size")]
    pub max_size: usize,

    /// Maximum age of a buffered unit in milliseconds.
    #[serde(default = "default_storage_max_age_ms")]
    pub max_age_ms: u64,

    /// Backing file; memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_storage_max_size() -> usize {
    500
}

fn default_storage_max_age_ms() -> u64 {
    24 * 60 * 60 * 1000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: default_storage_max_size(),
            max_age_ms: default_storage_max_age_ms(),
            path: None,
        }
    }
}
