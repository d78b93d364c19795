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

//! Hook dispatcher configuration.

use super::kinds::LifecycleHook;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the hook dispatcher.
///
/// # Example JSON Configuration
///
/// ```json
/// {
///     "enabled": ["BEFORE_COLLECT", "BEFORE_REPORT", "AFTER_REPORT"],
///     "default_timeout_ms": 2000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Hook kinds that accept registrations. Defaults to every kind.
    #[serde(default = "default_enabled")]
    pub enabled: Vec<LifecycleHook>,

    /// Timeout for one handler invocation in milliseconds.
    #[serde(default = "default_timeout")]
    pub default_timeout_ms: u64,
}

fn default_enabled() -> Vec<LifecycleHook> {
    LifecycleHook::ALL.to_vec()
}

fn default_timeout() -> u64 {
    5000
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_timeout_ms: default_timeout(),
        }
    }
}

impl HookConfig {
    /// Restrict registrations to the given kinds.
    pub fn only(kinds: impl IntoIterator<Item = LifecycleHook>) -> Self {
        Self {
            enabled: kinds.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn is_enabled(&self, hook: LifecycleHook) -> bool {
        self.enabled.contains(&hook)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_everything() {
        let config = HookConfig::default();
        for hook in LifecycleHook::ALL {
            assert!(config.is_enabled(hook));
        }
        assert_eq!(config.default_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_json() {
        let config =
            HookConfig::from_json(r#"{"enabled": ["BEFORE_COLLECT", "DESTROY"]}"#).unwrap();
        assert!(config.is_enabled(LifecycleHook::BeforeCollect));
        assert!(config.is_enabled(LifecycleHook::Destroy));
        assert!(!config.is_enabled(LifecycleHook::AfterReport));
        assert_eq!(config.default_timeout_ms, 5000);
    }

    #[test]
    fn test_parse_toml() {
        let config = HookConfig::from_toml(
            r#"
enabled = ["INIT"]
default_timeout_ms = 100
"#,
        )
        .unwrap();
        assert_eq!(config.enabled, vec![LifecycleHook::Init]);
        assert_eq!(config.default_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(HookConfig::from_json(r#"{"enabled": ["SessionStart"]}"#).is_err());
    }
}
