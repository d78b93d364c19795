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

//! White-screen detector configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! container_selectors = ["#root", "#app"]
//! white_screen_threshold = 30
//! skeleton_app = true
//! ```

use super::sampling::SAMPLE_POINTS;
use pulsetrack_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteScreenConfig {
    /// Selectors of the empty app shell; a probe landing on one counts as empty.
    #[serde(default = "default_container_selectors")]
    pub container_selectors: Vec<String>,

    /// Interval between polls once a blank page was seen.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Poll cap.
    #[serde(default = "default_max_poll_times")]
    pub max_poll_times: u32,

    /// Empty probes (out of 33) that classify the page as blank.
    #[serde(default = "default_white_screen_threshold")]
    pub white_screen_threshold: u32,

    /// Upper bound on the wait for an idle window.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Compare selector sequences against the first pass instead of relying on the threshold alone.
    #[serde(default)]
    pub skeleton_app: bool,
}

fn default_container_selectors() -> Vec<String> {
    ["#root", "#app", "main", ".app", "[data-app]"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_max_poll_times() -> u32 {
    10
}

fn default_white_screen_threshold() -> u32 {
    28
}

fn default_idle_timeout_ms() -> u64 {
    3000
}

impl Default for WhiteScreenConfig {
    fn default() -> Self {
        Self {
            container_selectors: default_container_selectors(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_times: default_max_poll_times(),
            white_screen_threshold: default_white_screen_threshold(),
            idle_timeout_ms: default_idle_timeout_ms(),
            skeleton_app: false,
        }
    }
}

impl WhiteScreenConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.white_screen_threshold = threshold;
        self
    }

    pub fn with_skeleton_app(mut self, skeleton_app: bool) -> Self {
        self.skeleton_app = skeleton_app;
        self
    }

    pub fn with_max_poll_times(mut self, max_poll_times: u32) -> Self {
        self.max_poll_times = max_poll_times;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_selectors.is_empty() {
            return Err(ConfigError::MissingField("container_selectors"));
        }
        if self.white_screen_threshold == 0 || self.white_screen_threshold as usize > SAMPLE_POINTS {
            return Err(ConfigError::InvalidValue {
                field: "white_screen_threshold",
                reason: format!("must be between 1 and {}", SAMPLE_POINTS),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn is_container(&self, selector: &str) -> bool {
        self.container_selectors.iter().any(|s| s == selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WhiteScreenConfig::default();
        assert_eq!(config.white_screen_threshold, 28);
        assert_eq!(config.max_poll_times, 10);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.is_container("#root"));
        assert!(!config.is_container("#content"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = WhiteScreenConfig::from_toml("skeleton_app = true\nmax_poll_times = 3").unwrap();
        assert!(config.skeleton_app);
        assert_eq!(config.max_poll_times, 3);
        assert_eq!(config.container_selectors.len(), 5);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(WhiteScreenConfig::default().with_threshold(0).validate().is_err());
        assert!(WhiteScreenConfig::default().with_threshold(33).validate().is_ok());
        assert!(WhiteScreenConfig::default().with_threshold(34).validate().is_err());
    }
}
