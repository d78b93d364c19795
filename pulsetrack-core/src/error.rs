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

//! Error types for the event pipeline.
//!
//! Only construction (`ConfigError`, transport setup) and plugin
//! registration/loading (`PluginError`) surface to callers. Hook and delivery
//! failures are logged and converted into veto/retry/drop decisions inside
//! the pipeline.

use crate::hooks::HookError;
use thiserror::Error;

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Top-level error for the tracker boundary
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Tracker not initialized")]
    NotInitialized,
}

/// Invalid or missing configuration. Fatal at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Errors from plugin registration and lifecycle operations
#[derive(Debug, Error)]
pub enum PluginError {
    // Registration errors
    #[error("Invalid plugin: {0}")]
    Validation(String),

    #[error("Capability denied for plugin {plugin}: {capability}")]
    CapabilityDenied { plugin: String, capability: String },

    // Load errors
    #[error("Plugin context not set")]
    ContextNotSet,

    #[error("Plugin not registered: {0}")]
    NotRegistered(String),

    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("Plugin load already in progress: {0}")]
    LoadInProgress(String),

    #[error("Plugin not loaded: {0}")]
    NotLoaded(String),

    #[error("Dependency {dependency} of plugin {plugin} failed to load: {source}")]
    DependencyLoad {
        plugin: String,
        dependency: String,
        #[source]
        source: Box<PluginError>,
    },

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("Plugin {plugin} requires capability {capability}, not provided by any loaded dependency")]
    CapabilityNotProvided { plugin: String, capability: String },

    // Lifecycle errors
    #[error("Plugin {plugin} failed to initialize: {message}")]
    InitFailed { plugin: String, message: String },

    #[error("Plugin {plugin} failed to start: {message}")]
    StartFailed { plugin: String, message: String },

    #[error("Plugin {plugin} failed to stop: {message}")]
    StopFailed { plugin: String, message: String },

    #[error("Plugin error: {0}")]
    Other(String),
}

impl From<semver::Error> for PluginError {
    fn from(e: semver::Error) -> Self {
        PluginError::Validation(format!("Invalid version: {}", e))
    }
}

/// A failed delivery attempt or local buffer operation
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Buffer storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for DeliveryError {
    fn from(e: std::io::Error) -> Self {
        DeliveryError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(e: serde_json::Error) -> Self {
        DeliveryError::Storage(e.to_string())
    }
}
