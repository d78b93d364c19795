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

//! Plugin system
//!
//! Capability plugins contribute instrumentation to a tracker. Each plugin
//! declares a [`PluginManifest`] and implements the init/start/stop contract
//! of [`Plugin`]. The [`PluginManager`] validates registrations, loads
//! dependencies depth-first and drives the lifecycle.
//!
//! ```text
//! registered ──load──▶ loading ──init ok──▶ loaded ──stop──▶ stopped
//!                         │                                     │
//!                         └──error──▶ failed ◀──────────────────┘ (reload)
//! ```

mod capabilities;
mod context;
mod manager;

pub use capabilities::{Capability, CapabilitySet, GrantedCapabilities};
pub use context::PluginContext;
pub use manager::{PluginInfo, PluginManager, PluginState};

use crate::error::PluginResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique name within one manager
    pub name: String,
    /// Semver version
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Plugins that must be loaded first, in load order
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub requires: CapabilitySet,
    #[serde(default)]
    pub provides: CapabilitySet,
}

impl PluginManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            dependencies: Vec::new(),
            requires: CapabilitySet::new(),
            provides: CapabilitySet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn requires(mut self, cap: Capability) -> Self {
        self.requires.add(cap);
        self
    }

    pub fn provides(mut self, cap: Capability) -> Self {
        self.provides.add(cap);
        self
    }
}

/// Lifecycle contract for capability plugins.
///
/// `start` and `stop` are optional; the defaults succeed without doing anything.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> &PluginManifest;

    /// Wire the plugin to the host. Called once per load.
    async fn init(&self, ctx: &PluginContext) -> PluginResult<()>;

    /// Begin active work after a successful `init`.
    async fn start(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Release timers, listeners and other resources.
    async fn stop(&self) -> PluginResult<()> {
        Ok(())
    }
}
