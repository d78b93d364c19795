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

//! Plugin manager - registry and lifecycle driver for capability plugins

use super::capabilities::{CapabilitySet, GrantedCapabilities};
use super::context::PluginContext;
use super::{Plugin, PluginManifest};
use crate::error::{PluginError, PluginResult};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Plugin state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Registered, never loaded
    Registered,
    /// Dependencies or init in progress
    Loading,
    /// Initialized and in the loaded set
    Loaded,
    /// Stopped; may be loaded again
    Stopped,
    /// Last load attempt failed
    Failed,
}

/// Plugin information for introspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub dependencies: Vec<String>,
    pub state: PluginState,
}

impl PluginInfo {
    fn new(manifest: &PluginManifest, state: PluginState) -> Self {
        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            description: manifest.description.clone(),
            author: manifest.author.clone(),
            dependencies: manifest.dependencies.clone(),
            state,
        }
    }
}

/// Registered plugins in registration order.
#[derive(Default)]
struct Registry {
    order: Vec<String>,
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

/// Plugin manager - registration, dependency-ordered loading and shutdown
pub struct PluginManager {
    registry: RwLock<Registry>,
    /// Loaded plugin names in load order
    loaded: RwLock<Vec<String>>,
    states: RwLock<HashMap<String, PluginState>>,
    context: RwLock<Option<PluginContext>>,
    host_capabilities: CapabilitySet,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    /// Create a manager that grants every host capability
    pub fn new() -> Self {
        Self::with_host_capabilities(CapabilitySet::host())
    }

    /// Create a manager that grants only `granted`
    pub fn with_host_capabilities(granted: CapabilitySet) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            loaded: RwLock::new(Vec::new()),
            states: RwLock::new(HashMap::new()),
            context: RwLock::new(None),
            host_capabilities: granted,
        }
    }

    /// Attach the context handed to every plugin's `init`
    pub fn set_context(&self, context: PluginContext) {
        *self.context.write() = Some(context);
        tracing::debug!("Plugin context set");
    }

    /// Register a plugin. An existing registration with the same name is replaced.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> PluginResult<()> {
        let manifest = plugin.manifest();
        self.validate(manifest)?;

        let name = manifest.name.clone();
        let version = manifest.version.clone();
        {
            let mut registry = self.registry.write();
            if registry.plugins.insert(name.clone(), plugin).is_some() {
                tracing::warn!(plugin = %name, "Plugin already registered, overwriting");
            } else {
                registry.order.push(name.clone());
            }
        }
        self.states
            .write()
            .entry(name.clone())
            .or_insert(PluginState::Registered);

        tracing::info!(plugin = %name, version = %version, "Plugin registered");
        Ok(())
    }

    /// Register several plugins, stopping at the first invalid one
    pub fn register_plugins(
        &self,
        plugins: impl IntoIterator<Item = Arc<dyn Plugin>>,
    ) -> PluginResult<()> {
        for plugin in plugins {
            self.register_plugin(plugin)?;
        }
        Ok(())
    }

    fn validate(&self, manifest: &PluginManifest) -> PluginResult<()> {
        if manifest.name.trim().is_empty() {
            return Err(PluginError::Validation("plugin name is empty".to_string()));
        }
        if manifest.version.trim().is_empty() {
            return Err(PluginError::Validation(format!(
                "plugin {} has no version",
                manifest.name
            )));
        }
        semver::Version::parse(&manifest.version)?;

        GrantedCapabilities::new(manifest.name.clone(), self.host_capabilities.clone())
            .check_all(&manifest.requires)
    }

    /// Load a plugin and, first, its dependencies
    pub async fn load_plugin(&self, name: &str) -> PluginResult<()> {
        let mut visiting = Vec::new();
        self.load_recursive(name, &mut visiting).await
    }

    fn load_recursive<'a>(
        &'a self,
        name: &'a str,
        visiting: &'a mut Vec<String>,
    ) -> BoxFuture<'a, PluginResult<()>> {
        Box::pin(async move {
            let context = self
                .context
                .read()
                .clone()
                .ok_or(PluginError::ContextNotSet)?;
            let plugin = self
                .plugin(name)
                .ok_or_else(|| PluginError::NotRegistered(name.to_string()))?;

            if self.is_loaded(name) {
                tracing::warn!(plugin = %name, "Plugin already loaded");
                return Err(PluginError::AlreadyLoaded(name.to_string()));
            }
            if visiting.iter().any(|v| v == name) {
                let mut path = visiting.clone();
                path.push(name.to_string());
                return Err(PluginError::DependencyCycle(path.join(" -> ")));
            }

            self.begin_loading(name)?;
            visiting.push(name.to_string());
            let result = self.load_with_dependencies(&plugin, &context, visiting).await;
            visiting.pop();

            if let Err(e) = result {
                tracing::error!(plugin = %name, error = %e, "Plugin load failed");
                self.set_state(name, PluginState::Failed);
                return Err(e);
            }

            {
                let mut loaded = self.loaded.write();
                if !loaded.iter().any(|n| n == name) {
                    loaded.push(name.to_string());
                }
            }
            self.set_state(name, PluginState::Loaded);
            tracing::info!(plugin = %name, "Plugin loaded");

            if let Err(e) = plugin.start().await {
                // Start failures leave the plugin loaded.
                tracing::warn!(plugin = %name, error = %e, "Plugin start failed");
            }
            Ok(())
        })
    }

    async fn load_with_dependencies(
        &self,
        plugin: &Arc<dyn Plugin>,
        context: &PluginContext,
        visiting: &mut Vec<String>,
    ) -> PluginResult<()> {
        let manifest = plugin.manifest();

        for dependency in &manifest.dependencies {
            if self.is_loaded(dependency) {
                continue;
            }
            tracing::debug!(plugin = %manifest.name, dependency = %dependency, "Loading dependency");
            self.load_recursive(dependency, visiting)
                .await
                .map_err(|e| match e {
                    cycle @ PluginError::DependencyCycle(_) => cycle,
                    other => PluginError::DependencyLoad {
                        plugin: manifest.name.clone(),
                        dependency: dependency.clone(),
                        source: Box::new(other),
                    },
                })?;
        }

        self.check_provided_capabilities(manifest)?;

        plugin
            .init(context)
            .await
            .map_err(|e| PluginError::InitFailed {
                plugin: manifest.name.clone(),
                message: e.to_string(),
            })
    }

    /// Custom capabilities must come from a loaded, declared dependency.
    fn check_provided_capabilities(&self, manifest: &PluginManifest) -> PluginResult<()> {
        for cap in manifest.requires.custom_required() {
            let provided = manifest.dependencies.iter().any(|dependency| {
                self.is_loaded(dependency)
                    && self
                        .plugin(dependency)
                        .map_or(false, |p| p.manifest().provides.has(cap))
            });
            if !provided {
                return Err(PluginError::CapabilityNotProvided {
                    plugin: manifest.name.clone(),
                    capability: cap.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Load every registered plugin that is not loaded yet, in registration order
    pub async fn load_all_plugins(&self) -> Vec<(String, PluginResult<()>)> {
        let names = self.registry.read().order.clone();
        tracing::info!(count = names.len(), "Loading all plugins");

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            // May have been loaded as a dependency of an earlier plugin.
            if self.is_loaded(&name) {
                continue;
            }
            let result = self.load_plugin(&name).await;
            results.push((name, result));
        }

        tracing::info!(loaded = self.loaded.read().len(), "Plugin loading complete");
        results
    }

    /// Stop a loaded plugin. It stays registered and may be loaded again.
    pub async fn stop_plugin(&self, name: &str) -> PluginResult<()> {
        if !self.is_loaded(name) {
            return Err(PluginError::NotLoaded(name.to_string()));
        }
        let plugin = self
            .plugin(name)
            .ok_or_else(|| PluginError::NotRegistered(name.to_string()))?;

        match plugin.stop().await {
            Ok(()) => {
                self.loaded.write().retain(|n| n != name);
                self.set_state(name, PluginState::Stopped);
                tracing::info!(plugin = %name, "Plugin stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(plugin = %name, error = %e, "Plugin stop failed");
                Err(PluginError::StopFailed {
                    plugin: name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Stop every loaded plugin, dependents before their dependencies
    pub async fn stop_all_plugins(&self) -> Vec<(String, PluginResult<()>)> {
        let names: Vec<String> = self.loaded.read().iter().rev().cloned().collect();
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let result = self.stop_plugin(&name).await;
            results.push((name, result));
        }
        results
    }

    /// Registered plugins in registration order
    pub fn registered_plugins(&self) -> Vec<PluginInfo> {
        let registry = self.registry.read();
        registry
            .order
            .iter()
            .filter_map(|name| registry.plugins.get(name))
            .map(|p| PluginInfo::new(p.manifest(), self.state_of(&p.manifest().name)))
            .collect()
    }

    /// Loaded plugins in load order
    pub fn loaded_plugins(&self) -> Vec<PluginInfo> {
        let loaded = self.loaded.read().clone();
        loaded
            .iter()
            .filter_map(|name| self.plugin_info(name))
            .collect()
    }

    pub fn plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.plugin(name)
            .map(|p| PluginInfo::new(p.manifest(), self.state_of(name)))
    }

    /// The registered plugin instance
    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.read().plugins.get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.read().plugins.contains_key(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.read().iter().any(|n| n == name)
    }

    pub fn plugin_state(&self, name: &str) -> Option<PluginState> {
        self.states.read().get(name).copied()
    }

    fn state_of(&self, name: &str) -> PluginState {
        self.plugin_state(name).unwrap_or(PluginState::Registered)
    }

    /// Claim `name` for loading. Only one caller can hold the claim.
    fn begin_loading(&self, name: &str) -> PluginResult<()> {
        let mut states = self.states.write();
        match states.get(name) {
            Some(PluginState::Loaded) => {
                tracing::warn!(plugin = %name, "Plugin already loaded");
                Err(PluginError::AlreadyLoaded(name.to_string()))
            }
            Some(PluginState::Loading) => {
                tracing::warn!(plugin = %name, "Plugin load already in progress");
                Err(PluginError::LoadInProgress(name.to_string()))
            }
            _ => {
                states.insert(name.to_string(), PluginState::Loading);
                Ok(())
            }
        }
    }

    fn set_state(&self, name: &str, state: PluginState) {
        self.states.write().insert(name.to_string(), state);
    }
}
