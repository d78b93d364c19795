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

//! Plugin capabilities and access control
//!
//! Host capabilities are granted by the plugin manager and checked when a
//! plugin is registered. Custom capabilities are provided by other plugins
//! and checked when the dependent is loaded.

use crate::error::{PluginError, PluginResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Individual capability a plugin can require or provide
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Submit signals through the event sender
    SendEvents,
    /// Register lifecycle hooks on the tracker
    RegisterHooks,
    /// Use the scheduler for timers and idle callbacks
    Scheduler,
    /// Read the tracker configuration
    ReadConfig,
    /// Perform network requests of its own
    Network,
    /// Capability provided by another plugin
    Custom(String),
}

impl Capability {
    pub fn custom(name: impl Into<String>) -> Self {
        Capability::Custom(name.into())
    }

    /// Whether the host (rather than another plugin) provides this capability
    pub fn is_host(&self) -> bool {
        !matches!(self, Capability::Custom(_))
    }

    /// Get a human-readable description
    pub fn description(&self) -> &str {
        match self {
            Capability::SendEvents => "Submit events",
            Capability::RegisterHooks => "Register lifecycle hooks",
            Capability::Scheduler => "Schedule timers and idle work",
            Capability::ReadConfig => "Read tracker configuration",
            Capability::Network => "Perform network requests",
            Capability::Custom(name) => name,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Custom(name) => write!(f, "custom:{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A set of capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every host capability
    pub fn host() -> Self {
        [
            Capability::SendEvents,
            Capability::RegisterHooks,
            Capability::Scheduler,
            Capability::ReadConfig,
            Capability::Network,
        ]
        .into_iter()
        .collect()
    }

    pub fn add(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    pub fn with(mut self, cap: Capability) -> Self {
        self.add(cap);
        self
    }

    pub fn remove(&mut self, cap: &Capability) {
        self.capabilities.remove(cap);
    }

    pub fn has(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    pub fn all(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    /// Capabilities the host must grant
    pub fn host_required(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter().filter(|c| c.is_host())
    }

    /// Capabilities another plugin must provide
    pub fn custom_required(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter().filter(|c| !c.is_host())
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

/// Capabilities that have been granted to a plugin
#[derive(Debug, Clone)]
pub struct GrantedCapabilities {
    plugin: String,
    granted: CapabilitySet,
}

impl GrantedCapabilities {
    pub fn new(plugin: impl Into<String>, granted: CapabilitySet) -> Self {
        Self {
            plugin: plugin.into(),
            granted,
        }
    }

    /// Check if a capability is granted
    pub fn check(&self, cap: &Capability) -> PluginResult<()> {
        if self.granted.has(cap) {
            Ok(())
        } else {
            Err(PluginError::CapabilityDenied {
                plugin: self.plugin.clone(),
                capability: cap.to_string(),
            })
        }
    }

    /// Check every host capability in `required`
    pub fn check_all(&self, required: &CapabilitySet) -> PluginResult<()> {
        required.host_required().try_for_each(|cap| self.check(cap))
    }

    pub fn all_granted(&self) -> &CapabilitySet {
        &self.granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set() {
        let set = CapabilitySet::new()
            .with(Capability::SendEvents)
            .with(Capability::custom("breadcrumbs"));

        assert!(set.has(&Capability::SendEvents));
        assert!(!set.has(&Capability::Network));
        assert_eq!(set.host_required().count(), 1);
        assert_eq!(
            set.custom_required().collect::<Vec<_>>(),
            vec![&Capability::custom("breadcrumbs")]
        );
    }

    #[test]
    fn test_granted_capabilities() {
        let granted = GrantedCapabilities::new(
            "collector",
            CapabilitySet::new().with(Capability::SendEvents),
        );

        assert!(granted.check(&Capability::SendEvents).is_ok());
        assert!(matches!(
            granted.check(&Capability::Network),
            Err(PluginError::CapabilityDenied { .. })
        ));
    }

    #[test]
    fn test_check_all_ignores_custom() {
        let granted = GrantedCapabilities::new("p", CapabilitySet::host());
        let required = CapabilitySet::new()
            .with(Capability::Scheduler)
            .with(Capability::custom("not-a-host-thing"));
        assert!(granted.check_all(&required).is_ok());
    }
}
