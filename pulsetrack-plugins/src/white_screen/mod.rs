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

//! White-screen (blank page) detection
//!
//! After the document completes, the detector waits for an idle window and
//! probes 33 points of the viewport. A probe that lands on one of the
//! configured container selectors (the empty app shell) counts as empty; a
//! pass with at least `white_screen_threshold` empty probes is reported as
//! blank and starts a bounded polling loop that re-checks the page.
//!
//! In skeleton mode the first pass records the selector sequence of the
//! skeleton screen, and every poll that sees the same sequence is reported
//! as blank even when the threshold is not met.

mod config;
mod detector;
mod probe;
mod sampling;

pub use config::WhiteScreenConfig;
pub use detector::{BlankReason, WhiteScreenDetector, WhiteScreenInfo};
pub use probe::{ElementInfo, PageProbe, ReadyState, Rect, StaticPage, Viewport};
pub use sampling::{sample, sample_points, PassResult, SAMPLE_POINTS};

use async_trait::async_trait;
use parking_lot::Mutex;
use pulsetrack_core::plugin::{Capability, Plugin, PluginContext, PluginManifest};
use pulsetrack_core::{PluginError, PluginResult};
use std::sync::Arc;

/// Plugin name of [`WhiteScreenPlugin`].
pub const PLUGIN_NAME: &str = "white-screen";

/// Runs a [`WhiteScreenDetector`] for the lifetime of the plugin.
pub struct WhiteScreenPlugin {
    manifest: PluginManifest,
    config: WhiteScreenConfig,
    probe: Arc<dyn PageProbe>,
    detector: Mutex<Option<Arc<WhiteScreenDetector>>>,
}

impl WhiteScreenPlugin {
    pub fn new(config: WhiteScreenConfig, probe: Arc<dyn PageProbe>) -> Self {
        let manifest = PluginManifest::new(PLUGIN_NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Detects blank pages by sampling the viewport")
            .requires(Capability::SendEvents)
            .requires(Capability::Scheduler);
        Self {
            manifest,
            config,
            probe,
            detector: Mutex::new(None),
        }
    }

    /// The detector of the current load, once initialized.
    pub fn detector(&self) -> Option<Arc<WhiteScreenDetector>> {
        self.detector.lock().clone()
    }
}

#[async_trait]
impl Plugin for WhiteScreenPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, ctx: &PluginContext) -> PluginResult<()> {
        self.config
            .validate()
            .map_err(|e| PluginError::Validation(e.to_string()))?;

        let detector = WhiteScreenDetector::new(
            self.config.clone(),
            self.probe.clone(),
            ctx.scheduler(),
            ctx.sender().clone(),
        );
        if let Some(previous) = self.detector.lock().replace(detector) {
            previous.shutdown();
        }
        Ok(())
    }

    async fn start(&self) -> PluginResult<()> {
        if let Some(detector) = self.detector() {
            detector.activate();
        }
        Ok(())
    }

    async fn stop(&self) -> PluginResult<()> {
        if let Some(detector) = self.detector() {
            detector.shutdown();
        }
        Ok(())
    }
}
