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

//! Host context handed to every plugin's `init`.

use crate::config::TrackerConfig;
use crate::scheduler::Scheduler;
use crate::sender::EventSender;
use crate::tracker::{Tracker, WeakTracker};
use std::sync::Arc;

#[derive(Clone)]
pub struct PluginContext {
    sender: EventSender,
    scheduler: Arc<dyn Scheduler>,
    config: Arc<TrackerConfig>,
    tracker: Option<WeakTracker>,
}

impl PluginContext {
    pub fn new(
        sender: EventSender,
        scheduler: Arc<dyn Scheduler>,
        config: Arc<TrackerConfig>,
    ) -> Self {
        Self {
            sender,
            scheduler,
            config,
            tracker: None,
        }
    }

    pub(crate) fn with_tracker(mut self, tracker: WeakTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn sender(&self) -> &EventSender {
        &self.sender
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }

    /// Configuration the tracker was constructed with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The owning tracker, while it is alive.
    pub fn tracker(&self) -> Option<Tracker> {
        self.tracker.as_ref().and_then(WeakTracker::upgrade)
    }
}
