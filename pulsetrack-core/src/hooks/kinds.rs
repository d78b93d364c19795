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

//! Lifecycle hook kinds and the context threaded through them.

use crate::config::TrackerConfig;
use crate::event::{RawSignal, TrackEvent};
use crate::tracker::Tracker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Named stages of the tracker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleHook {
    /// Tracker constructed.
    Init,
    BeforeInit,
    /// Raw signal received; may veto.
    BeforeCollect,
    /// Canonical event built.
    AfterCollect,
    /// About to enqueue; may veto.
    BeforeReport,
    /// Enqueued.
    AfterReport,
    BeforeDestroy,
    Destroy,
}

impl LifecycleHook {
    /// Every hook kind, in lifecycle order.
    pub const ALL: [LifecycleHook; 8] = [
        LifecycleHook::BeforeInit,
        LifecycleHook::Init,
        LifecycleHook::BeforeCollect,
        LifecycleHook::AfterCollect,
        LifecycleHook::BeforeReport,
        LifecycleHook::AfterReport,
        LifecycleHook::BeforeDestroy,
        LifecycleHook::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleHook::Init => "INIT",
            LifecycleHook::BeforeInit => "BEFORE_INIT",
            LifecycleHook::BeforeCollect => "BEFORE_COLLECT",
            LifecycleHook::AfterCollect => "AFTER_COLLECT",
            LifecycleHook::BeforeReport => "BEFORE_REPORT",
            LifecycleHook::AfterReport => "AFTER_REPORT",
            LifecycleHook::BeforeDestroy => "BEFORE_DESTROY",
            LifecycleHook::Destroy => "DESTROY",
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State handed by mutable reference to every handler of one pipeline pass.
///
/// Handlers may rewrite `signal` before collection and `event` after it.
#[derive(Clone)]
pub struct LifecycleContext {
    tracker: Option<Tracker>,
    /// Configuration snapshot taken when the pass started.
    pub config: Arc<TrackerConfig>,
    /// Raw signal in progress.
    pub signal: Option<RawSignal>,
    /// Canonical event in progress.
    pub event: Option<TrackEvent>,
}

impl LifecycleContext {
    pub fn new(config: Arc<TrackerConfig>) -> Self {
        Self {
            tracker: None,
            config,
            signal: None,
            event: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_signal(mut self, signal: RawSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// The tracker driving this pass, absent for standalone dispatch.
    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }
}

impl fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("has_tracker", &self.tracker.is_some())
            .field("signal", &self.signal)
            .field("event", &self.event)
            .finish()
    }
}
