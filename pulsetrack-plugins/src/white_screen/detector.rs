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

//! Blank-page detection state machine.
//!
//! ```text
//! idle ──activate──▶ sampling ──blank──▶ polling ──cap──▶ done
//!                       │                   │
//!                       └──not blank──▶ idle ◀──not blank
//! ```

use super::config::WhiteScreenConfig;
use super::probe::{PageProbe, ReadyState};
use super::sampling::{sample, PassResult};
use parking_lot::Mutex;
use pulsetrack_core::event::EventKind;
use pulsetrack_core::scheduler::{IdleDeadline, Scheduler, TaskHandle};
use pulsetrack_core::EventSender;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a pass was reported as blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankReason {
    /// Enough probes landed on the empty shell
    Threshold,
    /// The skeleton never changed since the first pass
    SkeletonUnchanged,
}

/// Payload of a `white_screen` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteScreenInfo {
    pub timestamp: u64,
    pub url: String,
    /// `"<width>x<height>"`
    pub viewport: String,
    pub container_selectors: Vec<String>,
    pub is_skeleton_app: bool,
    pub white_screen_loop_num: u32,
    pub empty_points: u32,
    pub user_agent: String,
    pub ready_state: ReadyState,
    pub reason: BlankReason,
}

#[derive(Default)]
struct DetectorState {
    empty_points: u32,
    loop_num: u32,
    skeleton_init: Vec<String>,
    skeleton_now: Vec<String>,
    poll: Option<TaskHandle>,
    activation: Option<TaskHandle>,
    loaded: bool,
}

/// Samples one page for blankness. Built once per page load.
pub struct WhiteScreenDetector {
    config: WhiteScreenConfig,
    probe: Arc<dyn PageProbe>,
    scheduler: Arc<dyn Scheduler>,
    sender: EventSender,
    state: Mutex<DetectorState>,
}

impl WhiteScreenDetector {
    pub fn new(
        config: WhiteScreenConfig,
        probe: Arc<dyn PageProbe>,
        scheduler: Arc<dyn Scheduler>,
        sender: EventSender,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            probe,
            scheduler,
            sender,
            state: Mutex::new(DetectorState::default()),
        })
    }

    /// Start detection. Returns `false` if the detector was already activated.
    ///
    /// Waits for the document to complete first, except in skeleton mode,
    /// which samples right away.
    pub fn activate(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock();
        if state.loaded {
            return false;
        }
        state.loaded = true;

        let wait_for_load =
            !self.config.skeleton_app && self.probe.ready_state() != ReadyState::Complete;
        let detector = self.clone();
        state.activation = Some(self.scheduler.spawn(Box::pin(async move {
            if wait_for_load {
                detector.probe.loaded().await;
            }
            detector.run_pass().await;
        })));
        tracing::debug!(
            skeleton = self.config.skeleton_app,
            wait_for_load,
            "White-screen detection activated"
        );
        true
    }

    /// Cancel any pending pass and the poll loop. The detector stays spent.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if let Some(task) = state.activation.take() {
            task.cancel();
        }
        if let Some(poll) = state.poll.take() {
            poll.cancel();
        }
    }

    async fn run_pass(self: &Arc<Self>) {
        let deadline = self.scheduler.idle(self.config.idle_timeout()).await;
        self.evaluate(deadline);
    }

    fn evaluate(self: &Arc<Self>, deadline: IdleDeadline) {
        let mut state = self.state.lock();
        state.empty_points = 0;
        if !deadline.has_time() {
            tracing::debug!("No idle time left, sampling skipped");
            return;
        }
        let Some(PassResult {
            empty_points,
            selectors,
        }) = sample(self.probe.as_ref(), &self.config)
        else {
            tracing::debug!("Viewport has no area, sampling skipped");
            return;
        };

        state.empty_points = empty_points;
        if self.config.skeleton_app {
            if state.loop_num == 0 {
                state.skeleton_init = selectors;
            } else {
                state.skeleton_now = selectors;
            }
        }

        let skeleton_unchanged = self.config.skeleton_app
            && state.loop_num > 0
            && state.skeleton_now == state.skeleton_init;

        if empty_points >= self.config.white_screen_threshold {
            self.report(&state, BlankReason::Threshold);
            if state.poll.is_none() {
                self.start_polling(&mut state);
            }
        } else if skeleton_unchanged {
            self.report(&state, BlankReason::SkeletonUnchanged);
        } else {
            if let Some(poll) = state.poll.take() {
                tracing::debug!(loop_num = state.loop_num, empty_points, "Page rendered, polling stopped");
                poll.cancel();
            }
            if self.config.skeleton_app && state.loop_num == 0 {
                self.start_polling(&mut state);
            }
        }
    }

    fn start_polling(self: &Arc<Self>, state: &mut DetectorState) {
        let detector = self.clone();
        let interval = self.config.poll_interval();
        let max_polls = self.config.max_poll_times;

        state.poll = Some(self.scheduler.spawn(Box::pin(async move {
            loop {
                detector.scheduler.delay(interval).await;
                let capped = {
                    let mut state = detector.state.lock();
                    state.loop_num += 1;
                    state.skeleton_now.clear();
                    state.loop_num >= max_polls
                };

                detector.run_pass().await;

                let mut state = detector.state.lock();
                if capped {
                    if let Some(poll) = state.poll.take() {
                        poll.cancel();
                    }
                    tracing::debug!(loop_num = state.loop_num, "Poll cap reached");
                    break;
                }
                if state.poll.is_none() {
                    break;
                }
            }
        })));
    }

    fn report(&self, state: &DetectorState, reason: BlankReason) {
        let viewport = self.probe.viewport();
        let info = WhiteScreenInfo {
            timestamp: self.scheduler.now_ms(),
            url: self.probe.url(),
            viewport: viewport.to_string(),
            container_selectors: self.config.container_selectors.clone(),
            is_skeleton_app: self.config.skeleton_app,
            white_screen_loop_num: state.loop_num,
            empty_points: state.empty_points,
            user_agent: self.probe.user_agent(),
            ready_state: self.probe.ready_state(),
            reason,
        };

        match serde_json::to_value(&info) {
            Ok(serde_json::Value::Object(data)) => {
                tracing::info!(
                    empty_points = info.empty_points,
                    loop_num = info.white_screen_loop_num,
                    ?reason,
                    "White screen detected"
                );
                self.sender.send_immediate(EventKind::WhiteScreen, data);
            }
            Ok(_) => tracing::error!("White-screen payload is not an object"),
            Err(e) => tracing::error!(error = %e, "Failed to encode white-screen payload"),
        }
    }

    /// Empty probes counted by the latest pass.
    pub fn empty_points(&self) -> u32 {
        self.state.lock().empty_points
    }

    /// Completed poll ticks.
    pub fn loop_num(&self) -> u32 {
        self.state.lock().loop_num
    }

    pub fn is_polling(&self) -> bool {
        self.state.lock().poll.is_some()
    }

    pub fn is_activated(&self) -> bool {
        self.state.lock().loaded
    }

    /// Selector sequence of the first pass (skeleton mode).
    pub fn skeleton_baseline(&self) -> Vec<String> {
        self.state.lock().skeleton_init.clone()
    }
}
