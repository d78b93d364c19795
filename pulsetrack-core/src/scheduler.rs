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

//! Cooperative scheduling primitives.
//!
//! Every timer in the pipeline (batch interval, retry backoff, blank-page
//! polling) and every idle-time callback goes through a [`Scheduler`]. Two
//! implementations are provided:
//!
//! - [`TokioScheduler`]: wall clock, `tokio::time` timers
//! - [`ManualScheduler`]: virtual clock advanced explicitly by tests
//!
//! Spawned work returns a [`TaskHandle`]; cancelling it is idempotent.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Idle time granted to a "run when idle" callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleDeadline {
    /// Time left in the idle window.
    pub time_remaining: Duration,
    /// Whether the callback ran because its timeout expired.
    pub did_timeout: bool,
}

impl IdleDeadline {
    pub fn has_time(&self) -> bool {
        !self.time_remaining.is_zero()
    }
}

/// Handle to a spawned task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the task. Cancelling twice, or cancelling a finished task, is a no-op.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the task ran to completion or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Scheduling primitives used by the pipeline.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> u64;

    /// Suspend for `duration` ("run after delay").
    async fn delay(&self, duration: Duration);

    /// Suspend until the host is idle or `timeout` expires ("run when idle").
    async fn idle(&self, timeout: Duration) -> IdleDeadline;

    /// Run `task` in the background.
    fn spawn(&self, task: BoxFuture<'static, ()>) -> TaskHandle;
}

fn spawn_on_tokio(task: BoxFuture<'static, ()>) -> TaskHandle {
    let handle = TaskHandle::new();
    let token = handle.token.clone();
    let finished = handle.finished.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = task => {}
        }
        finished.store(true, Ordering::SeqCst);
    });
    handle
}

/// Scheduler backed by the tokio runtime and the system clock.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    idle_budget: Duration,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            idle_budget: Duration::from_millis(50),
        }
    }

    /// Idle time reported to idle callbacks.
    pub fn with_idle_budget(mut self, budget: Duration) -> Self {
        self.idle_budget = budget;
        self
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }

    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn idle(&self, timeout: Duration) -> IdleDeadline {
        // Other ready tasks run before us; that is the idle point.
        tokio::task::yield_now().await;
        IdleDeadline {
            time_remaining: self.idle_budget.min(timeout),
            did_timeout: false,
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) -> TaskHandle {
        spawn_on_tokio(task)
    }
}

struct PendingTimer {
    due: u64,
    seq: u64,
    wake: oneshot::Sender<()>,
}

struct ManualState {
    now: u64,
    seq: u64,
    timers: Vec<PendingTimer>,
    requested: Vec<Duration>,
    idle_budget: Duration,
    idle_calls: usize,
}

/// Deterministic scheduler with a virtual clock.
///
/// `delay` parks the caller until [`ManualScheduler::advance`] moves the clock
/// past its due time. Every requested delay is recorded. Spawned tasks run on
/// the ambient tokio runtime.
#[derive(Clone)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new(start_ms: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start_ms,
                seq: 0,
                timers: Vec::new(),
                requested: Vec::new(),
                idle_budget: Duration::from_millis(50),
                idle_calls: 0,
            })),
        }
    }

    /// Idle time handed to idle callbacks. Zero simulates a busy host.
    pub fn set_idle_budget(&self, budget: Duration) {
        self.state.lock().idle_budget = budget;
    }

    /// Move the clock forward by `by`, waking every pending delay that falls due.
    ///
    /// Timers fire in due order. Delays requested by the woken tasks are only
    /// fired by a later call.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        let target = state.now + by.as_millis() as u64;
        loop {
            let next = state
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.due <= target)
                .min_by_key(|(_, t)| (t.due, t.seq))
                .map(|(i, _)| i);

            match next {
                Some(index) => {
                    let timer = state.timers.remove(index);
                    state.now = state.now.max(timer.due);
                    // Receiver gone means the waiting task was cancelled.
                    let _ = timer.wake.send(());
                }
                None => break,
            }
        }
        state.now = target;
    }

    /// Let spawned tasks run until they block on the clock.
    pub async fn settle(&self) {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    /// Every delay requested so far, in request order.
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.state.lock().requested.clone()
    }

    /// Number of delays still waiting on the clock.
    /// Timers still awaited; abandoned delays are not counted.
    pub fn pending_timers(&self) -> usize {
        self.state
            .lock()
            .timers
            .iter()
            .filter(|t| !t.wake.is_closed())
            .count()
    }

    pub fn idle_calls(&self) -> usize {
        self.state.lock().idle_calls
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> u64 {
        self.state.lock().now
    }

    async fn delay(&self, duration: Duration) {
        let wake = {
            let mut state = self.state.lock();
            state.requested.push(duration);
            let (tx, rx) = oneshot::channel();
            let seq = state.seq;
            state.seq += 1;
            let due = state.now + duration.as_millis() as u64;
            state.timers.push(PendingTimer { due, seq, wake: tx });
            rx
        };
        let _ = wake.await;
    }

    async fn idle(&self, _timeout: Duration) -> IdleDeadline {
        let budget = {
            let mut state = self.state.lock();
            state.idle_calls += 1;
            state.idle_budget
        };
        tokio::task::yield_now().await;
        IdleDeadline {
            time_remaining: budget,
            did_timeout: budget.is_zero(),
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) -> TaskHandle {
        spawn_on_tokio(task)
    }
}
