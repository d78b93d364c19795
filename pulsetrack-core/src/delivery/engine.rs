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

//! Dual-queue delivery engine
//!
//! Immediate events are sent right away on their own task; batched events
//! accumulate until either `batch_limit` is reached or the batch interval
//! timer fires. Both queues have hard ceilings: once full, new events are
//! dropped and counted. Failed sends are retried with exponential backoff
//! and, when attempts run out, buffered locally or dropped. After
//! [`DeliveryEngine::shutdown`] no backoff timer is left running: units
//! waiting for a retry are buffered or dropped at once.

use super::buffer::LocalBuffer;
use super::retry::RetryPolicy;
use super::transport::Transport;
use super::{DeliveryStats, DeliveryUnit, QueueStatus};
use crate::config::TrackerConfig;
use crate::event::TrackEvent;
use crate::scheduler::{Scheduler, TaskHandle};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Logs at `info` in debug mode and at `debug` otherwise.
macro_rules! transition {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Queue limits and timing, derived from [`TrackerConfig`].
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub batch_limit: usize,
    pub immediate_max_size: usize,
    pub batch_max_size: usize,
    pub batch_interval: Duration,
    pub retry: RetryPolicy,
    pub debug: bool,
}

impl From<&TrackerConfig> for DeliverySettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            batch_limit: config.batch_limit,
            immediate_max_size: config.immediate_max_size,
            batch_max_size: config.batch_max_size,
            batch_interval: config.batch_interval(),
            retry: RetryPolicy::from(&config.retry),
            debug: config.debug,
        }
    }
}

/// How a unit's delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Buffered,
    Dropped,
}

#[derive(Default)]
struct Queues {
    /// In-flight immediate events keyed by sequence number.
    immediate: Vec<(u64, TrackEvent)>,
    batch: Vec<TrackEvent>,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    buffered: AtomicU64,
}

struct EngineInner {
    settings: DeliverySettings,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    queues: Mutex<Queues>,
    next_seq: AtomicU64,
    counters: Counters,
    buffer: Option<Mutex<LocalBuffer>>,
    replaying: AtomicBool,
    timer: Mutex<Option<TaskHandle>>,
    /// Cancelled by shutdown; aborts pending backoff waits.
    closing: CancellationToken,
}

/// Handle to the delivery engine. Cloning shares the queues.
#[derive(Clone)]
pub struct DeliveryEngine {
    inner: Arc<EngineInner>,
}

impl DeliveryEngine {
    pub fn new(
        settings: DeliverySettings,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        buffer: Option<LocalBuffer>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                settings,
                transport,
                scheduler,
                queues: Mutex::new(Queues::default()),
                next_seq: AtomicU64::new(0),
                counters: Counters::default(),
                buffer: buffer.map(Mutex::new),
                replaying: AtomicBool::new(false),
                timer: Mutex::new(None),
                closing: CancellationToken::new(),
            }),
        }
    }

    /// Start the batch interval timer and replay anything left in the local buffer.
    pub fn start(&self) {
        let mut timer = self.inner.timer.lock();
        if timer.is_none() {
            let engine = self.clone();
            let interval = self.inner.settings.batch_interval;
            let scheduler = self.inner.scheduler.clone();
            *timer = Some(self.inner.scheduler.spawn(Box::pin(async move {
                loop {
                    scheduler.delay(interval).await;
                    engine.flush();
                }
            })));
        }
        drop(timer);
        schedule_replay(&self.inner);
    }

    /// Queue an event. Returns `false` if the target queue was full and the event was dropped.
    pub fn enqueue(&self, event: TrackEvent, immediate: bool) -> bool {
        if immediate {
            self.enqueue_immediate(event)
        } else {
            self.enqueue_batched(event)
        }
    }

    fn enqueue_immediate(&self, event: TrackEvent) -> bool {
        let inner = &self.inner;
        let seq = {
            let mut queues = inner.queues.lock();
            if queues.immediate.len() >= inner.settings.immediate_max_size {
                drop(queues);
                inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    event = %event.name,
                    limit = inner.settings.immediate_max_size,
                    "Immediate queue full, event dropped"
                );
                return false;
            }
            let seq = inner.next_seq.fetch_add(1, Ordering::Relaxed);
            queues.immediate.push((seq, event.clone()));
            seq
        };
        inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        transition!(inner.settings.debug, event = %event.name, "Immediate event enqueued");

        let task_inner = inner.clone();
        inner.scheduler.spawn(Box::pin(async move {
            deliver_unit(task_inner.clone(), DeliveryUnit::Single(event)).await;
            task_inner.queues.lock().immediate.retain(|(s, _)| *s != seq);
        }));
        true
    }

    fn enqueue_batched(&self, event: TrackEvent) -> bool {
        let inner = &self.inner;
        let name = event.name.clone();
        let ready = {
            let mut queues = inner.queues.lock();
            if queues.batch.len() >= inner.settings.batch_max_size {
                drop(queues);
                inner.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    event = %name,
                    limit = inner.settings.batch_max_size,
                    "Batch queue full, event dropped"
                );
                return false;
            }
            queues.batch.push(event);
            if queues.batch.len() >= inner.settings.batch_limit {
                Some(std::mem::take(&mut queues.batch))
            } else {
                None
            }
        };
        inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        transition!(inner.settings.debug, event = %name, "Batched event enqueued");

        if let Some(batch) = ready {
            transition!(inner.settings.debug, events = batch.len(), "Batch limit reached, flushing");
            self.spawn_delivery(DeliveryUnit::Batch(batch));
        }
        true
    }

    /// Flush the batched queue if it is non-empty. Returns whether a flush was started.
    pub fn flush(&self) -> bool {
        let batch = std::mem::take(&mut self.inner.queues.lock().batch);
        if batch.is_empty() {
            return false;
        }
        transition!(self.inner.settings.debug, events = batch.len(), "Flushing batch");
        self.spawn_delivery(DeliveryUnit::Batch(batch));
        true
    }

    fn spawn_delivery(&self, unit: DeliveryUnit) -> TaskHandle {
        let inner = self.inner.clone();
        self.inner
            .scheduler
            .spawn(Box::pin(async move {
                deliver_unit(inner, unit).await;
            }))
    }

    /// Flush pending events, stop the batch timer and end every retry backoff.
    ///
    /// The final flush still gets one send; units that fail it, or that were
    /// waiting for a retry, are buffered or dropped without further attempts.
    pub fn shutdown(&self) {
        self.inner.closing.cancel();
        self.flush();
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closing.is_cancelled()
    }

    pub fn status(&self) -> QueueStatus {
        let queues = self.inner.queues.lock();
        QueueStatus {
            immediate: queues.immediate.len(),
            batch: queues.batch.len(),
        }
    }

    pub fn stats(&self) -> DeliveryStats {
        let c = &self.inner.counters;
        DeliveryStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            buffered: c.buffered.load(Ordering::Relaxed),
        }
    }

    /// Events currently held in the local buffer.
    pub fn buffered_events(&self) -> usize {
        self.inner
            .buffer
            .as_ref()
            .map(|b| b.lock().event_count())
            .unwrap_or(0)
    }
}

/// Send `unit`, retrying with backoff, then buffer or drop it.
fn deliver_unit(inner: Arc<EngineInner>, unit: DeliveryUnit) -> BoxFuture<'static, DeliveryOutcome> {
    Box::pin(async move {
        let debug = inner.settings.debug;
        let policy = inner.settings.retry;
        let count = unit.event_count() as u64;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match inner.transport.send(&unit).await {
                Ok(()) => {
                    inner.counters.delivered.fetch_add(count, Ordering::Relaxed);
                    transition!(debug, events = count, attempts, "Unit delivered");
                    schedule_replay(&inner);
                    return DeliveryOutcome::Delivered;
                }
                Err(e) if inner.closing.is_cancelled() => {
                    tracing::warn!(error = %e, events = count, attempts, "Delivery failed during shutdown");
                    return exhaust(&inner, unit);
                }
                Err(e) if policy.should_retry(attempts) => {
                    inner.counters.retried.fetch_add(1, Ordering::Relaxed);
                    let delay = policy.delay_after_attempt(attempts);
                    transition!(
                        debug,
                        error = %e,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Delivery failed, retrying"
                    );
                    tokio::select! {
                        _ = inner.scheduler.delay(delay) => {}
                        _ = inner.closing.cancelled() => {
                            transition!(debug, events = count, attempts, "Retry abandoned on shutdown");
                            return exhaust(&inner, unit);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, events = count, attempts, "Delivery attempts exhausted");
                    return exhaust(&inner, unit);
                }
            }
        }
    })
}

fn exhaust(inner: &EngineInner, unit: DeliveryUnit) -> DeliveryOutcome {
    let count = unit.event_count() as u64;
    let Some(buffer) = inner.buffer.as_ref() else {
        inner.counters.dropped.fetch_add(count, Ordering::Relaxed);
        transition!(inner.settings.debug, events = count, "Unit dropped");
        return DeliveryOutcome::Dropped;
    };

    let now = inner.scheduler.now_ms();
    match buffer.lock().push(unit, now) {
        Ok(evicted) => {
            inner.counters.buffered.fetch_add(count, Ordering::Relaxed);
            if evicted > 0 {
                inner.counters.dropped.fetch_add(evicted as u64, Ordering::Relaxed);
            }
            transition!(inner.settings.debug, events = count, evicted, "Unit buffered locally");
            DeliveryOutcome::Buffered
        }
        Err(e) => {
            tracing::error!(error = %e, events = count, "Local buffer write failed, unit dropped");
            inner.counters.dropped.fetch_add(count, Ordering::Relaxed);
            DeliveryOutcome::Dropped
        }
    }
}

/// Replay buffered units on a background task, unless a replay is already running.
fn schedule_replay(inner: &Arc<EngineInner>) {
    let Some(buffer) = inner.buffer.as_ref() else {
        return;
    };
    if inner.closing.is_cancelled()
        || buffer.lock().is_empty()
        || inner.replaying.swap(true, Ordering::SeqCst)
    {
        return;
    }

    let task_inner = inner.clone();
    inner.scheduler.spawn(Box::pin(async move {
        let units = match task_inner.buffer.as_ref() {
            Some(buffer) => buffer.lock().take_all(task_inner.scheduler.now_ms()),
            None => Ok(Vec::new()),
        };
        match units {
            Ok(units) => {
                transition!(task_inner.settings.debug, units = units.len(), "Replaying buffered units");
                for unit in units {
                    deliver_unit(task_inner.clone(), unit).await;
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to read local buffer"),
        }
        task_inner.replaying.store(false, Ordering::SeqCst);
    }));
}
