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

//! Event tracker: turns raw signals into canonical events.
//!
//! ```text
//! send(kind, data) ─▶ report ─▶ BEFORE_COLLECT ─▶ build TrackEvent ─▶ AFTER_COLLECT
//!                                                                        │
//!             AFTER_REPORT ◀─ enqueue (immediate | batched) ◀─ BEFORE_REPORT
//! ```

mod builder;
mod host;

pub use builder::TrackerBuilder;
pub use host::TrackerHost;

use crate::config::TrackerConfig;
use crate::delivery::{DeliveryEngine, DeliveryStats, QueueStatus};
use crate::event::{EventClock, EventData, EventKind, RawSignal, TrackEvent, EVENT_NAME_KEY, PAGE_VIEW};
use crate::hooks::{AsyncHookHandler, HookDispatcher, HookId, LifecycleContext, LifecycleHook};
use crate::plugin::PluginManager;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::sender::EventSender;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct TrackerInner {
    config: RwLock<Arc<TrackerConfig>>,
    dispatcher: HookDispatcher,
    engine: DeliveryEngine,
    plugins: PluginManager,
    scheduler: Arc<dyn Scheduler>,
    clock: EventClock,
    sender: EventSender,
    pump: Mutex<Option<TaskHandle>>,
    destroyed: AtomicBool,
}

/// Shared handle to one tracker instance.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

/// Non-owning tracker handle, held by plugin contexts.
#[derive(Clone)]
pub struct WeakTracker {
    inner: Weak<TrackerInner>,
}

impl WeakTracker {
    pub fn upgrade(&self) -> Option<Tracker> {
        self.inner.upgrade().map(|inner| Tracker { inner })
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("server_url", &self.config().server_url())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Tracker {
    /// Start building a tracker for `config`.
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    pub fn downgrade(&self) -> WeakTracker {
        WeakTracker {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Report a signal. Error signals, page views and `immediate` signals skip the batch.
    pub async fn report(&self, kind: impl Into<EventKind>, data: EventData, immediate: bool) {
        self.report_signal(RawSignal::new(kind, data, immediate)).await;
    }

    pub(crate) async fn report_signal(&self, mut signal: RawSignal) {
        signal.immediate = signal.immediate
            || signal.kind == EventKind::Error
            || (signal.kind == EventKind::Behavior && signal.event_name() == Some(PAGE_VIEW));
        self.run_pipeline(signal, None).await;
    }

    /// Report an event with an explicit name. No automatic escalation.
    pub async fn report_custom(
        &self,
        name: impl Into<String>,
        kind: impl Into<EventKind>,
        data: EventData,
        immediate: bool,
    ) {
        let signal = RawSignal::new(kind, data, immediate);
        self.run_pipeline(signal, Some(name.into())).await;
    }

    /// Report a business event; callers usually want `immediate = true`.
    pub async fn report_business(&self, name: impl Into<String>, data: EventData, immediate: bool) {
        self.report_custom(name, EventKind::Business, data, immediate)
            .await;
    }

    /// Manually track a named business event.
    pub async fn track_event(&self, name: impl Into<String>, data: Option<EventData>, immediate: bool) {
        self.report_custom(name, EventKind::Business, data.unwrap_or_default(), immediate)
            .await;
    }

    /// Report performance metrics (batched).
    pub async fn report_performance(&self, data: EventData) {
        self.report(EventKind::Performance, data, false).await;
    }

    /// Report a behavior of type `behavior_type` as event `behavior_<type>`.
    ///
    /// `immediate` defaults to `true` for page views.
    pub async fn report_behavior(&self, behavior_type: &str, mut data: EventData, immediate: Option<bool>) {
        data.insert(
            EVENT_NAME_KEY.to_string(),
            Value::String(format!("behavior_{}", behavior_type)),
        );
        let immediate = immediate.unwrap_or(behavior_type == PAGE_VIEW);
        self.report(EventKind::Behavior, data, immediate).await;
    }

    /// Report an error immediately.
    pub async fn report_error(&self, message: &str, stack: Option<&str>, extra: Option<EventData>) {
        let mut data = EventData::new();
        data.insert("message".into(), Value::String(message.to_string()));
        data.insert("stack".into(), Value::String(stack.unwrap_or_default().to_string()));
        if let Some(extra) = extra {
            data.extend(extra);
        }
        self.report(EventKind::Error, data, true).await;
    }

    /// Report a blank-page detection immediately.
    pub async fn report_white_screen(&self, data: EventData) {
        self.report(EventKind::WhiteScreen, data, true).await;
    }

    async fn run_pipeline(&self, signal: RawSignal, name: Option<String>) {
        if self.is_destroyed() {
            tracing::debug!(kind = %signal.kind, "Tracker destroyed, signal ignored");
            return;
        }

        let inner = &self.inner;
        let config = self.config();
        let mut ctx = LifecycleContext::new(config.clone())
            .with_tracker(self.clone())
            .with_signal(signal);

        if inner
            .dispatcher
            .trigger(LifecycleHook::BeforeCollect, &mut ctx)
            .await
            .is_stopped()
        {
            tracing::debug!("Signal vetoed before collection");
            return;
        }
        let Some(signal) = ctx.signal.take() else {
            tracing::debug!("Signal removed by hook");
            return;
        };

        let name = name
            .filter(|n| !n.is_empty())
            .or_else(|| signal.event_name().map(str::to_owned))
            .unwrap_or_else(|| TrackEvent::default_name(&signal.kind));
        let immediate = signal.immediate;
        ctx.event = Some(TrackEvent {
            name,
            kind: signal.kind,
            timestamp: inner.clock.stamp(inner.scheduler.now_ms()),
            data: signal.data,
            user_id: config.user_id.clone(),
        });

        inner
            .dispatcher
            .trigger(LifecycleHook::AfterCollect, &mut ctx)
            .await;

        if inner
            .dispatcher
            .trigger(LifecycleHook::BeforeReport, &mut ctx)
            .await
            .is_stopped()
        {
            tracing::debug!("Event vetoed before report");
            return;
        }
        let Some(event) = ctx.event.clone() else {
            return;
        };
        if self.is_destroyed() {
            tracing::debug!(event = %event.name, "Tracker destroyed during hooks, event discarded");
            return;
        }

        inner.engine.enqueue(event, immediate);

        inner
            .dispatcher
            .trigger(LifecycleHook::AfterReport, &mut ctx)
            .await;
    }

    /// Attribute subsequent events to `user_id`.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        let mut config = self.inner.config.write();
        let mut updated = TrackerConfig::clone(&config);
        updated.user_id = Some(user_id.into());
        *config = Arc::new(updated);
    }

    pub fn get_queue_status(&self) -> QueueStatus {
        self.inner.engine.status()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.inner.engine.stats()
    }

    /// Register a lifecycle hook. `None` when the hook kind is disabled.
    pub fn on(&self, hook: LifecycleHook, handler: AsyncHookHandler) -> Option<HookId> {
        self.inner.dispatcher.register(hook, handler)
    }

    /// Remove one hook by id, or all hooks of `hook` when `id` is `None`.
    pub fn off(&self, hook: LifecycleHook, id: Option<HookId>) -> usize {
        self.inner.dispatcher.remove(hook, id)
    }

    pub fn hooks(&self) -> &HookDispatcher {
        &self.inner.dispatcher
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<TrackerConfig> {
        self.inner.config.read().clone()
    }

    /// Alias of [`Tracker::config`].
    pub fn get_config(&self) -> Arc<TrackerConfig> {
        self.config()
    }

    /// The send callback handed to instrumentation.
    pub fn sender(&self) -> EventSender {
        self.inner.sender.clone()
    }

    /// Plugin manager with this tracker's context already set.
    pub fn plugins(&self) -> &PluginManager {
        &self.inner.plugins
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.inner.scheduler.clone()
    }

    /// Flush the batched queue now.
    pub fn flush(&self) -> bool {
        self.inner.engine.flush()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Tear down: destroy hooks, plugin shutdown, final flush, timer cancellation.
    ///
    /// Runs once; later calls return `false`.
    pub(crate) async fn shutdown(&self) -> bool {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let inner = &self.inner;

        let mut ctx = LifecycleContext::new(self.config()).with_tracker(self.clone());
        inner
            .dispatcher
            .trigger(LifecycleHook::BeforeDestroy, &mut ctx)
            .await;
        inner
            .dispatcher
            .trigger(LifecycleHook::Destroy, &mut ctx)
            .await;

        for (name, result) in inner.plugins.stop_all_plugins().await {
            if let Err(e) = result {
                tracing::warn!(plugin = %name, error = %e, "Plugin failed to stop during teardown");
            }
        }

        inner.engine.shutdown();
        if let Some(pump) = inner.pump.lock().take() {
            pump.cancel();
        }
        inner.dispatcher.clear();

        tracing::info!("Tracker destroyed");
        true
    }
}

#[cfg(test)]
mod tests;
