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

use super::{Tracker, TrackerInner};
use crate::config::TrackerConfig;
use crate::delivery::{DeliveryEngine, DeliverySettings, HttpTransport, LocalBuffer, Transport};
use crate::error::TrackerResult;
use crate::event::EventClock;
use crate::hooks::{AsyncHookHandler, HookDispatcher, HookPriority, LifecycleContext, LifecycleHook};
use crate::plugin::{CapabilitySet, Plugin, PluginContext, PluginManager};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::sender::EventSender;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Builds a [`Tracker`], filling in production defaults for anything not supplied.
pub struct TrackerBuilder {
    config: TrackerConfig,
    transport: Option<Arc<dyn Transport>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    buffer: Option<LocalBuffer>,
    hooks: Vec<(LifecycleHook, AsyncHookHandler, HookPriority)>,
    plugins: Vec<Arc<dyn Plugin>>,
    host_capabilities: Option<CapabilitySet>,
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            transport: None,
            scheduler: None,
            buffer: None,
            hooks: Vec::new(),
            plugins: Vec::new(),
            host_capabilities: None,
        }
    }

    /// Deliver through `transport` instead of HTTP.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Buffer exhausted units in `buffer`, regardless of `storage.enabled`.
    pub fn buffer(mut self, buffer: LocalBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Register a hook before construction so it observes `BEFORE_INIT` and `INIT`.
    pub fn hook(self, hook: LifecycleHook, handler: AsyncHookHandler) -> Self {
        self.hook_with_priority(hook, handler, HookPriority::default())
    }

    pub fn hook_with_priority(
        mut self,
        hook: LifecycleHook,
        handler: AsyncHookHandler,
        priority: HookPriority,
    ) -> Self {
        self.hooks.push((hook, handler, priority));
        self
    }

    /// Register a plugin; all registered plugins are loaded once the tracker is up.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Restrict the host capabilities granted to plugins.
    pub fn host_capabilities(mut self, granted: CapabilitySet) -> Self {
        self.host_capabilities = Some(granted);
        self
    }

    /// Validate the configuration, wire the pipeline and load plugins.
    pub async fn build(self) -> TrackerResult<Tracker> {
        let config = self.config;
        config.validate()?;
        let config = Arc::new(config);

        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::new()),
        };
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let buffer = match self.buffer {
            Some(buffer) => Some(buffer),
            None if config.storage.enabled => Some(LocalBuffer::from_config(&config.storage)?),
            None => None,
        };

        let dispatcher =
            HookDispatcher::new(config.hooks.clone()).with_scheduler(scheduler.clone());
        for (hook, handler, priority) in self.hooks {
            dispatcher.register_with_priority(hook, handler, priority);
        }

        let engine = DeliveryEngine::new(
            DeliverySettings::from(config.as_ref()),
            transport,
            scheduler.clone(),
            buffer,
        );
        let (sender, mut signals) = EventSender::channel();
        let plugins = match self.host_capabilities {
            Some(granted) => PluginManager::with_host_capabilities(granted),
            None => PluginManager::new(),
        };

        let tracker = Tracker {
            inner: Arc::new(TrackerInner {
                config: RwLock::new(config.clone()),
                dispatcher,
                engine,
                plugins,
                scheduler: scheduler.clone(),
                clock: EventClock::new(),
                sender: sender.clone(),
                pump: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        };

        tracker.inner.plugins.set_context(
            PluginContext::new(sender, scheduler.clone(), config.clone())
                .with_tracker(tracker.downgrade()),
        );
        tracker.inner.plugins.register_plugins(self.plugins)?;

        let mut ctx = LifecycleContext::new(config.clone()).with_tracker(tracker.clone());
        tracker
            .inner
            .dispatcher
            .trigger(LifecycleHook::BeforeInit, &mut ctx)
            .await;

        tracker.inner.engine.start();

        let weak = tracker.downgrade();
        let pump = scheduler.spawn(Box::pin(async move {
            while let Some(signal) = signals.recv().await {
                let Some(tracker) = weak.upgrade() else {
                    break;
                };
                tracker.report_signal(signal).await;
            }
        }));
        *tracker.inner.pump.lock() = Some(pump);

        tracker
            .inner
            .dispatcher
            .trigger(LifecycleHook::Init, &mut ctx)
            .await;

        for (name, result) in tracker.inner.plugins.load_all_plugins().await {
            if let Err(e) = result {
                tracing::warn!(plugin = %name, error = %e, "Plugin failed to load");
            }
        }

        tracing::info!(
            server_url = %config.server_url(),
            batch_limit = config.batch_limit,
            plugins = tracker.inner.plugins.loaded_plugins().len(),
            "Tracker initialized"
        );
        Ok(tracker)
    }
}
