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

//! Hook dispatcher: ordered, short-circuiting invocation of lifecycle hooks.

use super::config::HookConfig;
use super::handlers::{AsyncHookHandler, HookError, HookOutcome};
use super::kinds::{LifecycleContext, LifecycleHook};
use super::registry::{HookId, HookPriority, HookRegistry};
use crate::scheduler::{Scheduler, TokioScheduler};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one `trigger` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every handler ran (or there were none).
    Continue,
    /// A handler returned [`HookOutcome::Stop`].
    Stopped,
}

impl DispatchOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(self, DispatchOutcome::Stopped)
    }
}

/// Dispatcher for lifecycle hooks.
///
/// Handlers for one stage run sequentially in priority order (registration
/// order within a priority). A failing or timed-out handler is logged and
/// skipped. Timeouts are measured on the dispatcher's [`Scheduler`].
/// Registration for a stage outside the configured enabled set is a silent
/// no-op.
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
    config: HookConfig,
    scheduler: Arc<dyn Scheduler>,
}

impl HookDispatcher {
    pub fn new(config: HookConfig) -> Self {
        Self {
            registry: Arc::new(HookRegistry::new()),
            config,
            scheduler: Arc::new(TokioScheduler::new()),
        }
    }

    /// Time handler timeouts on `scheduler`.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Create a dispatcher with every stage enabled.
    pub fn with_defaults() -> Self {
        Self::new(HookConfig::default())
    }

    /// Register `handler` for `hook` at the default priority.
    ///
    /// Returns `None` when `hook` is not enabled.
    pub fn register(&self, hook: LifecycleHook, handler: AsyncHookHandler) -> Option<HookId> {
        self.register_with_priority(hook, handler, HookPriority::default())
    }

    pub fn register_with_priority(
        &self,
        hook: LifecycleHook,
        handler: AsyncHookHandler,
        priority: HookPriority,
    ) -> Option<HookId> {
        if !self.config.is_enabled(hook) {
            tracing::debug!(hook = %hook, handler = handler.name(), "Hook disabled, registration ignored");
            return None;
        }
        let id = self.registry.insert(hook, handler, priority);
        tracing::debug!(hook = %hook, hook_id = %id, "Hook registered");
        Some(id)
    }

    /// Remove one handler by id, or every handler for `hook` when `id` is `None`.
    ///
    /// Returns the number of handlers removed.
    pub fn remove(&self, hook: LifecycleHook, id: Option<HookId>) -> usize {
        match id {
            Some(id) => usize::from(self.registry.remove(hook, id)),
            None => self.registry.remove_all(hook),
        }
    }

    /// Invoke every handler for `hook` in order.
    pub async fn trigger(
        &self,
        hook: LifecycleHook,
        context: &mut LifecycleContext,
    ) -> DispatchOutcome {
        if !self.config.is_enabled(hook) {
            return DispatchOutcome::Continue;
        }

        // Snapshot so no registry guard is held across an await.
        let hooks = self.registry.hooks_for(hook);
        if hooks.is_empty() {
            return DispatchOutcome::Continue;
        }

        let start = Instant::now();
        let timeout = self.config.default_timeout();
        tracing::debug!(hook = %hook, hook_count = hooks.len(), "Dispatching hook");

        for registered in hooks {
            let result = self.execute_with_timeout(&registered.handler, hook, context, timeout).await;

            match result {
                Ok(HookOutcome::Continue) => {}
                Ok(HookOutcome::Stop) => {
                    tracing::debug!(
                        hook = %hook,
                        hook_id = %registered.id,
                        handler = registered.handler.name(),
                        "Hook chain stopped"
                    );
                    return DispatchOutcome::Stopped;
                }
                Err(e) => {
                    tracing::error!(
                        hook = %hook,
                        hook_id = %registered.id,
                        handler = registered.handler.name(),
                        error = %e,
                        "Hook handler failed"
                    );
                }
            }
        }

        tracing::debug!(
            hook = %hook,
            total_time_us = start.elapsed().as_micros() as u64,
            "Hook dispatch completed"
        );
        DispatchOutcome::Continue
    }

    async fn execute_with_timeout(
        &self,
        handler: &AsyncHookHandler,
        hook: LifecycleHook,
        context: &mut LifecycleContext,
        timeout: Duration,
    ) -> Result<HookOutcome, HookError> {
        tokio::select! {
            biased;
            result = handler.handle(hook, context) => result,
            _ = self.scheduler.delay(timeout) => Err(HookError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Handlers registered for `hook`, or across all stages when `None`.
    pub fn hook_count(&self, hook: Option<LifecycleHook>) -> usize {
        match hook {
            Some(hook) => self.registry.count(hook),
            None => self.registry.total_count(),
        }
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.registry.clear();
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }
}
