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

//! Hook handler trait and implementations.

use super::kinds::{LifecycleContext, LifecycleHook};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// What the dispatcher should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Run the next handler.
    Continue,
    /// Skip the remaining handlers; vetoes the event on veto-capable stages.
    Stop,
}

impl HookOutcome {
    pub fn is_stop(&self) -> bool {
        matches!(self, HookOutcome::Stop)
    }
}

/// Errors that can occur during hook execution.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Hook timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        HookError::ExecutionFailed(message.into())
    }
}

/// Trait for asynchronous hook handlers.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handle one lifecycle stage.
    async fn handle(
        &self,
        hook: LifecycleHook,
        context: &mut LifecycleContext,
    ) -> Result<HookOutcome, HookError>;

    /// Get the handler name.
    fn name(&self) -> &str;
}

/// Type alias for a shared async hook handler.
pub type AsyncHookHandler = Arc<dyn HookHandler>;

/// Handler that invokes a callback function.
pub struct CallbackHandler<F>
where
    F: Fn(LifecycleHook, &mut LifecycleContext) -> Result<HookOutcome, HookError> + Send + Sync,
{
    name: String,
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(LifecycleHook, &mut LifecycleContext) -> Result<HookOutcome, HookError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

#[async_trait]
impl<F> HookHandler for CallbackHandler<F>
where
    F: Fn(LifecycleHook, &mut LifecycleContext) -> Result<HookOutcome, HookError>
        + Send
        + Sync
        + 'static,
{
    async fn handle(
        &self,
        hook: LifecycleHook,
        context: &mut LifecycleContext,
    ) -> Result<HookOutcome, HookError> {
        (self.callback)(hook, context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a shared handler from a closure.
pub fn callback<F>(name: impl Into<String>, f: F) -> AsyncHookHandler
where
    F: Fn(LifecycleHook, &mut LifecycleContext) -> Result<HookOutcome, HookError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(CallbackHandler::new(name, f))
}
