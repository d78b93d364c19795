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

//! Lifecycle hook infrastructure.
//!
//! Every reported signal passes through named stages:
//!
//! - **BEFORE_COLLECT**: raw signal received; a `Stop` vetoes the event
//! - **AFTER_COLLECT**: canonical event built (informational)
//! - **BEFORE_REPORT**: about to enqueue; a `Stop` discards the event
//! - **AFTER_REPORT**: enqueued
//!
//! plus the tracker-level stages INIT, BEFORE_INIT, BEFORE_DESTROY and DESTROY.
//!
//! # Example
//!
//! ```rust,ignore
//! use pulsetrack_core::hooks::{callback, HookOutcome, LifecycleHook};
//!
//! tracker.on(LifecycleHook::BeforeReport, callback("drop-debug", |_, ctx| {
//!     let is_debug = ctx.event.as_ref().map_or(false, |e| e.name.starts_with("debug_"));
//!     Ok(if is_debug { HookOutcome::Stop } else { HookOutcome::Continue })
//! }));
//! ```

mod config;
mod dispatcher;
mod handlers;
mod kinds;
mod registry;

pub use config::HookConfig;
pub use dispatcher::{DispatchOutcome, HookDispatcher};
pub use handlers::{callback, AsyncHookHandler, CallbackHandler, HookError, HookHandler, HookOutcome};
pub use kinds::{LifecycleContext, LifecycleHook};
pub use registry::{HookId, HookPriority, HookRegistry, RegisteredHook};
