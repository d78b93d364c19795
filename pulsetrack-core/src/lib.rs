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

//! Pulsetrack Event Pipeline
//!
//! Captures behavioral, performance and error signals inside a running
//! application and delivers them to a collection endpoint.
//!
//! # Architecture
//!
//! ```text
//! instrumentation ──send──▶ Tracker ──hooks──▶ DeliveryEngine ──POST──▶ collector
//!        ▲                     │                 │       │
//!        └── PluginManager ◀───┘       immediate queue   batched queue
//!                                                 └─ retry ─▶ LocalBuffer
//! ```
//!
//! - **Hooks**: ordered, short-circuiting lifecycle stages around every event
//! - **Plugins**: dependency-ordered instrumentation with declared capabilities
//! - **Delivery**: immediate and batched queues with ceilings, backoff and an
//!   optional local buffer for offline replay
//! - **Scheduler**: timers and idle windows behind a trait, with a manual
//!   clock for deterministic tests
//!
//! # Example
//!
//! ```rust,ignore
//! use pulsetrack_core::{TrackerConfig, TrackerHost};
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = TrackerHost::new();
//!     let tracker = host
//!         .init(TrackerConfig::new("api-key", "https://collector.example.com/track"))
//!         .await
//!         .unwrap();
//!
//!     tracker.track_event("signup", None, true).await;
//!     host.destroy().await;
//! }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod hooks;
pub mod logging;
pub mod plugin;
pub mod scheduler;
pub mod sender;
pub mod tracker;

// Re-exports
pub use config::{RetryConfig, StorageConfig, TrackerConfig};
pub use delivery::{
    DeliveryEngine, DeliveryStats, DeliveryUnit, HttpTransport, LocalBuffer, QueueStatus,
    Transport,
};
pub use error::{
    ConfigError, DeliveryError, PluginError, PluginResult, TrackerError, TrackerResult,
};
pub use event::{EventData, EventKind, RawSignal, TrackEvent};
pub use hooks::{
    callback, AsyncHookHandler, DispatchOutcome, HookConfig, HookDispatcher, HookError,
    HookHandler, HookId, HookOutcome, HookPriority, LifecycleContext, LifecycleHook,
};
pub use logging::{init_logging, LogConfig};
pub use plugin::{
    Capability, CapabilitySet, Plugin, PluginContext, PluginInfo, PluginManager, PluginManifest,
    PluginState,
};
pub use scheduler::{IdleDeadline, ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use sender::EventSender;
pub use tracker::{Tracker, TrackerBuilder, TrackerHost, WeakTracker};
