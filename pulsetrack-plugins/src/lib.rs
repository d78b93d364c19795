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

//! Pulsetrack Instrumentation Plugins
//!
//! Collectors that feed a [`pulsetrack_core::Tracker`] through its uniform
//! event sender:
//!
//! - [`white_screen`]: blank page detection by viewport sampling
//! - [`behavior`]: page views, stay time, clicks, route changes, breadcrumbs
//! - [`http`]: a `reqwest` client wrapper that records every request
//! - [`error`]: captured errors and panics
//!
//! # Example
//!
//! ```rust,ignore
//! use pulsetrack_core::{Tracker, TrackerConfig};
//! use pulsetrack_plugins::{BehaviorCollector, ErrorCollector, PageInfo};
//! use std::sync::Arc;
//!
//! let behavior = Arc::new(BehaviorCollector::default());
//! let tracker = Tracker::builder(TrackerConfig::new("api-key", "https://collector.example.com/track"))
//!     .plugin(behavior.clone())
//!     .plugin(Arc::new(ErrorCollector::default()))
//!     .build()
//!     .await?;
//!
//! behavior.page_view(PageInfo::new("/home"));
//! ```

pub mod behavior;
pub mod error;
pub mod http;
pub mod white_screen;

// Re-exports
pub use behavior::{
    BehaviorCollector, BehaviorConfig, Breadcrumb, BreadcrumbStore, ClickTarget, PageInfo,
};
pub use error::{ErrorCollector, ErrorConfig};
pub use http::InstrumentedClient;
pub use white_screen::{
    BlankReason, ElementInfo, PageProbe, ReadyState, Rect, StaticPage, Viewport,
    WhiteScreenConfig, WhiteScreenDetector, WhiteScreenInfo, WhiteScreenPlugin,
};
