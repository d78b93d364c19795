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

//! User behavior collectors.
//!
//! The host forwards page lifecycle and input notifications; the collector
//! turns them into `behavior` signals:
//!
//! | notification     | `eventName`   | delivery  |
//! |------------------|---------------|-----------|
//! | `page_view`      | `pv`          | immediate |
//! | `page_hide`      | `stayTime`    | batched, only after more than `min_stay_ms` |
//! | `click`          | `click`       | batched, only for tags in `mount_list` |
//! | `route_change`   | `routeChange` | batched   |

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pulsetrack_core::event::{EventData, EventKind, EVENT_NAME_KEY, PAGE_VIEW};
use pulsetrack_core::plugin::{Capability, Plugin, PluginContext, PluginManifest};
use pulsetrack_core::scheduler::Scheduler;
use pulsetrack_core::{ConfigError, EventSender, PluginResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Plugin name of [`BehaviorCollector`].
pub const PLUGIN_NAME: &str = "behavior";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Lowercase tag names whose clicks are collected.
    #[serde(default = "default_mount_list")]
    pub mount_list: Vec<String>,

    /// Stay times up to this many milliseconds are not reported.
    #[serde(default = "default_min_stay_ms")]
    pub min_stay_ms: u64,

    /// Characters of element text kept with a click.
    #[serde(default = "default_click_text_limit")]
    pub click_text_limit: usize,

    /// Recent behaviors kept for error context.
    #[serde(default = "default_breadcrumb_capacity")]
    pub breadcrumb_capacity: usize,
}

fn default_mount_list() -> Vec<String> {
    ["button", "a", "input"].into_iter().map(String::from).collect()
}

fn default_min_stay_ms() -> u64 {
    1000
}

fn default_click_text_limit() -> usize {
    100
}

fn default_breadcrumb_capacity() -> usize {
    20
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            mount_list: default_mount_list(),
            min_stay_ms: default_min_stay_ms(),
            click_text_limit: default_click_text_limit(),
            breadcrumb_capacity: default_breadcrumb_capacity(),
        }
    }
}

impl BehaviorConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn with_mount_list<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mount_list = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Where the user currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub pathname: String,
    pub title: String,
    pub url: String,
    pub referrer: String,
}

impl PageInfo {
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// The element a click landed on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClickTarget {
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    pub text: String,
}

impl ClickTarget {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// One remembered behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct Breadcrumb {
    pub event_name: String,
    pub timestamp: u64,
    pub data: EventData,
}

/// Fixed-capacity store of recent behaviors; the oldest entry goes first.
#[derive(Debug)]
pub struct BreadcrumbStore {
    entries: Mutex<VecDeque<Breadcrumb>>,
    capacity: usize,
}

impl BreadcrumbStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn add(&self, crumb: Breadcrumb) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(crumb);
    }

    /// Entries, oldest first.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

struct Wiring {
    sender: EventSender,
    scheduler: Arc<dyn Scheduler>,
}

#[derive(Default)]
struct Session {
    page: Option<PageInfo>,
    page_start: Option<u64>,
}

/// Collects page views, stay time, clicks and route changes.
pub struct BehaviorCollector {
    manifest: PluginManifest,
    config: BehaviorConfig,
    breadcrumbs: BreadcrumbStore,
    wiring: RwLock<Option<Wiring>>,
    session: Mutex<Session>,
}

impl BehaviorCollector {
    pub fn new(config: BehaviorConfig) -> Self {
        let manifest = PluginManifest::new(PLUGIN_NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Page view, stay time, click and route collectors")
            .requires(Capability::SendEvents)
            .provides(Capability::custom("breadcrumbs"));
        Self {
            manifest,
            breadcrumbs: BreadcrumbStore::new(config.breadcrumb_capacity),
            config,
            wiring: RwLock::new(None),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn breadcrumbs(&self) -> &BreadcrumbStore {
        &self.breadcrumbs
    }

    /// A page was shown. Starts the stay-time clock.
    pub fn page_view(&self, page: PageInfo) -> bool {
        let Some(now) = self.now_ms() else {
            return false;
        };
        let mut data = self.page_data(&page, now);
        data.insert("title".into(), json!(page.title));
        data.insert("url".into(), json!(page.url));
        data.insert("referrer".into(), json!(page.referrer));

        {
            let mut session = self.session.lock();
            session.page = Some(page);
            session.page_start = Some(now);
        }
        self.emit(PAGE_VIEW, data, true)
    }

    /// The page was hidden or unloaded.
    ///
    /// Reports the stay time when it exceeds `min_stay_ms`. Returns whether
    /// a signal was sent.
    pub fn page_hide(&self) -> bool {
        let Some(now) = self.now_ms() else {
            return false;
        };
        let (page, start) = {
            let mut session = self.session.lock();
            match (session.page.clone(), session.page_start.take()) {
                (Some(page), Some(start)) => (page, start),
                _ => return false,
            }
        };

        let duration = now.saturating_sub(start);
        if duration <= self.config.min_stay_ms {
            tracing::debug!(duration, "Stay time below threshold, not reported");
            return false;
        }
        let mut data = self.page_data(&page, now);
        data.insert("duration".into(), json!(duration));
        data.insert("startTime".into(), json!(start));
        self.emit("stayTime", data, false)
    }

    /// A click landed on `target`. Only tags in the mount list are collected.
    pub fn click(&self, target: ClickTarget) -> bool {
        let tag = target.tag_name.to_lowercase();
        if !self.config.mount_list.iter().any(|t| *t == tag) {
            return false;
        }
        let Some(now) = self.now_ms() else {
            return false;
        };

        let page = self.session.lock().page.clone().unwrap_or_default();
        let mut data = self.page_data(&page, now);
        let text: String = target.text.chars().take(self.config.click_text_limit).collect();
        data.insert("tagName".into(), json!(tag));
        data.insert("id".into(), json!(target.id));
        data.insert("className".into(), json!(target.class_name));
        data.insert("textContent".into(), json!(text));
        self.emit("click", data, false)
    }

    /// Client-side navigation to `page`. Restarts the stay-time clock.
    pub fn route_change(&self, page: PageInfo) -> bool {
        let Some(now) = self.now_ms() else {
            return false;
        };
        let mut data = self.page_data(&page, now);
        data.insert("pathname".into(), json!(page.pathname));
        data.insert("title".into(), json!(page.title));

        {
            let mut session = self.session.lock();
            session.page = Some(page);
            session.page_start = Some(now);
        }
        self.emit("routeChange", data, false)
    }

    fn now_ms(&self) -> Option<u64> {
        let wiring = self.wiring.read();
        match wiring.as_ref() {
            Some(wiring) => Some(wiring.scheduler.now_ms()),
            None => {
                tracing::debug!("Behavior collector not initialized, notification ignored");
                None
            }
        }
    }

    fn page_data(&self, page: &PageInfo, now: u64) -> EventData {
        let mut data = EventData::new();
        data.insert("page".into(), json!(page.pathname));
        data.insert("timestamp".into(), json!(now));
        data
    }

    fn emit(&self, name: &str, mut data: EventData, immediate: bool) -> bool {
        data.insert("type".into(), json!(name));
        data.insert(EVENT_NAME_KEY.into(), Value::String(name.to_string()));
        let timestamp = data.get("timestamp").and_then(Value::as_u64).unwrap_or(0);
        self.breadcrumbs.add(Breadcrumb {
            event_name: name.to_string(),
            timestamp,
            data: data.clone(),
        });

        let wiring = self.wiring.read();
        let Some(wiring) = wiring.as_ref() else {
            return false;
        };
        if immediate {
            wiring.sender.send_immediate(EventKind::Behavior, data)
        } else {
            wiring.sender.send(EventKind::Behavior, data)
        }
    }
}

impl Default for BehaviorCollector {
    fn default() -> Self {
        Self::new(BehaviorConfig::default())
    }
}

#[async_trait]
impl Plugin for BehaviorCollector {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, ctx: &PluginContext) -> PluginResult<()> {
        *self.wiring.write() = Some(Wiring {
            sender: ctx.sender().clone(),
            scheduler: ctx.scheduler(),
        });
        Ok(())
    }

    async fn stop(&self) -> PluginResult<()> {
        *self.wiring.write() = None;
        self.breadcrumbs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsetrack_core::config::TrackerConfig;
    use pulsetrack_core::{ManualScheduler, RawSignal};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn wired(
        config: BehaviorConfig,
    ) -> (BehaviorCollector, ManualScheduler, UnboundedReceiver<RawSignal>) {
        let scheduler = ManualScheduler::new(10_000);
        let (sender, rx) = EventSender::channel();
        let ctx = PluginContext::new(
            sender,
            Arc::new(scheduler.clone()),
            Arc::new(TrackerConfig::new("k", "http://collector.local")),
        );
        let collector = BehaviorCollector::new(config);
        collector.init(&ctx).await.unwrap();
        (collector, scheduler, rx)
    }

    #[tokio::test]
    async fn test_page_view_is_immediate() {
        let (collector, _scheduler, mut rx) = wired(BehaviorConfig::default()).await;
        assert!(collector.page_view(PageInfo::new("/home").with_title("Home")));

        let signal = rx.try_recv().unwrap();
        assert!(signal.immediate);
        assert_eq!(signal.kind, EventKind::Behavior);
        assert_eq!(signal.event_name(), Some("pv"));
        assert_eq!(signal.data["page"], "/home");
        assert_eq!(signal.data["title"], "Home");
    }

    #[tokio::test]
    async fn test_stay_time_threshold() {
        let (collector, scheduler, mut rx) = wired(BehaviorConfig::default()).await;

        collector.page_view(PageInfo::new("/a"));
        scheduler.advance(Duration::from_millis(1_000));
        assert!(!collector.page_hide());

        collector.page_view(PageInfo::new("/b"));
        scheduler.advance(Duration::from_millis(1_001));
        assert!(collector.page_hide());
        // The clock is consumed by the first hide.
        assert!(!collector.page_hide());

        let stay: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|s| s.event_name() == Some("stayTime"))
            .collect();
        assert_eq!(stay.len(), 1);
        assert_eq!(stay[0].data["duration"], 1_001);
        assert_eq!(stay[0].data["page"], "/b");
        assert!(!stay[0].immediate);
    }

    #[tokio::test]
    async fn test_click_mount_list_and_truncation() {
        let config = BehaviorConfig::default().with_mount_list(["button"]);
        let (collector, _scheduler, mut rx) = wired(config).await;

        assert!(!collector.click(ClickTarget::new("div").with_text("ignored")));
        let long = "x".repeat(250);
        assert!(collector.click(ClickTarget::new("BUTTON").with_id("buy").with_text(long)));

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.event_name(), Some("click"));
        assert_eq!(signal.data["tagName"], "button");
        assert_eq!(signal.data["textContent"].as_str().map(str::len), Some(100));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_breadcrumbs_are_bounded() {
        let config = BehaviorConfig {
            breadcrumb_capacity: 2,
            ..Default::default()
        };
        let (collector, _scheduler, _rx) = wired(config).await;

        collector.route_change(PageInfo::new("/one"));
        collector.route_change(PageInfo::new("/two"));
        collector.click(ClickTarget::new("a"));

        let crumbs = collector.breadcrumbs().snapshot();
        let names: Vec<_> = crumbs.iter().map(|c| c.event_name.as_str()).collect();
        assert_eq!(names, vec!["routeChange", "click"]);
        assert_eq!(crumbs[0].data["pathname"], "/two");
        assert_eq!(crumbs[1].data["page"], "/two");
    }

    #[tokio::test]
    async fn test_uninitialized_collector_sends_nothing() {
        let collector = BehaviorCollector::default();
        assert!(!collector.page_view(PageInfo::new("/")));
        assert!(!collector.click(ClickTarget::new("button")));
        assert!(collector.breadcrumbs().is_empty());
    }
}
