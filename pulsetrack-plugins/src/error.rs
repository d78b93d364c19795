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

//! Error collector.
//!
//! Reports errors handed to it by the host and, when enabled, panics caught
//! by a process-wide panic hook. Both go out as immediate `error` signals.

use async_trait::async_trait;
use parking_lot::RwLock;
use pulsetrack_core::event::{EventData, EventKind, EVENT_NAME_KEY};
use pulsetrack_core::plugin::{Capability, Plugin, PluginContext, PluginManifest};
use pulsetrack_core::{ConfigError, EventSender, PluginResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Plugin name of [`ErrorCollector`].
pub const PLUGIN_NAME: &str = "error";

/// Event name of reports produced by the panic hook.
pub const PANIC_EVENT: &str = "panic";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorConfig {
    /// Install a panic hook while the plugin runs
    #[serde(default = "default_capture_panics")]
    pub capture_panics: bool,
}

fn default_capture_panics() -> bool {
    true
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            capture_panics: default_capture_panics(),
        }
    }
}

impl ErrorConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}

type SenderSlot = Arc<RwLock<Option<EventSender>>>;

/// Collects host errors and panics.
pub struct ErrorCollector {
    manifest: PluginManifest,
    config: ErrorConfig,
    // Shared with the panic hook; `None` while stopped.
    sender: SenderSlot,
    hook_installed: AtomicBool,
}

impl ErrorCollector {
    pub fn new(config: ErrorConfig) -> Self {
        let manifest = PluginManifest::new(PLUGIN_NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Reports captured errors and panics")
            .requires(Capability::SendEvents);
        Self {
            manifest,
            config,
            sender: Arc::new(RwLock::new(None)),
            hook_installed: AtomicBool::new(false),
        }
    }

    /// Report an error. `extra` fields are merged over `message` and `stack`.
    pub fn capture(&self, message: &str, stack: Option<&str>, extra: Option<EventData>) -> bool {
        let mut data = EventData::new();
        data.insert("message".into(), json!(message));
        data.insert("stack".into(), json!(stack.unwrap_or_default()));
        if let Some(extra) = extra {
            data.extend(extra);
        }
        send(&self.sender, data)
    }

    /// Report `err`, with its `source()` chain as the stack.
    pub fn capture_error(&self, err: &(dyn std::error::Error + 'static)) -> bool {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        let stack = causes.join("\n");
        self.capture(&err.to_string(), Some(&stack), None)
    }

    pub fn is_capturing_panics(&self) -> bool {
        self.hook_installed.load(Ordering::SeqCst) && self.sender.read().is_some()
    }

    fn install_panic_hook(&self) {
        if self.hook_installed.swap(true, Ordering::SeqCst) {
            return;
        }
        let slot = self.sender.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = info.payload().downcast_ref::<String>() {
                s.clone()
            } else {
                "Box<dyn Any>".to_string()
            };
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_default();

            let mut data = EventData::new();
            data.insert(EVENT_NAME_KEY.into(), json!(PANIC_EVENT));
            data.insert("message".into(), json!(message));
            data.insert("stack".into(), json!(location));
            data.insert(
                "thread".into(),
                json!(std::thread::current().name().unwrap_or("<unnamed>")),
            );
            send(&slot, data);

            previous(info);
        }));
        tracing::debug!("Panic hook installed");
    }
}

fn send(slot: &SenderSlot, data: EventData) -> bool {
    match slot.read().as_ref() {
        Some(sender) => sender.send_immediate(EventKind::Error, data),
        None => false,
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new(ErrorConfig::default())
    }
}

#[async_trait]
impl Plugin for ErrorCollector {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, ctx: &PluginContext) -> PluginResult<()> {
        *self.sender.write() = Some(ctx.sender().clone());
        Ok(())
    }

    async fn start(&self) -> PluginResult<()> {
        if self.config.capture_panics {
            self.install_panic_hook();
        }
        Ok(())
    }

    /// The panic hook stays chained but goes quiet.
    async fn stop(&self) -> PluginResult<()> {
        *self.sender.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsetrack_core::config::TrackerConfig;
    use pulsetrack_core::{ManualScheduler, RawSignal};
    use std::fmt;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|l| l as &(dyn std::error::Error + 'static))
        }
    }

    async fn loaded(config: ErrorConfig) -> (ErrorCollector, UnboundedReceiver<RawSignal>) {
        let (sender, rx) = EventSender::channel();
        let ctx = PluginContext::new(
            sender,
            Arc::new(ManualScheduler::new(0)),
            Arc::new(TrackerConfig::new("k", "http://collector.local")),
        );
        let collector = ErrorCollector::new(config);
        collector.init(&ctx).await.unwrap();
        collector.start().await.unwrap();
        (collector, rx)
    }

    #[tokio::test]
    async fn test_capture_merges_extra() {
        let (collector, mut rx) = loaded(ErrorConfig { capture_panics: false }).await;

        let mut extra = EventData::new();
        extra.insert("component".into(), json!("cart"));
        extra.insert("stack".into(), json!("at checkout()"));
        assert!(collector.capture("boom", None, Some(extra)));

        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.kind, EventKind::Error);
        assert!(signal.immediate);
        assert_eq!(signal.data["message"], "boom");
        assert_eq!(signal.data["stack"], "at checkout()");
        assert_eq!(signal.data["component"], "cart");
        assert!(!collector.is_capturing_panics());
    }

    #[tokio::test]
    async fn test_capture_error_walks_sources() {
        let (collector, mut rx) = loaded(ErrorConfig { capture_panics: false }).await;
        let err = Layer(
            "request failed",
            Some(Box::new(Layer("connection reset", Some(Box::new(Layer("eof", None)))))),
        );

        collector.capture_error(&err);
        let signal = rx.try_recv().unwrap();
        assert_eq!(signal.data["message"], "request failed");
        assert_eq!(signal.data["stack"], "caused by: connection reset\ncaused by: eof");
    }

    #[tokio::test]
    async fn test_stopped_collector_is_silent() {
        let (collector, mut rx) = loaded(ErrorConfig { capture_panics: false }).await;
        collector.stop().await.unwrap();
        assert!(!collector.capture("late", None, None));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let (collector, mut rx) = loaded(ErrorConfig::default()).await;
        assert!(collector.is_capturing_panics());

        let joined = std::thread::Builder::new()
            .name("worker".into())
            .spawn(|| panic!("worker exploded"))
            .unwrap()
            .join();
        assert!(joined.is_err());
        collector.stop().await.unwrap();

        let reports: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|s| s.event_name() == Some(PANIC_EVENT))
            .collect();
        let report = reports
            .iter()
            .find(|s| s.data["message"] == "worker exploded")
            .unwrap();
        assert!(report.immediate);
        assert_eq!(report.data["thread"], "worker");
        assert!(report.data["stack"].as_str().unwrap().contains("error.rs"));
    }
}
