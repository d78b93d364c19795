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

use super::*;
use crate::delivery::{DeliveryUnit, Transport};
use crate::error::{DeliveryError, PluginResult};
use crate::hooks::{callback, HookError, HookHandler, HookOutcome};
use crate::plugin::{Plugin, PluginContext, PluginManifest};
use crate::scheduler::ManualScheduler;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::AtomicUsize;

#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub(crate) sent: Mutex<Vec<DeliveryUnit>>,
}

impl RecordingTransport {
    pub(crate) fn events(&self) -> Vec<TrackEvent> {
        self.sent
            .lock()
            .iter()
            .flat_map(|unit| unit.events().to_vec())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, unit: &DeliveryUnit) -> Result<(), DeliveryError> {
        self.sent.lock().push(unit.clone());
        Ok(())
    }
}

pub(crate) fn recording() -> Arc<RecordingTransport> {
    Arc::new(RecordingTransport::default())
}

fn data(pairs: &[(&str, serde_json::Value)]) -> EventData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

async fn tracker_with(
    builder: TrackerBuilder,
    transport: &Arc<RecordingTransport>,
) -> (Tracker, ManualScheduler) {
    let scheduler = ManualScheduler::new(1_000);
    let tracker = builder
        .transport(transport.clone())
        .scheduler(Arc::new(scheduler.clone()))
        .build()
        .await
        .unwrap();
    (tracker, scheduler)
}

fn config() -> TrackerConfig {
    TrackerConfig::new("key", "http://collector.local/track")
}

/// Counts invocations of one hook kind.
fn counter(hook: LifecycleHook, count: &Arc<AtomicUsize>) -> (LifecycleHook, AsyncHookHandler) {
    let count = count.clone();
    (
        hook,
        callback(format!("count-{}", hook), move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(HookOutcome::Continue)
        }),
    )
}

#[tokio::test]
async fn test_page_view_and_errors_skip_the_batch() {
    let transport = recording();
    let (tracker, scheduler) = tracker_with(Tracker::builder(config()), &transport).await;

    tracker
        .report("behavior", data(&[("eventName", json!("pv"))]), false)
        .await;
    tracker.report("error", EventData::new(), false).await;
    tracker.report("behavior", data(&[("eventName", json!("click"))]), false).await;
    scheduler.settle().await;

    let sent: Vec<_> = transport.events().into_iter().map(|e| e.name).collect();
    assert_eq!(sent, vec!["pv", "error_event"]);
    assert_eq!(tracker.get_queue_status().batch, 1);
}

#[tokio::test]
async fn test_report_custom_does_not_escalate() {
    let transport = recording();
    let (tracker, scheduler) = tracker_with(Tracker::builder(config()), &transport).await;

    tracker
        .report_custom("boom", EventKind::Error, EventData::new(), false)
        .await;
    scheduler.settle().await;

    assert!(transport.events().is_empty());
    assert_eq!(tracker.get_queue_status().batch, 1);
}

#[tokio::test]
async fn test_event_carries_kind_user_and_clock() {
    let transport = recording();
    let (tracker, scheduler) = tracker_with(Tracker::builder(config()), &transport).await;
    tracker.set_user_id("u-42");

    tracker.report_performance(data(&[("fcp", json!(120))])).await;
    tracker.flush();
    scheduler.settle().await;

    let events = transport.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "performance_event");
    assert_eq!(events[0].kind, EventKind::Performance);
    assert_eq!(events[0].timestamp, 1_000);
    assert_eq!(events[0].user_id.as_deref(), Some("u-42"));
    assert_eq!(events[0].data["fcp"], 120);
    assert_eq!(tracker.get_config().user_id.as_deref(), Some("u-42"));
}

#[tokio::test]
async fn test_before_collect_veto_creates_nothing() {
    let transport = recording();
    let after = Arc::new(AtomicUsize::new(0));
    let (hook, handler) = counter(LifecycleHook::AfterCollect, &after);
    let builder = Tracker::builder(config())
        .hook(
            LifecycleHook::BeforeCollect,
            callback("veto", |_, _| Ok(HookOutcome::Stop)),
        )
        .hook(hook, handler);
    let (tracker, scheduler) = tracker_with(builder, &transport).await;

    tracker.report_error("nope", None, None).await;
    scheduler.settle().await;

    assert_eq!(after.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.stats().enqueued, 0);
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn test_before_report_veto_skips_after_report() {
    let transport = recording();
    let after_report = Arc::new(AtomicUsize::new(0));
    let (hook, handler) = counter(LifecycleHook::AfterReport, &after_report);
    let builder = Tracker::builder(config())
        .hook(
            LifecycleHook::BeforeReport,
            callback("drop-checkout", |_, ctx| {
                let vetoed = ctx.event.as_ref().map(|e| e.name == "checkout").unwrap_or(false);
                Ok(if vetoed { HookOutcome::Stop } else { HookOutcome::Continue })
            }),
        )
        .hook(hook, handler);
    let (tracker, _scheduler) = tracker_with(builder, &transport).await;

    tracker.track_event("checkout", None, false).await;
    assert_eq!(after_report.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.get_queue_status().batch, 0);

    tracker.track_event("signup", None, false).await;
    assert_eq!(after_report.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.get_queue_status().batch, 1);
}

#[tokio::test]
async fn test_after_collect_stop_does_not_abort() {
    let transport = recording();
    let builder = Tracker::builder(config()).hook(
        LifecycleHook::AfterCollect,
        callback("informational", |_, _| Ok(HookOutcome::Stop)),
    );
    let (tracker, _scheduler) = tracker_with(builder, &transport).await;

    tracker.report_business("paid", EventData::new(), false).await;
    assert_eq!(tracker.get_queue_status().batch, 1);
}

#[tokio::test]
async fn test_hooks_rewrite_signal_and_event() {
    let transport = recording();
    let builder = Tracker::builder(config())
        .hook(
            LifecycleHook::BeforeCollect,
            callback("escalate", |_, ctx| {
                if let Some(signal) = ctx.signal.as_mut() {
                    signal.immediate = true;
                    signal
                        .data
                        .insert(EVENT_NAME_KEY.into(), json!("renamed"));
                }
                Ok(HookOutcome::Continue)
            }),
        )
        .hook(
            LifecycleHook::AfterCollect,
            callback("tag", |_, ctx| {
                if let Some(event) = ctx.event.as_mut() {
                    event.data.insert("tagged".into(), json!(true));
                }
                Ok(HookOutcome::Continue)
            }),
        );
    let (tracker, scheduler) = tracker_with(builder, &transport).await;

    tracker.report("behavior", EventData::new(), false).await;
    scheduler.settle().await;

    let events = transport.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "renamed");
    assert_eq!(events[0].data["tagged"], true);
}

#[tokio::test]
async fn test_convenience_reporters() {
    let transport = recording();
    let (tracker, scheduler) = tracker_with(Tracker::builder(config()), &transport).await;

    tracker.report_behavior("pv", EventData::new(), None).await;
    tracker.report_behavior("click", EventData::new(), None).await;
    tracker
        .report_error("bad", Some("at main"), Some(data(&[("code", json!(7))])))
        .await;
    tracker
        .report_white_screen(data(&[("emptyPoints", json!(33))]))
        .await;
    scheduler.settle().await;

    let events = transport.events();
    let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["behavior_pv", "error_event", "white_screen_event"]);
    assert_eq!(events[1].data["message"], "bad");
    assert_eq!(events[1].data["stack"], "at main");
    assert_eq!(events[1].data["code"], 7);
    assert_eq!(tracker.get_queue_status().batch, 1);
}

#[tokio::test]
async fn test_sender_feeds_the_pipeline_in_order() {
    let transport = recording();
    let (tracker, scheduler) = tracker_with(Tracker::builder(config()), &transport).await;
    let sender = tracker.sender();

    for name in ["a", "b", "c"] {
        assert!(sender.send_immediate("behavior", data(&[("eventName", json!(name))])));
    }
    scheduler.settle().await;

    let mut names: Vec<_> = transport.events().into_iter().map(|e| e.name).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(tracker.stats().enqueued, 3);
}

#[tokio::test]
async fn test_on_and_off() {
    let transport = recording();
    let (tracker, _scheduler) = tracker_with(Tracker::builder(config()), &transport).await;
    let count = Arc::new(AtomicUsize::new(0));
    let (hook, handler) = counter(LifecycleHook::AfterReport, &count);

    let id = tracker.on(hook, handler);
    assert!(id.is_some());
    tracker.track_event("one", None, false).await;
    assert_eq!(tracker.off(hook, id), 1);
    tracker.track_event("two", None, false).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_runs_once_and_flushes() {
    let transport = recording();
    let before = Arc::new(AtomicUsize::new(0));
    let destroy = Arc::new(AtomicUsize::new(0));
    let init = Arc::new(AtomicUsize::new(0));
    let (b_hook, b_handler) = counter(LifecycleHook::BeforeDestroy, &before);
    let (d_hook, d_handler) = counter(LifecycleHook::Destroy, &destroy);
    let (i_hook, i_handler) = counter(LifecycleHook::Init, &init);
    let builder = Tracker::builder(config())
        .hook(b_hook, b_handler)
        .hook(d_hook, d_handler)
        .hook(i_hook, i_handler);
    let (tracker, scheduler) = tracker_with(builder, &transport).await;
    assert_eq!(init.load(Ordering::SeqCst), 1);

    tracker.track_event("pending", None, false).await;
    assert!(tracker.shutdown().await);
    assert!(!tracker.shutdown().await);
    scheduler.settle().await;

    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(destroy.load(Ordering::SeqCst), 1);
    assert_eq!(transport.events().len(), 1);
    assert_eq!(tracker.hooks().hook_count(None), 0);

    tracker.track_event("late", None, true).await;
    scheduler.settle().await;
    assert_eq!(transport.events().len(), 1);
}

/// Destroys the tracker from inside the hook it is registered on.
struct DestroyingHandler;

#[async_trait]
impl HookHandler for DestroyingHandler {
    async fn handle(
        &self,
        _hook: LifecycleHook,
        context: &mut LifecycleContext,
    ) -> Result<HookOutcome, HookError> {
        if let Some(tracker) = context.tracker().cloned() {
            tracker.shutdown().await;
        }
        Ok(HookOutcome::Continue)
    }

    fn name(&self) -> &str {
        "destroying"
    }
}

#[tokio::test]
async fn test_destroy_during_before_report_discards_event() {
    let transport = recording();
    let builder =
        Tracker::builder(config()).hook(LifecycleHook::BeforeReport, Arc::new(DestroyingHandler));
    let (tracker, scheduler) = tracker_with(builder, &transport).await;

    tracker.report_error("mid-teardown", None, None).await;
    tracker.track_event("batched", None, false).await;
    scheduler.settle().await;

    assert!(tracker.is_destroyed());
    assert!(transport.events().is_empty());
    assert_eq!(tracker.stats().enqueued, 0);
    assert_eq!(tracker.get_queue_status(), QueueStatus { immediate: 0, batch: 0 });
}

struct EchoPlugin {
    manifest: PluginManifest,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, ctx: &PluginContext) -> PluginResult<()> {
        assert!(ctx.tracker().is_some());
        ctx.sender()
            .send_immediate("behavior", data(&[("eventName", json!("plugin_ready"))]));
        Ok(())
    }

    async fn stop(&self) -> PluginResult<()> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_builder_loads_plugins_with_context() {
    let transport = recording();
    let stopped = Arc::new(AtomicUsize::new(0));
    let plugin = Arc::new(EchoPlugin {
        manifest: PluginManifest::new("echo", "1.0.0"),
        stopped: stopped.clone(),
    });
    let (tracker, scheduler) =
        tracker_with(Tracker::builder(config()).plugin(plugin), &transport).await;
    scheduler.settle().await;

    assert!(tracker.plugins().is_loaded("echo"));
    assert_eq!(transport.events()[0].name, "plugin_ready");

    tracker.shutdown().await;
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert!(!tracker.plugins().is_loaded("echo"));
}

#[tokio::test]
async fn test_invalid_plugin_fails_build() {
    let plugin = Arc::new(EchoPlugin {
        manifest: PluginManifest::new("echo", "not-a-version"),
        stopped: Arc::new(AtomicUsize::new(0)),
    });
    let result = Tracker::builder(config())
        .transport(recording())
        .scheduler(Arc::new(ManualScheduler::new(0)))
        .plugin(plugin)
        .build()
        .await;
    assert!(matches!(result, Err(crate::error::TrackerError::Plugin(_))));
}
