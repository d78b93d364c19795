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

//! Integration tests for the event pipeline: host lifecycle, queue limits,
//! retry timing and plugin dependency order.

use async_trait::async_trait;
use parking_lot::Mutex;
use pulsetrack_core::{
    callback, DeliveryError, DeliveryUnit, EventData, HookOutcome, LifecycleHook,
    ManualScheduler, Plugin, PluginContext, PluginError, PluginManifest, PluginResult,
    RetryConfig, StorageConfig, Tracker, TrackerBuilder, TrackerConfig, TrackerHost, Transport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Records every unit and fails the first `failures` sends.
#[derive(Default)]
struct ScriptedTransport {
    sent: Mutex<Vec<DeliveryUnit>>,
    failures: AtomicUsize,
}

impl ScriptedTransport {
    fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(times),
        })
    }

    fn units(&self) -> Vec<DeliveryUnit> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, unit: &DeliveryUnit) -> Result<(), DeliveryError> {
        self.sent.lock().push(unit.clone());
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DeliveryError::Status(500));
        }
        Ok(())
    }
}

fn builder(
    config: TrackerConfig,
    transport: &Arc<ScriptedTransport>,
    scheduler: &ManualScheduler,
) -> TrackerBuilder {
    Tracker::builder(config)
        .transport(transport.clone())
        .scheduler(Arc::new(scheduler.clone()))
}

fn config() -> TrackerConfig {
    TrackerConfig::new("key", "http://collector.local/track")
}

#[tokio::test]
async fn test_destroy_then_reinit_uses_new_config() {
    let host = TrackerHost::new();
    let scheduler = ManualScheduler::new(0);
    let transport = ScriptedTransport::failing(0);
    let destroyed = Arc::new(AtomicUsize::new(0));

    let counter = destroyed.clone();
    let first = host
        .init_with(
            builder(config(), &transport, &scheduler)
                .hook(
                    LifecycleHook::BeforeDestroy,
                    callback("before", {
                        let counter = counter.clone();
                        move |_, _| {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(HookOutcome::Continue)
                        }
                    }),
                )
                .hook(
                    LifecycleHook::Destroy,
                    callback("destroy", move |_, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(HookOutcome::Continue)
                    }),
                ),
        )
        .await
        .unwrap();

    assert!(host.destroy().await);
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    assert!(first.is_destroyed());

    let second = host
        .init_with(builder(
            TrackerConfig::new("key-2", "http://other.local/track"),
            &transport,
            &scheduler,
        ))
        .await
        .unwrap();
    assert_eq!(second.get_config().server_url(), "http://other.local/track");
    assert_eq!(second.get_config().api_key(), "key-2");
    assert_eq!(second.hooks().hook_count(None), 0);

    host.destroy().await;
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_batch_limit_produces_one_flush() {
    let scheduler = ManualScheduler::new(0);
    let transport = ScriptedTransport::failing(0);
    let tracker = builder(config().with_batch_limit(5), &transport, &scheduler)
        .build()
        .await
        .unwrap();

    for i in 0..5 {
        tracker.track_event(format!("e{i}"), None, false).await;
    }
    assert_eq!(tracker.get_queue_status().batch, 0);
    scheduler.settle().await;

    let units = transport.units();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].event_count(), 5);
}

#[tokio::test]
async fn test_immediate_ceiling_keeps_oldest() {
    let scheduler = ManualScheduler::new(0);
    let transport = ScriptedTransport::failing(usize::MAX);
    let mut cfg = config();
    cfg.immediate_max_size = 3;
    let tracker = builder(cfg, &transport, &scheduler).build().await.unwrap();

    for _ in 0..4 {
        tracker.report("error", EventData::new(), true).await;
        // Let each delivery park on its retry delay.
        scheduler.settle().await;
    }

    assert_eq!(tracker.get_queue_status().immediate, 3);
    assert_eq!(tracker.stats().dropped, 1);
    assert_eq!(tracker.stats().enqueued, 3);
}

#[tokio::test]
async fn test_retry_delays_double_then_buffer() {
    let scheduler = ManualScheduler::new(0);
    let transport = ScriptedTransport::failing(usize::MAX);
    let cfg = config()
        .with_retry(RetryConfig {
            max_times: 3,
            base_delay_ms: 250,
        })
        .with_storage(StorageConfig {
            enabled: true,
            ..Default::default()
        });
    let tracker = builder(cfg, &transport, &scheduler).build().await.unwrap();
    scheduler.settle().await;
    let timers_before = scheduler.requested_delays().len();

    tracker.report_error("offline", None, None).await;
    scheduler.settle().await;
    for step in [250, 500, 1_000] {
        scheduler.advance(Duration::from_millis(step));
        scheduler.settle().await;
    }

    let retries: Vec<_> = scheduler
        .requested_delays()
        .into_iter()
        .skip(timers_before)
        .filter(|d| *d != Duration::from_millis(5_000))
        .collect();
    assert_eq!(
        retries,
        vec![Duration::from_millis(250), Duration::from_millis(500)]
    );
    // Three sends in total, the first one included.
    assert_eq!(transport.units().len(), 3);
    let stats = tracker.stats();
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.buffered, 1);
    assert_eq!(stats.dropped, 0);
}

#[tokio::test]
async fn test_destroy_cancels_pending_retry() {
    let host = TrackerHost::new();
    let scheduler = ManualScheduler::new(0);
    let transport = ScriptedTransport::failing(usize::MAX);
    let cfg = config().with_retry(RetryConfig {
        max_times: 10,
        base_delay_ms: 1_000,
    });
    let tracker = host
        .init_with(builder(cfg, &transport, &scheduler))
        .await
        .unwrap();

    tracker.report_error("offline", None, None).await;
    scheduler.settle().await;
    assert_eq!(transport.units().len(), 1);
    assert_eq!(tracker.stats().retried, 1);

    assert!(host.destroy().await);
    scheduler.settle().await;
    for _ in 0..5 {
        scheduler.advance(Duration::from_secs(10));
        scheduler.settle().await;
    }

    assert_eq!(transport.units().len(), 1);
    let stats = tracker.stats();
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(tracker.get_queue_status().immediate, 0);
}

struct OrderedPlugin {
    manifest: PluginManifest,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Plugin for OrderedPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, _ctx: &PluginContext) -> PluginResult<()> {
        self.log.lock().push(self.manifest.name.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_dependencies_init_first_and_reload_fails() {
    let scheduler = ManualScheduler::new(0);
    let transport = ScriptedTransport::failing(0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let plugin = |name: &str, deps: &[&str]| {
        let mut manifest = PluginManifest::new(name, "0.1.0");
        for dep in deps {
            manifest = manifest.with_dependency(*dep);
        }
        Arc::new(OrderedPlugin {
            manifest,
            log: log.clone(),
        })
    };

    let tracker = builder(config(), &transport, &scheduler)
        .plugin(plugin("collector", &["storage", "clock"]))
        .plugin(plugin("storage", &["clock"]))
        .plugin(plugin("clock", &[]))
        .build()
        .await
        .unwrap();

    assert_eq!(*log.lock(), vec!["clock", "storage", "collector"]);
    let reload = tracker.plugins().load_plugin("storage").await;
    assert!(matches!(reload, Err(PluginError::AlreadyLoaded(_))));
    assert_eq!(log.lock().len(), 3);
}
