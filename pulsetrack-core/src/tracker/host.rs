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

use super::{Tracker, TrackerBuilder};
use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use parking_lot::Mutex;

/// Owns the single tracker of a host application.
///
/// `init` constructs the tracker on first use and returns the existing one
/// afterwards; `destroy` tears it down and empties the slot.
#[derive(Default)]
pub struct TrackerHost {
    slot: Mutex<Option<Tracker>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl TrackerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a tracker for `config`, or fetch the live one.
    ///
    /// When a tracker already exists `config` is ignored.
    pub async fn init(&self, config: TrackerConfig) -> TrackerResult<Tracker> {
        self.init_with(TrackerBuilder::new(config)).await
    }

    /// Like [`TrackerHost::init`] with a fully configured builder.
    pub async fn init_with(&self, builder: TrackerBuilder) -> TrackerResult<Tracker> {
        let _guard = self.init_lock.lock().await;
        if let Some(existing) = self.slot.lock().clone() {
            tracing::debug!("Tracker already initialized, returning existing instance");
            return Ok(existing);
        }

        let tracker = builder.build().await?;
        *self.slot.lock() = Some(tracker.clone());
        Ok(tracker)
    }

    /// The live tracker.
    pub fn get(&self) -> TrackerResult<Tracker> {
        self.slot.lock().clone().ok_or(TrackerError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Tear down the live tracker. Returns `false` when there was none.
    pub async fn destroy(&self) -> bool {
        let _guard = self.init_lock.lock().await;
        let Some(tracker) = self.slot.lock().take() else {
            return false;
        };
        tracker.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::tracker::tests::{recording, RecordingTransport};
    use std::sync::Arc;

    fn builder(url: &str, transport: &Arc<RecordingTransport>) -> TrackerBuilder {
        TrackerBuilder::new(TrackerConfig::new("key", url))
            .transport(transport.clone())
            .scheduler(Arc::new(ManualScheduler::new(0)))
    }

    #[tokio::test]
    async fn test_init_returns_existing_instance() {
        let host = TrackerHost::new();
        let transport = recording();

        let first = host.init_with(builder("http://a", &transport)).await.unwrap();
        let second = host.init_with(builder("http://b", &transport)).await.unwrap();
        assert_eq!(second.config().server_url(), "http://a");
        assert!(Arc::ptr_eq(&first.inner, &second.inner));
    }

    #[tokio::test]
    async fn test_get_before_init_fails() {
        let host = TrackerHost::new();
        assert!(matches!(host.get(), Err(TrackerError::NotInitialized)));
        assert!(!host.destroy().await);
    }

    #[tokio::test]
    async fn test_failed_init_leaves_slot_empty() {
        let host = TrackerHost::new();
        let result = host.init(TrackerConfig::new("", "http://a")).await;
        assert!(matches!(result, Err(TrackerError::Config(_))));
        assert!(!host.is_initialized());
    }

    #[tokio::test]
    async fn test_destroy_empties_slot() {
        let host = TrackerHost::new();
        let transport = recording();
        let tracker = host.init_with(builder("http://a", &transport)).await.unwrap();

        assert!(host.destroy().await);
        assert!(tracker.is_destroyed());
        assert!(host.get().is_err());
        assert!(!host.destroy().await);
    }
}
