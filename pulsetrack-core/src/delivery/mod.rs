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

//! Queueing and delivery of canonical events.

mod buffer;
mod engine;
mod retry;
mod transport;

pub use buffer::{BufferStore, BufferedUnit, FileStore, LocalBuffer, MemoryStore};
pub use engine::{DeliveryEngine, DeliveryOutcome, DeliverySettings};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport, API_KEY_HEADER};

use crate::event::TrackEvent;
use serde::{Deserialize, Serialize};

/// What one network call carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryUnit {
    /// An immediate event, sent as a JSON object
    Single(TrackEvent),
    /// A flushed batch, sent as a JSON array
    Batch(Vec<TrackEvent>),
}

impl DeliveryUnit {
    pub fn event_count(&self) -> usize {
        match self {
            DeliveryUnit::Single(_) => 1,
            DeliveryUnit::Batch(events) => events.len(),
        }
    }

    pub fn events(&self) -> &[TrackEvent] {
        match self {
            DeliveryUnit::Single(event) => std::slice::from_ref(event),
            DeliveryUnit::Batch(events) => events,
        }
    }
}

/// Current queue lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Immediate events still in flight
    pub immediate: usize,
    /// Events waiting for the next batch flush
    pub batch: usize,
}

/// Lifetime counters, in events (except `retried`, which counts attempts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub retried: u64,
    pub buffered: u64,
}
