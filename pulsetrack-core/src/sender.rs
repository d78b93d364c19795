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

//! Uniform send callback handed to instrumentation plugins.

use crate::event::{EventData, EventKind, RawSignal};
use tokio::sync::mpsc;

/// Ordered, non-blocking handle for submitting raw signals.
///
/// Signals are queued on an unbounded channel and drained by the tracker in
/// submission order. Sending never waits on hooks or the network.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<RawSignal>,
}

impl EventSender {
    /// Create a sender and the receiving end drained by the tracker.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RawSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Submit a signal for regular (batched) delivery, unless the tracker escalates it.
    pub fn send(&self, kind: impl Into<EventKind>, data: EventData) -> bool {
        self.send_signal(RawSignal::new(kind, data, false))
    }

    /// Submit a signal for immediate delivery.
    pub fn send_immediate(&self, kind: impl Into<EventKind>, data: EventData) -> bool {
        self.send_signal(RawSignal::new(kind, data, true))
    }

    /// Submit a prepared signal. Returns `false` once the tracker is gone.
    pub fn send_signal(&self, signal: RawSignal) -> bool {
        match self.tx.send(signal) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(kind = %e.0.kind, "Tracker gone, signal dropped");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
