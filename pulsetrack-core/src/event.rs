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

//! Canonical event model.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Free-form event payload.
pub type EventData = Map<String, Value>;

/// Key in the payload that names the event.
pub const EVENT_NAME_KEY: &str = "eventName";

/// Page-view marker for behavior events.
pub const PAGE_VIEW: &str = "pv";

/// Kind of signal an event was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Behavior,
    Performance,
    Error,
    Business,
    WhiteScreen,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Behavior => "behavior",
            EventKind::Performance => "performance",
            EventKind::Error => "error",
            EventKind::Business => "business",
            EventKind::WhiteScreen => "white_screen",
            EventKind::Custom(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "behavior" => EventKind::Behavior,
            "performance" => EventKind::Performance,
            "error" => EventKind::Error,
            "business" => EventKind::Business,
            "white_screen" => EventKind::WhiteScreen,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        EventKind::from(value.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EventKind::from(raw))
    }
}

/// A raw signal as handed to the tracker, before canonicalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    pub kind: EventKind,
    pub data: EventData,
    pub immediate: bool,
}

impl RawSignal {
    pub fn new(kind: impl Into<EventKind>, data: EventData, immediate: bool) -> Self {
        Self {
            kind: kind.into(),
            data,
            immediate,
        }
    }

    /// The `eventName` field of the payload, if it is a non-empty string.
    pub fn event_name(&self) -> Option<&str> {
        self.data
            .get(EVENT_NAME_KEY)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// The normalized record produced for every reported signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    /// Event name (never empty)
    #[serde(rename = "event")]
    pub name: String,
    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Creation time in epoch milliseconds
    pub timestamp: u64,
    /// Payload, copied at creation
    pub data: EventData,
    /// User the event is attributed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TrackEvent {
    /// Default name for an event whose payload carries no `eventName`.
    pub fn default_name(kind: &EventKind) -> String {
        format!("{}_event", kind)
    }
}

/// Issues non-decreasing epoch-millisecond timestamps.
///
/// A wall clock stepping backwards is clamped to the last issued value.
#[derive(Debug, Default)]
pub struct EventClock {
    last: AtomicU64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `now_ms`, never returning less than a previous stamp.
    pub fn stamp(&self, now_ms: u64) -> u64 {
        let prev = self.last.fetch_max(now_ms, Ordering::SeqCst);
        prev.max(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_str() {
        assert_eq!(EventKind::from("white_screen"), EventKind::WhiteScreen);
        assert_eq!(
            EventKind::from("checkout"),
            EventKind::Custom("checkout".to_string())
        );
        assert_eq!(EventKind::Custom("checkout".into()).as_str(), "checkout");
    }

    #[test]
    fn test_event_serializes_with_wire_names() {
        let mut data = EventData::new();
        data.insert("path".into(), json!("/home"));
        let event = TrackEvent {
            name: "pv".into(),
            kind: EventKind::Behavior,
            timestamp: 42,
            data,
            user_id: None,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "pv");
        assert_eq!(value["type"], "behavior");
        assert_eq!(value["timestamp"], 42);
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn test_event_name_ignores_empty_and_non_string() {
        let mut data = EventData::new();
        data.insert(EVENT_NAME_KEY.into(), json!(""));
        assert_eq!(RawSignal::new("behavior", data.clone(), false).event_name(), None);

        data.insert(EVENT_NAME_KEY.into(), json!(7));
        assert_eq!(RawSignal::new("behavior", data.clone(), false).event_name(), None);

        data.insert(EVENT_NAME_KEY.into(), json!("pv"));
        assert_eq!(RawSignal::new("behavior", data, false).event_name(), Some("pv"));
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let clock = EventClock::new();
        assert_eq!(clock.stamp(100), 100);
        assert_eq!(clock.stamp(90), 100);
        assert_eq!(clock.stamp(150), 150);
    }
}
