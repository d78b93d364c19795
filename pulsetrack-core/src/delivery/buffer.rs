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

//! Bounded local buffer for units whose send attempts are exhausted.
//!
//! Every write purges entries older than `max_age` and then evicts the oldest
//! entries while the buffered event count exceeds `max_size`.

use super::DeliveryUnit;
use crate::config::StorageConfig;
use crate::error::DeliveryError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One buffered unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedUnit {
    /// Epoch milliseconds when the unit was buffered
    pub stored_at: u64,
    pub unit: DeliveryUnit,
}

/// Persistence for buffered units.
pub trait BufferStore: Send + Sync {
    fn load(&self) -> Result<Vec<BufferedUnit>, DeliveryError>;
    fn save(&self, entries: &[BufferedUnit]) -> Result<(), DeliveryError>;
}

/// Keeps entries in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<BufferedUnit>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BufferStore for MemoryStore {
    fn load(&self) -> Result<Vec<BufferedUnit>, DeliveryError> {
        Ok(self.entries.lock().clone())
    }

    fn save(&self, entries: &[BufferedUnit]) -> Result<(), DeliveryError> {
        *self.entries.lock() = entries.to_vec();
        Ok(())
    }
}

/// Stores entries as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BufferStore for FileStore {
    fn load(&self) -> Result<Vec<BufferedUnit>, DeliveryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &[BufferedUnit]) -> Result<(), DeliveryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Size- and age-bounded buffer over a [`BufferStore`].
pub struct LocalBuffer {
    store: Box<dyn BufferStore>,
    entries: Vec<BufferedUnit>,
    max_size: usize,
    max_age_ms: u64,
}

impl LocalBuffer {
    /// Open a buffer, loading whatever the store already holds.
    pub fn open(
        store: Box<dyn BufferStore>,
        max_size: usize,
        max_age_ms: u64,
    ) -> Result<Self, DeliveryError> {
        let entries = store.load()?;
        Ok(Self {
            store,
            entries,
            max_size,
            max_age_ms,
        })
    }

    /// Open the store described by `config`: a file when `path` is set, memory otherwise.
    pub fn from_config(config: &StorageConfig) -> Result<Self, DeliveryError> {
        let store: Box<dyn BufferStore> = match &config.path {
            Some(path) => Box::new(FileStore::new(path.clone())),
            None => Box::new(MemoryStore::new()),
        };
        Self::open(store, config.max_size, config.max_age_ms)
    }

    /// Buffer `unit`. Returns the number of events purged or evicted.
    pub fn push(&mut self, unit: DeliveryUnit, now_ms: u64) -> Result<usize, DeliveryError> {
        self.entries.push(BufferedUnit {
            stored_at: now_ms,
            unit,
        });
        let removed = self.purge_stale(now_ms) + self.evict_oldest();
        self.store.save(&self.entries)?;
        Ok(removed)
    }

    /// Remove and return every fresh unit, oldest first.
    pub fn take_all(&mut self, now_ms: u64) -> Result<Vec<DeliveryUnit>, DeliveryError> {
        self.purge_stale(now_ms);
        let units = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|entry| entry.unit)
            .collect();
        self.store.save(&self.entries)?;
        Ok(units)
    }

    fn purge_stale(&mut self, now_ms: u64) -> usize {
        let max_age = self.max_age_ms;
        let mut removed = 0;
        self.entries.retain(|entry| {
            let fresh = now_ms.saturating_sub(entry.stored_at) <= max_age;
            if !fresh {
                removed += entry.unit.event_count();
            }
            fresh
        });
        removed
    }

    fn evict_oldest(&mut self) -> usize {
        let mut removed = 0;
        while self.event_count() > self.max_size && !self.entries.is_empty() {
            removed += self.entries.remove(0).unit.event_count();
        }
        removed
    }

    /// Buffered events across all units.
    pub fn event_count(&self) -> usize {
        self.entries.iter().map(|e| e.unit.event_count()).sum()
    }

    /// Buffered units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
