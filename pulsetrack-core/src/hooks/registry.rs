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

//! Registry of hook handlers per lifecycle stage.

use super::handlers::AsyncHookHandler;
use super::kinds::LifecycleHook;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Priority level for hook execution.
/// Lower values execute first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookPriority(pub i32);

impl Default for HookPriority {
    fn default() -> Self {
        HookPriority(100)
    }
}

impl HookPriority {
    /// Highest priority (executes first).
    pub const HIGHEST: HookPriority = HookPriority(0);
    pub const HIGH: HookPriority = HookPriority(25);
    pub const NORMAL: HookPriority = HookPriority(50);
    pub const LOW: HookPriority = HookPriority(75);
    /// Lowest priority (executes last).
    pub const LOWEST: HookPriority = HookPriority(100);
}

/// Identity of one registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook-{}", self.0)
    }
}

/// A registered hook with its handler and metadata.
#[derive(Clone)]
pub struct RegisteredHook {
    pub id: HookId,
    pub hook: LifecycleHook,
    pub handler: AsyncHookHandler,
    pub priority: HookPriority,
}

/// Handlers per lifecycle stage, kept sorted by priority.
///
/// The sort is stable, so handlers of equal priority keep registration order.
pub struct HookRegistry {
    hooks: DashMap<LifecycleHook, Vec<RegisteredHook>>,
    next_id: AtomicU64,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a handler for `hook`.
    pub fn insert(
        &self,
        hook: LifecycleHook,
        handler: AsyncHookHandler,
        priority: HookPriority,
    ) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut hooks = self.hooks.entry(hook).or_default();
        hooks.push(RegisteredHook {
            id,
            hook,
            handler,
            priority,
        });
        hooks.sort_by_key(|h| h.priority);
        id
    }

    /// Remove one registration. Returns whether it existed.
    pub fn remove(&self, hook: LifecycleHook, id: HookId) -> bool {
        match self.hooks.get_mut(&hook) {
            Some(mut hooks) => {
                let before = hooks.len();
                hooks.retain(|h| h.id != id);
                hooks.len() != before
            }
            None => false,
        }
    }

    /// Remove every registration for `hook`. Returns how many were removed.
    pub fn remove_all(&self, hook: LifecycleHook) -> usize {
        self.hooks
            .remove(&hook)
            .map(|(_, hooks)| hooks.len())
            .unwrap_or(0)
    }

    /// Snapshot of the handlers for `hook`, in execution order.
    pub fn hooks_for(&self, hook: LifecycleHook) -> Vec<RegisteredHook> {
        self.hooks
            .get(&hook)
            .map(|hooks| hooks.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, hook: LifecycleHook) -> usize {
        self.hooks.get(&hook).map(|hooks| hooks.len()).unwrap_or(0)
    }

    pub fn total_count(&self) -> usize {
        self.hooks.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn clear(&self) {
        self.hooks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::super::handlers::{callback, HookOutcome};
    use super::*;

    fn noop(name: &str) -> AsyncHookHandler {
        callback(name, |_, _| Ok(HookOutcome::Continue))
    }

    #[test]
    fn test_priority_then_registration_order() {
        let registry = HookRegistry::new();
        let first = registry.insert(LifecycleHook::Init, noop("a"), HookPriority::LOW);
        let second = registry.insert(LifecycleHook::Init, noop("b"), HookPriority::HIGH);
        let third = registry.insert(LifecycleHook::Init, noop("c"), HookPriority::LOW);

        let ids: Vec<_> = registry
            .hooks_for(LifecycleHook::Init)
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![second, first, third]);
    }

    #[test]
    fn test_remove_by_identity() {
        let registry = HookRegistry::new();
        let a = registry.insert(LifecycleHook::Destroy, noop("a"), HookPriority::default());
        let b = registry.insert(LifecycleHook::Destroy, noop("b"), HookPriority::default());

        assert!(registry.remove(LifecycleHook::Destroy, a));
        assert!(!registry.remove(LifecycleHook::Destroy, a));
        assert!(!registry.remove(LifecycleHook::Init, b));

        let remaining = registry.hooks_for(LifecycleHook::Destroy);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].handler.name(), "b");
    }

    #[test]
    fn test_counts_and_clear() {
        let registry = HookRegistry::new();
        registry.insert(LifecycleHook::Init, noop("a"), HookPriority::default());
        registry.insert(LifecycleHook::Init, noop("b"), HookPriority::default());
        registry.insert(LifecycleHook::Destroy, noop("c"), HookPriority::default());

        assert_eq!(registry.count(LifecycleHook::Init), 2);
        assert_eq!(registry.total_count(), 3);
        assert_eq!(registry.remove_all(LifecycleHook::Init), 2);
        assert_eq!(registry.total_count(), 1);

        registry.clear();
        assert_eq!(registry.total_count(), 0);
    }
}
