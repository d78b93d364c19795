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

//! Access to the rendered page surface.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Document loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadyState::Loading => "loading",
            ReadyState::Interactive => "interactive",
            ReadyState::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Visible area in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The identifying parts of an element hit by a probe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    pub id: String,
    pub class_name: String,
    pub node_name: String,
}

impl ElementInfo {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// `#id`, else `.class.list`, else the lowercase node name.
    pub fn selector(&self) -> String {
        if !self.id.is_empty() {
            return format!("#{}", self.id);
        }
        let classes: Vec<&str> = self.class_name.split_whitespace().collect();
        if !classes.is_empty() {
            return format!(".{}", classes.join("."));
        }
        self.node_name.to_lowercase()
    }
}

/// Read-only view of the page the detector samples.
#[async_trait]
pub trait PageProbe: Send + Sync + 'static {
    fn viewport(&self) -> Viewport;

    /// Top-most element at `(x, y)`, if any.
    fn element_at(&self, x: f64, y: f64) -> Option<ElementInfo>;

    fn ready_state(&self) -> ReadyState;

    /// Resolves once the document is complete.
    async fn loaded(&self);

    fn url(&self) -> String {
        String::new()
    }

    fn user_agent(&self) -> String {
        String::new()
    }
}

/// Axis-aligned box occupied by an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

struct PageLayout {
    viewport: Viewport,
    root: ElementInfo,
    /// Painted in order; later layers are on top.
    layers: Vec<(Rect, ElementInfo)>,
}

/// In-memory page model: a root element covering the viewport plus painted layers.
///
/// Useful for headless hosts that know their own layout.
pub struct StaticPage {
    layout: RwLock<PageLayout>,
    ready: watch::Sender<ReadyState>,
    url: String,
    user_agent: String,
}

impl StaticPage {
    pub fn new(viewport: Viewport, root: ElementInfo) -> Self {
        let (ready, _) = watch::channel(ReadyState::Loading);
        Self {
            layout: RwLock::new(PageLayout {
                viewport,
                root,
                layers: Vec::new(),
            }),
            ready,
            url: String::new(),
            user_agent: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Paint `element` over `rect`.
    pub fn paint(&self, rect: Rect, element: ElementInfo) {
        self.layout.write().layers.push((rect, element));
    }

    /// Paint `element` over the whole viewport.
    pub fn fill(&self, element: ElementInfo) {
        let viewport = self.layout.read().viewport;
        let rect = Rect::new(0.0, 0.0, viewport.width as f64, viewport.height as f64);
        self.paint(rect, element);
    }

    pub fn clear(&self) {
        self.layout.write().layers.clear();
    }

    pub fn resize(&self, viewport: Viewport) {
        self.layout.write().viewport = viewport;
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.ready.send_replace(state);
    }
}

#[async_trait]
impl PageProbe for StaticPage {
    fn viewport(&self) -> Viewport {
        self.layout.read().viewport
    }

    fn element_at(&self, x: f64, y: f64) -> Option<ElementInfo> {
        let layout = self.layout.read();
        let inside = x >= 0.0
            && y >= 0.0
            && x < layout.viewport.width as f64
            && y < layout.viewport.height as f64;
        if !inside {
            return None;
        }
        let hit = layout
            .layers
            .iter()
            .rev()
            .find(|(rect, _)| rect.contains(x, y))
            .map(|(_, element)| element)
            .unwrap_or(&layout.root);
        Some(hit.clone())
    }

    fn ready_state(&self) -> ReadyState {
        *self.ready.borrow()
    }

    async fn loaded(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this only ends on Complete.
        let _ = rx.wait_for(|state| *state == ReadyState::Complete).await;
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }
}
