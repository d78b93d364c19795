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

//! Geometric sampling of the viewport.
//!
//! Nine steps along four lines through the viewport: the horizontal and
//! vertical axes and both diagonals. The centre is shared by all four lines
//! and probed once.

use super::config::WhiteScreenConfig;
use super::probe::{PageProbe, Viewport};

/// Probes per pass.
pub const SAMPLE_POINTS: usize = 33;

const STEPS: u32 = 9;
const CENTRE_STEP: u32 = 5;

/// Probe coordinates for `viewport`, in probing order.
pub fn sample_points(viewport: Viewport) -> Vec<(f64, f64)> {
    let w = viewport.width as f64;
    let h = viewport.height as f64;
    let mut points = Vec::with_capacity(SAMPLE_POINTS);

    for i in 1..=STEPS {
        let t = i as f64 / 10.0;
        points.push((w * t, h / 2.0));
        if i != CENTRE_STEP {
            points.push((w / 2.0, h * t));
            points.push((w * t, h * t));
            points.push((w * t, h - h * t));
        }
    }
    points
}

/// Outcome of one sampling pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassResult {
    /// Probes that landed on a container element
    pub empty_points: u32,
    /// Selector of every element hit, in probing order
    pub selectors: Vec<String>,
}

/// Run one pass over `probe`. `None` when the viewport has no area.
pub fn sample<P: PageProbe + ?Sized>(probe: &P, config: &WhiteScreenConfig) -> Option<PassResult> {
    let viewport = probe.viewport();
    if viewport.is_empty() {
        return None;
    }

    let mut result = PassResult::default();
    for (x, y) in sample_points(viewport) {
        let Some(element) = probe.element_at(x, y) else {
            continue;
        };
        let selector = element.selector();
        if config.is_container(&selector) {
            result.empty_points += 1;
        }
        result.selectors.push(selector);
    }
    Some(result)
}
