// Copyright 2025 eraflo
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

//! The composite 0..100 performance score.

use crate::window::PerformanceWindow;

/// Points lost per stuttering frame in the window.
const STUTTER_PENALTY: f64 = 5.0;
/// Cap on the total stutter penalty.
const MAX_STUTTER_PENALTY: f64 = 40.0;
/// Coefficient of variation (std-dev / mean of frame time) considered steady.
const STABLE_VARIATION: f64 = 0.05;
/// Bonus for a steady window.
const STABILITY_BONUS: f64 = 5.0;
/// Cap on the instability penalty.
const MAX_INSTABILITY_PENALTY: f64 = 20.0;

/// Scores a window of frames against a target frame rate.
///
/// Combines three terms:
/// 1. **FPS ratio**: `avg_fps / target_fps`, as a percentage capped to 0..100.
/// 2. **Stutter penalty**: a fixed cost per stuttering frame, capped.
/// 3. **Stability**: a small bonus for low frame-time variation, a growing
///    penalty as the variation increases.
///
/// An empty window scores exactly 100. The result is rounded to one decimal.
pub fn performance_score(window: &PerformanceWindow, target_fps: f64) -> f64 {
    if window.is_empty() || target_fps <= 0.0 {
        return 100.0;
    }

    let fps_term = (window.average_fps() / target_fps * 100.0).clamp(0.0, 100.0);

    let stutter_penalty =
        (f64::from(window.stutter_count()) * STUTTER_PENALTY).min(MAX_STUTTER_PENALTY);

    let mean = window.average_frame_time();
    let variation = if mean > 0.0 {
        window.frame_time_variance().sqrt() / mean
    } else {
        0.0
    };
    let stability = if variation <= STABLE_VARIATION {
        STABILITY_BONUS
    } else {
        -(variation * 50.0).min(MAX_INSTABILITY_PENALTY)
    };

    let score = (fps_term - stutter_penalty + stability).clamp(0.0, 100.0);
    (score * 10.0).round() / 10.0
}
