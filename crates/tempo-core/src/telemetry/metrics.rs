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

//! Frame samples, metric snapshots and performance issues.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One measured frame. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTimeEntry {
    /// When the frame ended, relative to the clock origin.
    pub timestamp: Duration,
    /// Time spent between `start_frame` and `end_frame`, in milliseconds.
    pub frame_time_ms: f64,
    /// Time since the previous frame started, in milliseconds.
    pub delta_time_ms: f64,
    /// `1000 / delta_time_ms`, or 0 for a zero-length delta.
    pub instantaneous_fps: f64,
}

impl FrameTimeEntry {
    /// Builds an entry, deriving the instantaneous FPS from the delta.
    pub fn new(timestamp: Duration, frame_time_ms: f64, delta_time_ms: f64) -> Self {
        let instantaneous_fps = if delta_time_ms > 0.0 {
            1000.0 / delta_time_ms
        } else {
            0.0
        };
        Self {
            timestamp,
            frame_time_ms,
            delta_time_ms,
            instantaneous_fps,
        }
    }
}

/// A per-frame snapshot of the monitor's view of performance.
///
/// Produced once per frame as a fresh value; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Frames per second averaged over the analysis window.
    pub current_fps: f64,
    /// Mean frame time over the analysis window, in milliseconds.
    pub average_frame_time_ms: f64,
    /// Fraction of the memory ceiling in use (0..1).
    pub memory_usage: f64,
    /// Stuttering frames currently inside the window.
    pub stutter_count: u32,
    /// Timestamp of the most recent stutter, if any.
    pub last_stutter_time: Option<Duration>,
    /// Composite score (0..100).
    pub performance_score: f64,
    /// When the snapshot was taken.
    pub timestamp: Duration,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            current_fps: 0.0,
            average_frame_time_ms: 0.0,
            memory_usage: 0.0,
            stutter_count: 0,
            last_stutter_time: None,
            performance_score: 100.0,
            timestamp: Duration::ZERO,
        }
    }
}

/// The kind of problem a [`PerformanceIssue`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// A single frame took far longer than expected.
    Stutter,
    /// The averaged frame rate fell below the floor.
    LowFps,
    /// Memory usage is close to the ceiling.
    MemoryPressure,
}

impl IssueType {
    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Stutter => "stutter",
            IssueType::LowFps => "low_fps",
            IssueType::MemoryPressure => "memory_pressure",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tier of an issue. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Noticeable but harmless.
    Low,
    /// Visibly degrading the experience.
    Medium,
    /// Severe; the application is struggling.
    High,
}

/// A classified performance problem. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceIssue {
    /// What went wrong.
    pub issue_type: IssueType,
    /// How bad it is.
    pub severity: IssueSeverity,
    /// When it was detected.
    pub timestamp: Duration,
    /// How long the offending condition lasted (the frame's duration).
    pub duration: Duration,
    /// The metrics snapshot the issue was derived from.
    pub metrics: PerformanceMetrics,
}
