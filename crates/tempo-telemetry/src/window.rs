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

//! Bounded storage for recent frame samples.

use std::collections::VecDeque;
use std::time::Duration;
use tempo_core::telemetry::FrameTimeEntry;

/// A fixed-capacity, timestamp-ordered window of frame samples.
///
/// Pushing into a full window evicts the oldest entry. The window also keeps
/// a running count of the stuttering frames it currently holds.
#[derive(Debug, Clone)]
pub struct PerformanceWindow {
    entries: VecDeque<FrameTimeEntry>,
    capacity: usize,
    stutter_threshold_ms: f64,
    stutter_count: u32,
}

impl PerformanceWindow {
    /// Creates an empty window. A zero capacity is bumped to one.
    pub fn new(capacity: usize, stutter_threshold_ms: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            stutter_threshold_ms,
            stutter_count: 0,
        }
    }

    /// Appends a sample, evicting the oldest if full.
    ///
    /// Returns `false` and leaves the window untouched if the sample is older
    /// than the newest entry.
    pub fn push(&mut self, entry: FrameTimeEntry) -> bool {
        if let Some(last) = self.entries.back() {
            if entry.timestamp < last.timestamp {
                log::warn!(
                    "PerformanceWindow: rejected out-of-order sample ({:?} < {:?})",
                    entry.timestamp,
                    last.timestamp
                );
                return false;
            }
        }

        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                if self.is_stutter(&evicted) {
                    self.stutter_count -= 1;
                }
            }
        }
        if self.is_stutter(&entry) {
            self.stutter_count += 1;
        }
        self.entries.push_back(entry);
        true
    }

    fn is_stutter(&self, entry: &FrameTimeEntry) -> bool {
        entry.frame_time_ms > self.stutter_threshold_ms
    }

    /// Changes the stutter threshold and recounts the held samples.
    pub fn set_stutter_threshold(&mut self, threshold_ms: f64) {
        self.stutter_threshold_ms = threshold_ms;
        self.stutter_count = self
            .entries
            .iter()
            .filter(|e| e.frame_time_ms > threshold_ms)
            .count() as u32;
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stutter_count = 0;
    }

    /// Maximum number of samples held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the window holds no sample.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stuttering samples currently held.
    pub fn stutter_count(&self) -> u32 {
        self.stutter_count
    }

    /// Timestamp of the newest stuttering sample.
    pub fn last_stutter_time(&self) -> Option<Duration> {
        self.entries
            .iter()
            .rev()
            .find(|e| self.is_stutter(e))
            .map(|e| e.timestamp)
    }

    /// The newest sample.
    pub fn latest(&self) -> Option<&FrameTimeEntry> {
        self.entries.back()
    }

    /// Samples in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &FrameTimeEntry> {
        self.entries.iter()
    }

    /// Mean frame time in milliseconds, or 0 if empty.
    pub fn average_frame_time(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|e| e.frame_time_ms).sum::<f64>() / self.entries.len() as f64
    }

    /// Mean frame-to-frame delta in milliseconds, or 0 if empty.
    pub fn average_delta_time(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|e| e.delta_time_ms).sum::<f64>() / self.entries.len() as f64
    }

    /// Frames per second derived from the mean delta, or 0 if unknown.
    pub fn average_fps(&self) -> f64 {
        let delta = self.average_delta_time();
        if delta > 0.0 {
            1000.0 / delta
        } else {
            0.0
        }
    }

    /// Population variance of the frame time.
    ///
    /// High variance is a strong stutter indicator even when the mean looks fine.
    pub fn frame_time_variance(&self) -> f64 {
        if self.entries.len() < 2 {
            return 0.0;
        }
        let avg = self.average_frame_time();
        let sum_sq: f64 = self
            .entries
            .iter()
            .map(|e| (e.frame_time_ms - avg) * (e.frame_time_ms - avg))
            .sum();
        sum_sq / self.entries.len() as f64
    }

    /// Difference between the mean frame time of the newer and older halves.
    /// Positive means frames are getting slower.
    pub fn frame_time_trend(&self) -> f64 {
        let count = self.entries.len();
        if count < 2 {
            return 0.0;
        }
        let half = count / 2;
        let first: f64 =
            self.entries.iter().take(half).map(|e| e.frame_time_ms).sum::<f64>() / half as f64;
        let last: f64 = self
            .entries
            .iter()
            .skip(count - half)
            .map(|e| e.frame_time_ms)
            .sum::<f64>()
            / half as f64;
        last - first
    }
}
