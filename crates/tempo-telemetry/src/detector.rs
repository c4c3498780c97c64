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

//! Classification of frame samples into typed performance issues.
//!
//! The classification itself is a pure function of the metrics snapshot, the
//! frame sample and the thresholds. The detector adds two pieces of state on
//! top: cumulative stutter counters and a time-bounded log of recent issues,
//! pruned lazily each time a frame is classified.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tempo_core::telemetry::{
    FrameTimeEntry, IssueSeverity, IssueType, PerformanceIssue, PerformanceMetrics,
};

/// Configurable classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionThresholds {
    /// A frame longer than this (ms) is a stutter. 2x and 4x mark the medium and high bands.
    pub stutter_threshold_ms: f64,
    /// Below this FPS a low-FPS issue is raised.
    pub min_fps: f64,
    /// Below this FPS the low-FPS issue is at least medium.
    pub low_fps_threshold: f64,
    /// Below this FPS the low-FPS issue is high.
    pub critical_fps_threshold: f64,
    /// Above this memory ratio a memory-pressure issue is raised.
    pub memory_pressure_threshold: f64,
    /// How long detected issues stay in the log.
    pub issue_window: Duration,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            stutter_threshold_ms: 100.0,
            min_fps: 30.0,
            low_fps_threshold: 25.0,
            critical_fps_threshold: 15.0,
            memory_pressure_threshold: 0.8,
            issue_window: Duration::from_secs(5),
        }
    }
}

/// Memory ratio from which pressure is medium.
const MEMORY_MEDIUM_RATIO: f64 = 0.85;
/// Memory ratio from which pressure is high.
const MEMORY_HIGH_RATIO: f64 = 0.95;

/// Severity of a frame of `frame_time_ms`, or `None` if it is not a stutter.
///
/// Bands are `(t, 2t)` low, `[2t, 4t)` medium, `[4t, ∞)` high.
pub fn stutter_severity(
    frame_time_ms: f64,
    thresholds: &DetectionThresholds,
) -> Option<IssueSeverity> {
    let t = thresholds.stutter_threshold_ms;
    if frame_time_ms <= t {
        None
    } else if frame_time_ms >= 4.0 * t {
        Some(IssueSeverity::High)
    } else if frame_time_ms >= 2.0 * t {
        Some(IssueSeverity::Medium)
    } else {
        Some(IssueSeverity::Low)
    }
}

/// Severity of running at `fps`, or `None` if it is above the floor.
pub fn fps_severity(fps: f64, thresholds: &DetectionThresholds) -> Option<IssueSeverity> {
    if fps <= 0.0 || fps >= thresholds.min_fps {
        None
    } else if fps < thresholds.critical_fps_threshold {
        Some(IssueSeverity::High)
    } else if fps < thresholds.low_fps_threshold {
        Some(IssueSeverity::Medium)
    } else {
        Some(IssueSeverity::Low)
    }
}

/// Severity of a memory usage ratio, or `None` below the pressure threshold.
pub fn memory_severity(usage: f64, thresholds: &DetectionThresholds) -> Option<IssueSeverity> {
    if usage <= thresholds.memory_pressure_threshold {
        None
    } else if usage >= MEMORY_HIGH_RATIO {
        Some(IssueSeverity::High)
    } else if usage >= MEMORY_MEDIUM_RATIO {
        Some(IssueSeverity::Medium)
    } else {
        Some(IssueSeverity::Low)
    }
}

/// Turns frames into [`PerformanceIssue`]s.
#[derive(Debug, Clone, Default)]
pub struct PerformanceEventDetector {
    thresholds: DetectionThresholds,
    stutter_count: u64,
    last_stutter_time: Option<Duration>,
    issue_log: VecDeque<PerformanceIssue>,
}

impl PerformanceEventDetector {
    /// Creates a detector with the given thresholds.
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    /// Classifies one frame. Several issue types may be raised for the same frame.
    pub fn detect(
        &mut self,
        metrics: &PerformanceMetrics,
        entry: &FrameTimeEntry,
    ) -> Vec<PerformanceIssue> {
        let now = entry.timestamp;
        self.prune(now);

        let mut issues = Vec::new();
        let frame_duration = Duration::from_secs_f64(entry.frame_time_ms.max(0.0) / 1000.0);
        let delta_duration = Duration::from_secs_f64(entry.delta_time_ms.max(0.0) / 1000.0);

        if let Some(severity) = stutter_severity(entry.frame_time_ms, &self.thresholds) {
            self.stutter_count += 1;
            self.last_stutter_time = Some(now);
            log::debug!(
                "Detector: stutter of {:.1}ms ({:?})",
                entry.frame_time_ms,
                severity
            );
            issues.push(self.issue(IssueType::Stutter, severity, now, frame_duration, metrics));
        }

        if let Some(severity) = fps_severity(metrics.current_fps, &self.thresholds) {
            issues.push(self.issue(IssueType::LowFps, severity, now, delta_duration, metrics));
        }

        if let Some(severity) = memory_severity(metrics.memory_usage, &self.thresholds) {
            issues.push(self.issue(
                IssueType::MemoryPressure,
                severity,
                now,
                delta_duration,
                metrics,
            ));
        }

        self.issue_log.extend(issues.iter().cloned());
        issues
    }

    fn issue(
        &self,
        issue_type: IssueType,
        severity: IssueSeverity,
        timestamp: Duration,
        duration: Duration,
        metrics: &PerformanceMetrics,
    ) -> PerformanceIssue {
        PerformanceIssue {
            issue_type,
            severity,
            timestamp,
            duration,
            metrics: *metrics,
        }
    }

    fn prune(&mut self, now: Duration) {
        let horizon = now.saturating_sub(self.thresholds.issue_window);
        while let Some(front) = self.issue_log.front() {
            if front.timestamp < horizon {
                self.issue_log.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the log holds an issue no older than the issue window at `now`.
    pub fn has_active_issues(&self, now: Duration) -> bool {
        let horizon = now.saturating_sub(self.thresholds.issue_window);
        self.issue_log.iter().any(|i| i.timestamp >= horizon)
    }

    /// Issues logged since the last prune.
    pub fn recent_issues(&self) -> impl Iterator<Item = &PerformanceIssue> {
        self.issue_log.iter()
    }

    /// Stutters seen since creation or the last reset.
    pub fn stutter_count(&self) -> u64 {
        self.stutter_count
    }

    /// Timestamp of the last stutter.
    pub fn last_stutter_time(&self) -> Option<Duration> {
        self.last_stutter_time
    }

    /// The active thresholds.
    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    /// Replaces the thresholds, keeping counters and log.
    pub fn set_thresholds(&mut self, thresholds: DetectionThresholds) {
        self.thresholds = thresholds;
    }

    /// Clears counters and log.
    pub fn reset(&mut self) {
        self.stutter_count = 0;
        self.last_stutter_time = None;
        self.issue_log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(fps: f64, memory: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            current_fps: fps,
            memory_usage: memory,
            ..Default::default()
        }
    }

    fn frame(at_ms: u64, frame_ms: f64) -> FrameTimeEntry {
        FrameTimeEntry::new(Duration::from_millis(at_ms), frame_ms, frame_ms)
    }

    #[test]
    fn stutter_bands() {
        let t = DetectionThresholds::default();
        assert_eq!(stutter_severity(100.0, &t), None);
        assert_eq!(stutter_severity(150.0, &t), Some(IssueSeverity::Low));
        assert_eq!(stutter_severity(199.9, &t), Some(IssueSeverity::Low));
        assert_eq!(stutter_severity(200.0, &t), Some(IssueSeverity::Medium));
        assert_eq!(stutter_severity(399.0, &t), Some(IssueSeverity::Medium));
        assert_eq!(stutter_severity(400.0, &t), Some(IssueSeverity::High));
    }

    #[test]
    fn stutter_severity_is_monotonic() {
        let t = DetectionThresholds::default();
        let mut previous = None;
        for ms in (0..1000).map(|i| i as f64) {
            let current = stutter_severity(ms, &t);
            assert!(current >= previous, "severity dropped at {ms}ms");
            previous = current;
        }
    }

    #[test]
    fn fps_bands() {
        let t = DetectionThresholds::default();
        assert_eq!(fps_severity(30.0, &t), None);
        assert_eq!(fps_severity(29.0, &t), Some(IssueSeverity::Low));
        assert_eq!(fps_severity(25.0, &t), Some(IssueSeverity::Low));
        assert_eq!(fps_severity(20.0, &t), Some(IssueSeverity::Medium));
        assert_eq!(fps_severity(15.0, &t), Some(IssueSeverity::Medium));
        assert_eq!(fps_severity(10.0, &t), Some(IssueSeverity::High));
    }

    #[test]
    fn memory_bands() {
        let t = DetectionThresholds::default();
        assert_eq!(memory_severity(0.8, &t), None);
        assert_eq!(memory_severity(0.82, &t), Some(IssueSeverity::Low));
        assert_eq!(memory_severity(0.85, &t), Some(IssueSeverity::Medium));
        assert_eq!(memory_severity(0.95, &t), Some(IssueSeverity::High));
        assert_eq!(memory_severity(0.97, &t), Some(IssueSeverity::High));
    }

    #[test]
    fn single_stutter_frame_yields_one_low_issue() {
        let mut detector = PerformanceEventDetector::default();
        let issues = detector.detect(&metrics(60.0, 0.1), &frame(1000, 150.0));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::Stutter);
        assert_eq!(issues[0].severity, IssueSeverity::Low);
        assert_eq!(issues[0].duration, Duration::from_millis(150));
        assert_eq!(detector.stutter_count(), 1);
        assert_eq!(detector.last_stutter_time(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn high_memory_yields_one_high_issue() {
        let mut detector = PerformanceEventDetector::default();
        let issues = detector.detect(&metrics(60.0, 0.97), &frame(0, 16.0));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::MemoryPressure);
        assert_eq!(issues[0].severity, IssueSeverity::High);
    }

    #[test]
    fn issue_types_can_co_occur() {
        let mut detector = PerformanceEventDetector::default();
        let issues = detector.detect(&metrics(10.0, 0.9), &frame(0, 450.0));
        let types: Vec<IssueType> = issues.iter().map(|i| i.issue_type).collect();
        assert_eq!(
            types,
            vec![IssueType::Stutter, IssueType::LowFps, IssueType::MemoryPressure]
        );
    }

    #[test]
    fn log_is_pruned_lazily() {
        let mut detector = PerformanceEventDetector::default();
        detector.detect(&metrics(60.0, 0.0), &frame(0, 150.0));
        assert!(detector.has_active_issues(Duration::from_secs(4)));
        assert!(!detector.has_active_issues(Duration::from_secs(6)));
        // Still stored until the next detection call.
        assert_eq!(detector.recent_issues().count(), 1);

        detector.detect(&metrics(60.0, 0.0), &frame(6000, 16.0));
        assert_eq!(detector.recent_issues().count(), 0);
    }

    #[test]
    fn set_thresholds_keeps_counters() {
        let mut detector = PerformanceEventDetector::default();
        detector.detect(&metrics(60.0, 0.0), &frame(0, 150.0));
        detector.set_thresholds(DetectionThresholds {
            stutter_threshold_ms: 50.0,
            ..Default::default()
        });
        assert_eq!(detector.stutter_count(), 1);
        let issues = detector.detect(&metrics(60.0, 0.0), &frame(100, 60.0));
        assert_eq!(issues.len(), 1);
        assert_eq!(detector.stutter_count(), 2);

        detector.reset();
        assert_eq!(detector.stutter_count(), 0);
        assert_eq!(detector.recent_issues().count(), 0);
    }
}
