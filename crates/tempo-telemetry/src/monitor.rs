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

//! The per-frame sampler.

use crate::detector::{DetectionThresholds, PerformanceEventDetector};
use crate::scoring::performance_score;
use crate::window::PerformanceWindow;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tempo_core::event::{ObserverId, ObserverList};
use tempo_core::platform::MemoryProbe;
use tempo_core::telemetry::{FrameTimeEntry, PerformanceIssue, PerformanceMetrics};
use tempo_core::SharedClock;

/// Sizing of the monitor's analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Number of frames kept in the window.
    pub window_capacity: usize,
    /// Frame rate the score is measured against.
    pub target_fps: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_capacity: 60,
            target_fps: 60.0,
        }
    }
}

/// A monitor shared between the frame loop and its readers.
pub type SharedMonitor = Rc<RefCell<PerformanceMonitor>>;

/// Brackets frames, maintains the window and raises performance issues.
///
/// Every [`end_frame`](Self::end_frame) appends exactly one sample, produces a
/// fresh [`PerformanceMetrics`] snapshot and then runs issue detection. Issue
/// subscribers are called synchronously from `end_frame`.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    clock: SharedClock,
    window: PerformanceWindow,
    detector: PerformanceEventDetector,
    memory_probe: Option<Box<dyn MemoryProbe>>,
    frame_start: Option<Duration>,
    previous_start: Option<Duration>,
    metrics: PerformanceMetrics,
    issue_observers: ObserverList<PerformanceIssue>,
}

impl PerformanceMonitor {
    /// Creates a monitor reading time from `clock`.
    pub fn new(config: MonitorConfig, thresholds: DetectionThresholds, clock: SharedClock) -> Self {
        Self {
            window: PerformanceWindow::new(config.window_capacity, thresholds.stutter_threshold_ms),
            detector: PerformanceEventDetector::new(thresholds),
            config,
            clock,
            memory_probe: None,
            frame_start: None,
            previous_start: None,
            metrics: PerformanceMetrics::default(),
            issue_observers: ObserverList::new("PerformanceMonitor"),
        }
    }

    /// Samples memory usage from `probe` on every frame.
    pub fn with_memory_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.memory_probe = Some(probe);
        self
    }

    /// Wraps the monitor into a [`SharedMonitor`].
    pub fn into_shared(self) -> SharedMonitor {
        Rc::new(RefCell::new(self))
    }

    /// Marks the start of a frame.
    pub fn start_frame(&mut self) {
        let now = self.clock.now();
        if self.frame_start.is_some() {
            log::trace!("PerformanceMonitor: start_frame called twice, restarting the frame");
        }
        self.frame_start = Some(now);
    }

    /// Marks the end of the frame and returns the issues it raised.
    ///
    /// Without a matching [`start_frame`](Self::start_frame) the call is
    /// ignored.
    pub fn end_frame(&mut self) -> Vec<PerformanceIssue> {
        let Some(start) = self.frame_start.take() else {
            log::warn!("PerformanceMonitor: end_frame without start_frame, ignored");
            return Vec::new();
        };
        let now = self.clock.now();
        let frame_time_ms = ms(now.saturating_sub(start));
        let delta_time_ms = match self.previous_start {
            Some(previous) => ms(start.saturating_sub(previous)),
            None => frame_time_ms,
        };
        self.previous_start = Some(start);

        let entry = FrameTimeEntry::new(now, frame_time_ms, delta_time_ms);
        if !self.window.push(entry) {
            return Vec::new();
        }

        let memory_usage = self
            .memory_probe
            .as_ref()
            .and_then(|probe| probe.memory_usage())
            .unwrap_or(0.0);

        self.metrics = PerformanceMetrics {
            current_fps: self.window.average_fps(),
            average_frame_time_ms: self.window.average_frame_time(),
            memory_usage,
            stutter_count: self.window.stutter_count(),
            last_stutter_time: self.window.last_stutter_time(),
            performance_score: performance_score(&self.window, self.config.target_fps),
            timestamp: now,
        };
        log::trace!(
            "PerformanceMonitor: frame {:.2}ms, {:.1} FPS, score {:.1}",
            frame_time_ms,
            self.metrics.current_fps,
            self.metrics.performance_score
        );

        let issues = self.detector.detect(&self.metrics, &entry);
        for issue in &issues {
            self.issue_observers.notify(issue);
        }
        issues
    }

    /// The latest snapshot.
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.metrics
    }

    /// Averaged frame rate of the window.
    pub fn current_fps(&self) -> f64 {
        self.metrics.current_fps
    }

    /// Mean frame time of the window, in milliseconds.
    pub fn average_frame_time(&self) -> f64 {
        self.metrics.average_frame_time_ms
    }

    /// Registers a subscriber invoked once per detected issue.
    pub fn on_performance_issue<F>(&mut self, callback: F) -> ObserverId
    where
        F: FnMut(&PerformanceIssue) -> anyhow::Result<()> + 'static,
    {
        self.issue_observers.subscribe(Box::new(callback))
    }

    /// Removes a subscriber. Returns `false` if the handle is unknown.
    pub fn remove_issue_callback(&mut self, id: ObserverId) -> bool {
        self.issue_observers.unsubscribe(id)
    }

    /// Whether any issue was detected within the issue window.
    pub fn is_performance_issue_active(&self) -> bool {
        self.detector.has_active_issues(self.clock.now())
    }

    /// The frame window.
    pub fn window(&self) -> &PerformanceWindow {
        &self.window
    }

    /// The issue detector.
    pub fn detector(&self) -> &PerformanceEventDetector {
        &self.detector
    }

    /// The monitor configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Replaces the detection thresholds. Counters are kept.
    pub fn set_thresholds(&mut self, thresholds: DetectionThresholds) {
        self.window
            .set_stutter_threshold(thresholds.stutter_threshold_ms);
        self.detector.set_thresholds(thresholds);
    }

    /// Drops every sample and detector state. Subscribers are kept.
    pub fn reset(&mut self) {
        self.window.clear();
        self.detector.reset();
        self.frame_start = None;
        self.previous_start = None;
        self.metrics = PerformanceMetrics::default();
        log::debug!("PerformanceMonitor: reset");
    }
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempo_core::telemetry::{IssueSeverity, IssueType};
    use tempo_core::ManualClock;

    struct FixedMemory(f64);

    impl MemoryProbe for FixedMemory {
        fn memory_usage(&self) -> Option<f64> {
            Some(self.0)
        }
    }

    fn monitor(capacity: usize) -> (PerformanceMonitor, ManualClock) {
        let clock = ManualClock::new();
        let config = MonitorConfig {
            window_capacity: capacity,
            ..Default::default()
        };
        let monitor =
            PerformanceMonitor::new(config, DetectionThresholds::default(), clock.shared());
        (monitor, clock)
    }

    fn frame(
        monitor: &mut PerformanceMonitor,
        clock: &ManualClock,
        ms: f64,
    ) -> Vec<PerformanceIssue> {
        monitor.start_frame();
        clock.advance_ms(ms);
        monitor.end_frame()
    }

    #[test]
    fn delta_is_start_to_start() {
        let (mut monitor, clock) = monitor(10);
        frame(&mut monitor, &clock, 10.0);
        clock.advance_ms(6.0);
        frame(&mut monitor, &clock, 10.0);
        let latest = monitor.window().latest().copied().unwrap();
        assert_relative_eq!(latest.frame_time_ms, 10.0, epsilon = 1e-6);
        assert_relative_eq!(latest.delta_time_ms, 16.0, epsilon = 1e-6);
    }

    #[test]
    fn end_without_start_is_ignored() {
        let (mut monitor, _clock) = monitor(10);
        assert!(monitor.end_frame().is_empty());
        assert!(monitor.window().is_empty());
    }

    #[test]
    fn subscribers_see_each_issue() {
        let (mut monitor, clock) = monitor(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        monitor.on_performance_issue(move |issue| {
            sink.borrow_mut().push(issue.issue_type);
            Ok(())
        });
        frame(&mut monitor, &clock, 16.67);
        frame(&mut monitor, &clock, 150.0);
        assert!(seen.borrow().contains(&IssueType::Stutter));
        assert!(monitor.is_performance_issue_active());

        clock.advance(Duration::from_secs(6));
        assert!(!monitor.is_performance_issue_active());
    }

    #[test]
    fn removed_subscriber_is_not_called() {
        let (mut monitor, clock) = monitor(10);
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let id = monitor.on_performance_issue(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        assert!(monitor.remove_issue_callback(id));
        frame(&mut monitor, &clock, 500.0);
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn memory_probe_feeds_metrics() {
        let (monitor, clock) = monitor(10);
        let mut monitor = monitor.with_memory_probe(Box::new(FixedMemory(0.97)));
        let issues = frame(&mut monitor, &clock, 16.0);
        assert_eq!(monitor.performance_metrics().memory_usage, 0.97);
        let memory: Vec<_> = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::MemoryPressure)
            .collect();
        assert_eq!(memory.len(), 1);
        assert_eq!(memory[0].severity, IssueSeverity::High);
    }

    #[test]
    fn reset_clears_samples() {
        let (mut monitor, clock) = monitor(10);
        frame(&mut monitor, &clock, 150.0);
        monitor.reset();
        assert!(monitor.window().is_empty());
        assert_eq!(monitor.detector().stutter_count(), 0);
        assert_eq!(monitor.performance_metrics().performance_score, 100.0);
    }
}
