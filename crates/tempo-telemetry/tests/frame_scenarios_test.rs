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

use approx::assert_relative_eq;
use std::time::Duration;
use tempo_core::platform::MemoryProbe;
use tempo_core::telemetry::{FrameTimeEntry, IssueSeverity, IssueType, PerformanceMetrics};
use tempo_core::ManualClock;
use tempo_telemetry::{
    AnalyzerConfig, DetectionThresholds, MonitorConfig, PerformanceAnalyzer,
    PerformanceEventDetector, PerformanceMonitor,
};

struct SteadyMemory(f64);

impl MemoryProbe for SteadyMemory {
    fn memory_usage(&self) -> Option<f64> {
        Some(self.0)
    }
}

fn run_frames(monitor: &mut PerformanceMonitor, clock: &ManualClock, frames: &[f64]) {
    for &ms in frames {
        monitor.start_frame();
        clock.advance_ms(ms);
        monitor.end_frame();
    }
}

#[test]
fn test_window_keeps_last_frames_at_60_fps() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new();
    let config = MonitorConfig {
        window_capacity: 10,
        ..Default::default()
    };
    let mut monitor =
        PerformanceMonitor::new(config, DetectionThresholds::default(), clock.shared());

    // --- 2. ACT ---
    run_frames(&mut monitor, &clock, &[16.67; 15]);

    // --- 3. ASSERT ---
    assert_eq!(monitor.window().len(), 10, "Window must hold the last 10 frames");
    let stamps: Vec<Duration> = monitor.window().iter().map(|e| e.timestamp).collect();
    assert!(
        stamps.windows(2).all(|w| w[0] <= w[1]),
        "Entries must stay timestamp-ordered"
    );
    assert_relative_eq!(monitor.current_fps(), 60.0, epsilon = 0.1);
    assert_eq!(monitor.performance_metrics().performance_score, 100.0);
    assert!(!monitor.is_performance_issue_active());
}

#[test]
fn test_window_never_exceeds_capacity() {
    let clock = ManualClock::new();
    for capacity in [1, 3, 7, 60] {
        let config = MonitorConfig {
            window_capacity: capacity,
            ..Default::default()
        };
        let mut monitor =
            PerformanceMonitor::new(config, DetectionThresholds::default(), clock.shared());
        for i in 0..(capacity * 3) {
            run_frames(&mut monitor, &clock, &[5.0 + (i % 7) as f64 * 20.0]);
            assert!(monitor.window().len() <= capacity);
        }
    }
}

#[test]
fn test_single_150ms_frame_is_one_low_stutter() {
    let mut detector = PerformanceEventDetector::new(DetectionThresholds::default());
    let metrics = PerformanceMetrics {
        current_fps: 60.0,
        ..Default::default()
    };
    let entry = FrameTimeEntry::new(Duration::from_secs(1), 150.0, 150.0);

    let issues = detector.detect(&metrics, &entry);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::Stutter);
    assert_eq!(issues[0].severity, IssueSeverity::Low);
}

#[test]
fn test_memory_at_97_percent_is_high_pressure() {
    let clock = ManualClock::new();
    let mut monitor = PerformanceMonitor::new(
        MonitorConfig::default(),
        DetectionThresholds::default(),
        clock.shared(),
    )
    .with_memory_probe(Box::new(SteadyMemory(0.97)));

    monitor.start_frame();
    clock.advance_ms(16.67);
    let issues = monitor.end_frame();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::MemoryPressure);
    assert_eq!(issues[0].severity, IssueSeverity::High);
}

#[test]
fn test_analyzer_follows_monitor() {
    // --- 1. ARRANGE ---
    let clock = ManualClock::new();
    let mut monitor = PerformanceMonitor::new(
        MonitorConfig::default(),
        DetectionThresholds::default(),
        clock.shared(),
    );
    let mut analyzer = PerformanceAnalyzer::new(AnalyzerConfig::default(), clock.shared());

    // --- 2. ACT ---
    let mut frames = vec![16.67; 120];
    frames[60] = 450.0;
    for ms in frames {
        monitor.start_frame();
        clock.advance_ms(ms);
        for issue in monitor.end_frame() {
            analyzer.record_issue(issue);
        }
        analyzer.record_metrics(monitor.performance_metrics());
    }

    // --- 3. ASSERT ---
    let summary = analyzer.generate_summary(Duration::from_secs(60));
    assert_eq!(summary.sample_count, 120);
    assert_eq!(summary.issue_counts.get("stutter"), Some(&1));
    assert_eq!(summary.high_severity_issues, 1);
    assert!(summary.fps.min < summary.fps.max);

    let score = analyzer.calculate_performance_score(monitor.window());
    assert!(score < 100.0, "A stutter in the window must cost points");
}
