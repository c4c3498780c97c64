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

//! Diagnostic aggregation over a long metrics history.
//!
//! The `PerformanceAnalyzer` keeps its own bounded history of snapshots and
//! issues, independent from the monitor's live window. It is used for
//! reports and recommendations, never for the real-time control decision.

use crate::scoring;
use crate::window::PerformanceWindow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tempo_core::telemetry::{IssueSeverity, IssueType, PerformanceIssue, PerformanceMetrics};
use tempo_core::SharedClock;

/// Average FPS, as a fraction of the target, below which effects should go.
const LOW_FPS_RATIO: f64 = 0.75;
/// Stutters per minute above which background load is suspected.
const STUTTERS_PER_MINUTE_WARN: f64 = 6.0;
/// Stability below which frame pacing is flagged.
const STABILITY_WARN: f64 = 70.0;

/// History sizing and scoring target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum number of snapshots and of issues kept (each).
    pub max_history: usize,
    /// Frame rate scores are measured against.
    pub target_fps: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            target_fps: 60.0,
        }
    }
}

/// Result of [`PerformanceAnalyzer::analyze_performance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    /// Mean performance score of the snapshots in the window (0..100).
    pub overall_score: f64,
    /// Frame-rate steadiness (0..100), 100 meaning perfectly constant FPS.
    pub stability: f64,
    /// Mean FPS as a percentage of the target (0..100).
    pub average_performance: f64,
    /// Issues per second in the window.
    pub issue_frequency: f64,
    /// Human-readable suggestions.
    pub recommendations: Vec<String>,
}

/// Min, mean and max of the frame rate over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FpsStatistics {
    /// Lowest sampled FPS.
    pub min: f64,
    /// Mean sampled FPS.
    pub average: f64,
    /// Highest sampled FPS.
    pub max: f64,
}

/// Result of [`PerformanceAnalyzer::generate_summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Length of the summarised window.
    pub time_window: Duration,
    /// Snapshots inside the window.
    pub sample_count: usize,
    /// Frame-rate statistics.
    pub fps: FpsStatistics,
    /// Mean frame time, in milliseconds.
    pub average_frame_time_ms: f64,
    /// Issues inside the window, keyed by issue type name.
    pub issue_counts: BTreeMap<String, usize>,
    /// High-severity issues inside the window.
    pub high_severity_issues: usize,
}

/// Aggregates metrics snapshots and issues into reports.
pub struct PerformanceAnalyzer {
    config: AnalyzerConfig,
    clock: SharedClock,
    metrics_history: VecDeque<PerformanceMetrics>,
    issue_history: VecDeque<PerformanceIssue>,
}

impl PerformanceAnalyzer {
    /// Creates an analyzer with an empty history.
    pub fn new(config: AnalyzerConfig, clock: SharedClock) -> Self {
        let max = config.max_history.max(1);
        Self {
            config: AnalyzerConfig {
                max_history: max,
                ..config
            },
            clock,
            metrics_history: VecDeque::with_capacity(max),
            issue_history: VecDeque::new(),
        }
    }

    /// Appends a snapshot, evicting the oldest on overflow.
    pub fn record_metrics(&mut self, metrics: PerformanceMetrics) {
        if self.metrics_history.len() == self.config.max_history {
            self.metrics_history.pop_front();
        }
        self.metrics_history.push_back(metrics);
    }

    /// Appends an issue, evicting the oldest on overflow.
    pub fn record_issue(&mut self, issue: PerformanceIssue) {
        if self.issue_history.len() == self.config.max_history {
            self.issue_history.pop_front();
        }
        self.issue_history.push_back(issue);
    }

    /// Number of stored snapshots.
    pub fn metrics_len(&self) -> usize {
        self.metrics_history.len()
    }

    /// Number of stored issues.
    pub fn issues_len(&self) -> usize {
        self.issue_history.len()
    }

    /// Drops both histories.
    pub fn clear(&mut self) {
        self.metrics_history.clear();
        self.issue_history.clear();
    }

    /// Scores a frame window against the configured target.
    ///
    /// Returns exactly 100 for an empty window.
    pub fn calculate_performance_score(&self, window: &PerformanceWindow) -> f64 {
        scoring::performance_score(window, self.config.target_fps)
    }

    fn horizon(&self, time_window: Duration) -> Duration {
        self.clock.now().saturating_sub(time_window)
    }

    fn metrics_in(&self, time_window: Duration) -> Vec<&PerformanceMetrics> {
        let horizon = self.horizon(time_window);
        self.metrics_history
            .iter()
            .filter(|m| m.timestamp >= horizon)
            .collect()
    }

    fn issues_in(&self, time_window: Duration) -> Vec<&PerformanceIssue> {
        let horizon = self.horizon(time_window);
        self.issue_history
            .iter()
            .filter(|i| i.timestamp >= horizon)
            .collect()
    }

    /// Analyzes the entries of the last `time_window`.
    pub fn analyze_performance(&self, time_window: Duration) -> PerformanceAnalysis {
        let samples = self.metrics_in(time_window);
        let issues = self.issues_in(time_window);

        if samples.is_empty() {
            return PerformanceAnalysis {
                overall_score: 100.0,
                stability: 100.0,
                average_performance: 100.0,
                issue_frequency: 0.0,
                recommendations: Vec::new(),
            };
        }

        let n = samples.len() as f64;
        let overall_score = samples.iter().map(|m| m.performance_score).sum::<f64>() / n;
        let mean_fps = samples.iter().map(|m| m.current_fps).sum::<f64>() / n;
        let stability = if mean_fps > 0.0 {
            let variance = samples
                .iter()
                .map(|m| (m.current_fps - mean_fps).powi(2))
                .sum::<f64>()
                / n;
            (100.0 * (1.0 - variance.sqrt() / mean_fps)).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let average_performance = if self.config.target_fps > 0.0 {
            (mean_fps / self.config.target_fps * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        let seconds = time_window.as_secs_f64();
        let issue_frequency = if seconds > 0.0 {
            issues.len() as f64 / seconds
        } else {
            0.0
        };

        let recommendations = self.recommend(mean_fps, stability, &issues, seconds);

        PerformanceAnalysis {
            overall_score,
            stability,
            average_performance,
            issue_frequency,
            recommendations,
        }
    }

    /// Rule-based suggestions.
    ///
    /// 1. **Sustained low FPS**: reduce effects.
    /// 2. **Frequent stutters**: look for background load.
    /// 3. **Memory pressure**: release assets.
    /// 4. **Unstable pacing**: cap the frame rate.
    fn recommend(
        &self,
        mean_fps: f64,
        stability: f64,
        issues: &[&PerformanceIssue],
        seconds: f64,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if mean_fps < self.config.target_fps * LOW_FPS_RATIO {
            out.push(format!(
                "Sustained low frame rate ({mean_fps:.0} FPS): reduce visual effects and particle counts."
            ));
        }

        let stutters = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::Stutter)
            .count();
        if seconds > 0.0 && stutters as f64 / seconds * 60.0 > STUTTERS_PER_MINUTE_WARN {
            out.push(format!(
                "Frequent stutters ({stutters} in {seconds:.0}s): check background processes."
            ));
        }

        let memory_high = issues.iter().any(|i| {
            i.issue_type == IssueType::MemoryPressure && i.severity >= IssueSeverity::Medium
        });
        if memory_high {
            out.push("Memory pressure: lower texture quality or release unused assets.".into());
        }

        if stability < STABILITY_WARN {
            out.push("Unstable frame pacing: consider capping the frame rate.".into());
        }

        out
    }

    /// Descriptive statistics of the last `time_window`.
    pub fn generate_summary(&self, time_window: Duration) -> PerformanceSummary {
        let samples = self.metrics_in(time_window);
        let issues = self.issues_in(time_window);

        let fps = if samples.is_empty() {
            FpsStatistics::default()
        } else {
            let values = samples.iter().map(|m| m.current_fps);
            FpsStatistics {
                min: values.clone().fold(f64::INFINITY, f64::min),
                average: values.clone().sum::<f64>() / samples.len() as f64,
                max: values.fold(f64::NEG_INFINITY, f64::max),
            }
        };
        let average_frame_time_ms = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|m| m.average_frame_time_ms).sum::<f64>() / samples.len() as f64
        };

        let mut issue_counts = BTreeMap::new();
        for issue in &issues {
            *issue_counts
                .entry(issue.issue_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        PerformanceSummary {
            time_window,
            sample_count: samples.len(),
            fps,
            average_frame_time_ms,
            issue_counts,
            high_severity_issues: issues
                .iter()
                .filter(|i| i.severity == IssueSeverity::High)
                .count(),
        }
    }

    /// [`generate_summary`](Self::generate_summary) as pretty-printed JSON.
    pub fn export_summary_json(&self, time_window: Duration) -> anyhow::Result<String> {
        let summary = self.generate_summary(time_window);
        Ok(serde_json::to_string_pretty(&summary)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempo_core::ManualClock;

    fn snapshot(at_secs: u64, fps: f64, score: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            current_fps: fps,
            average_frame_time_ms: if fps > 0.0 { 1000.0 / fps } else { 0.0 },
            performance_score: score,
            timestamp: Duration::from_secs(at_secs),
            ..Default::default()
        }
    }

    fn issue(at_secs: u64, issue_type: IssueType, severity: IssueSeverity) -> PerformanceIssue {
        PerformanceIssue {
            issue_type,
            severity,
            timestamp: Duration::from_secs(at_secs),
            duration: Duration::from_millis(150),
            metrics: PerformanceMetrics::default(),
        }
    }

    fn analyzer() -> (PerformanceAnalyzer, ManualClock) {
        let clock = ManualClock::new();
        (
            PerformanceAnalyzer::new(AnalyzerConfig::default(), clock.shared()),
            clock,
        )
    }

    #[test]
    fn history_is_bounded() {
        let clock = ManualClock::new();
        let mut analyzer = PerformanceAnalyzer::new(
            AnalyzerConfig {
                max_history: 3,
                ..Default::default()
            },
            clock.shared(),
        );
        for i in 0..5 {
            analyzer.record_metrics(snapshot(i, 60.0, 100.0));
            analyzer.record_issue(issue(i, IssueType::Stutter, IssueSeverity::Low));
        }
        assert_eq!(analyzer.metrics_len(), 3);
        assert_eq!(analyzer.issues_len(), 3);
    }

    #[test]
    fn empty_history_is_healthy() {
        let (analyzer, _clock) = analyzer();
        let analysis = analyzer.analyze_performance(Duration::from_secs(10));
        assert_eq!(analysis.overall_score, 100.0);
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn steady_history_has_full_stability() {
        let (mut analyzer, clock) = analyzer();
        for i in 0..10 {
            analyzer.record_metrics(snapshot(i, 60.0, 100.0));
        }
        clock.set(Duration::from_secs(10));
        let analysis = analyzer.analyze_performance(Duration::from_secs(20));
        assert_relative_eq!(analysis.stability, 100.0);
        assert_relative_eq!(analysis.average_performance, 100.0);
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn low_fps_and_stutters_produce_recommendations() {
        let (mut analyzer, clock) = analyzer();
        for i in 0..10 {
            analyzer.record_metrics(snapshot(i, 20.0, 30.0));
            analyzer.record_issue(issue(i, IssueType::Stutter, IssueSeverity::Medium));
        }
        clock.set(Duration::from_secs(10));
        let analysis = analyzer.analyze_performance(Duration::from_secs(10));
        assert_relative_eq!(analysis.issue_frequency, 1.0);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("reduce visual effects")));
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("background processes")));
    }

    #[test]
    fn summary_filters_by_time() {
        let (mut analyzer, clock) = analyzer();
        analyzer.record_metrics(snapshot(1, 10.0, 10.0));
        analyzer.record_metrics(snapshot(8, 30.0, 50.0));
        analyzer.record_metrics(snapshot(9, 60.0, 100.0));
        analyzer.record_issue(issue(1, IssueType::LowFps, IssueSeverity::High));
        analyzer.record_issue(issue(9, IssueType::Stutter, IssueSeverity::Low));
        analyzer.record_issue(issue(9, IssueType::Stutter, IssueSeverity::High));
        clock.set(Duration::from_secs(10));

        let summary = analyzer.generate_summary(Duration::from_secs(5));
        assert_eq!(summary.sample_count, 2);
        assert_relative_eq!(summary.fps.min, 30.0);
        assert_relative_eq!(summary.fps.average, 45.0);
        assert_relative_eq!(summary.fps.max, 60.0);
        assert_eq!(summary.issue_counts.get("stutter"), Some(&2));
        assert_eq!(summary.issue_counts.get("low_fps"), None);
        assert_eq!(summary.high_severity_issues, 1);
    }

    #[test]
    fn summary_exports_as_json() {
        let (mut analyzer, _clock) = analyzer();
        analyzer.record_metrics(snapshot(0, 60.0, 100.0));
        let json = analyzer.export_summary_json(Duration::from_secs(5)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sample_count"], 1);
    }
}
