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

//! # Tempo Telemetry
//!
//! Measures frames and turns them into metrics, issues and reports.
//!
//! - [`PerformanceWindow`]: bounded, ordered frame samples.
//! - [`PerformanceMonitor`]: brackets frames and publishes issues.
//! - [`PerformanceEventDetector`]: classifies a frame into issues.
//! - [`PerformanceAnalyzer`]: long-history diagnostics.

#![warn(missing_docs)]

pub mod analyzer;
pub mod detector;
pub mod monitor;
pub mod scoring;
pub mod window;

pub use analyzer::{
    AnalyzerConfig, FpsStatistics, PerformanceAnalysis, PerformanceAnalyzer, PerformanceSummary,
};
pub use detector::{DetectionThresholds, PerformanceEventDetector};
pub use monitor::{MonitorConfig, PerformanceMonitor, SharedMonitor};
pub use scoring::performance_score;
pub use window::PerformanceWindow;
