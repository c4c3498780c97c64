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

//! The public entry point of Tempo.
//!
//! [`QualityRuntime`] owns one instance of every component and wires them the
//! way a frame loop needs them: detected issues flow from the monitor into the
//! optimizer and the analyzer, quality changes flow from the manager into the
//! optimizer. The application only brackets its frames with
//! [`begin_frame`](QualityRuntime::begin_frame) and
//! [`end_frame`](QualityRuntime::end_frame).

#![warn(missing_docs)]

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Duration;
use tempo_control::{BenchmarkConfig, DynamicQualityManager, QualityManagerConfig};
use tempo_core::event::ObserverId;
use tempo_core::platform::HardwareProbe;
use tempo_core::quality::QualitySettings;
use tempo_core::renderer::RenderHost;
use tempo_core::telemetry::PerformanceIssue;
use tempo_core::{SharedClock, SystemClock};
use tempo_infra::SysinfoProbe;
use tempo_lanes::{OptimizerConfig, RenderingOptimizer};
use tempo_telemetry::{
    AnalyzerConfig, DetectionThresholds, MonitorConfig, PerformanceAnalyzer, PerformanceMonitor,
    SharedMonitor,
};

pub mod prelude {
    //! The types an application needs to drive a [`QualityRuntime`](crate::QualityRuntime).
    pub use crate::{QualityRuntime, RuntimeConfig};
    pub use tempo_core::platform::{HardwareProbe, NullProbe};
    pub use tempo_core::quality::{QualityChange, QualitySettingsUpdate, QualityTier};
    pub use tempo_core::renderer::{
        CameraView, Drawable, DrawableId, Position, RenderHost, SharedDrawable, TextStyle,
    };
    pub use tempo_core::telemetry::{IssueSeverity, IssueType, PerformanceIssue};
    pub use tempo_core::{Clock, HostError, HostResult, ManualClock, SystemClock};
    pub use tempo_lanes::TextRequest;
}

/// Every component's configuration in one place.
///
/// Missing sections fall back to their defaults when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Frame window sizing.
    pub monitor: MonitorConfig,
    /// Issue classification.
    pub thresholds: DetectionThresholds,
    /// Long-history diagnostics.
    pub analyzer: AnalyzerConfig,
    /// Control-loop timing.
    pub manager: QualityManagerConfig,
    /// Initial controller settings.
    pub settings: QualitySettings,
    /// Startup micro-benchmark.
    pub benchmark: BenchmarkConfig,
    /// Emergency mode and self-check tuning.
    pub optimizer: OptimizerConfig,
}

impl RuntimeConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid runtime configuration")
    }
}

/// The wired adaptive-quality core.
pub struct QualityRuntime {
    clock: SharedClock,
    monitor: SharedMonitor,
    manager: DynamicQualityManager,
    optimizer: Rc<RefCell<RenderingOptimizer>>,
    analyzer: Rc<RefCell<PerformanceAnalyzer>>,
    issue_subscription: Option<ObserverId>,
    frame_open: bool,
    destroyed: bool,
}

impl QualityRuntime {
    /// Builds and wires every component around `clock`.
    ///
    /// The manager starts at minimal; call [`initialize`](Self::initialize)
    /// to probe the device and start the control loop.
    pub fn new(config: RuntimeConfig, clock: SharedClock) -> Self {
        let monitor = PerformanceMonitor::new(config.monitor, config.thresholds, clock.clone());
        Self::assemble(config, clock, monitor)
    }

    /// A runtime on the wall clock that samples system memory every frame.
    pub fn with_system_probe(config: RuntimeConfig) -> Self {
        let clock = SystemClock::shared();
        let monitor = PerformanceMonitor::new(config.monitor, config.thresholds, clock.clone())
            .with_memory_probe(Box::new(SysinfoProbe::new()));
        Self::assemble(config, clock, monitor)
    }

    fn assemble(config: RuntimeConfig, clock: SharedClock, monitor: PerformanceMonitor) -> Self {
        let monitor = monitor.into_shared();
        let optimizer = Rc::new(RefCell::new(RenderingOptimizer::new(
            config.optimizer,
            clock.clone(),
        )));
        let analyzer = Rc::new(RefCell::new(PerformanceAnalyzer::new(
            config.analyzer,
            clock.clone(),
        )));
        let mut manager = DynamicQualityManager::new(config.manager, config.settings, clock.clone())
            .with_benchmark(config.benchmark);

        let issue_subscription = {
            let optimizer = optimizer.clone();
            let analyzer = analyzer.clone();
            monitor
                .borrow_mut()
                .on_performance_issue(move |issue: &PerformanceIssue| {
                    analyzer
                        .try_borrow_mut()
                        .context("analyzer is busy")?
                        .record_issue(issue.clone());
                    optimizer
                        .try_borrow_mut()
                        .context("optimizer is busy")?
                        .on_performance_issue(issue);
                    Ok(())
                })
        };

        {
            let optimizer = optimizer.clone();
            manager.on_quality_change(move |change| {
                optimizer
                    .try_borrow_mut()
                    .context("optimizer is busy")?
                    .apply_quality_change(change);
                Ok(())
            });
        }

        Self {
            clock,
            monitor,
            manager,
            optimizer,
            analyzer,
            issue_subscription: Some(issue_subscription),
            frame_open: false,
            destroyed: false,
        }
    }

    /// Probes the device and starts progressive enhancement.
    pub async fn initialize(&mut self, probe: &dyn HardwareProbe, host: &mut dyn RenderHost) {
        self.manager
            .initialize(probe, host, self.monitor.clone())
            .await;
        if let Some(camera) = host.camera() {
            self.optimizer.borrow_mut().set_camera(camera);
        }
        if let Some(capabilities) = self.manager.capabilities() {
            log::info!(
                "QualityRuntime: device score {:.0}, ceiling {}, max {} objects",
                capabilities.performance_score,
                capabilities.recommended_quality,
                capabilities.max_objects
            );
        }
    }

    /// Probes this machine through `sysinfo`.
    pub async fn initialize_with_system_probe(&mut self, host: &mut dyn RenderHost) {
        let probe = SysinfoProbe::new();
        self.initialize(&probe, host).await;
    }

    /// Marks the start of a frame.
    pub fn begin_frame(&mut self) {
        if self.destroyed {
            return;
        }
        self.monitor.borrow_mut().start_frame();
        self.frame_open = true;
    }

    /// Closes the frame, then advances the control loop and the optimizer.
    ///
    /// Metrics are finalized and issues dispatched before any timer runs, so
    /// a check in this frame already sees this frame's sample.
    pub fn end_frame(&mut self) -> Vec<PerformanceIssue> {
        if self.destroyed {
            return Vec::new();
        }
        let (issues, metrics) = {
            let mut monitor = self.monitor.borrow_mut();
            let issues = monitor.end_frame();
            (issues, monitor.performance_metrics())
        };
        if std::mem::take(&mut self.frame_open) {
            self.analyzer.borrow_mut().record_metrics(metrics);
        }
        self.manager.update();
        self.optimizer.borrow_mut().update();
        issues
    }

    /// The shared monitor.
    pub fn monitor(&self) -> &SharedMonitor {
        &self.monitor
    }

    /// The quality manager.
    pub fn manager(&self) -> &DynamicQualityManager {
        &self.manager
    }

    /// Mutable access to the quality manager, for manual overrides.
    pub fn manager_mut(&mut self) -> &mut DynamicQualityManager {
        &mut self.manager
    }

    /// The rendering optimizer.
    pub fn optimizer(&self) -> Ref<'_, RenderingOptimizer> {
        self.optimizer.borrow()
    }

    /// Mutable access to the rendering optimizer for per-frame scene work.
    pub fn optimizer_mut(&self) -> RefMut<'_, RenderingOptimizer> {
        self.optimizer.borrow_mut()
    }

    /// The long-history analyzer.
    pub fn analyzer(&self) -> Ref<'_, PerformanceAnalyzer> {
        self.analyzer.borrow()
    }

    /// The runtime's clock.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Logs a short report of the last `time_window`.
    pub fn log_summary(&self, time_window: Duration) {
        let analysis = self.analyzer.borrow().analyze_performance(time_window);
        let metrics = self.optimizer.borrow().get_metrics();
        log::info!("--- Quality Summary ---");
        log::info!(
            "  Tier: {} ({} transitions)",
            self.manager.current_tier(),
            self.manager.get_adjustment_history().len()
        );
        log::info!(
            "  Score: {:.1} (stability {:.1}, {:.2} issues/s)",
            analysis.overall_score,
            analysis.stability,
            analysis.issue_frequency
        );
        log::info!(
            "  Optimizer: {} rendered, {} culled, {} LOD reductions, {}/{} cache hits, {} emergencies",
            metrics.objects_rendered,
            metrics.objects_culled,
            metrics.lod_reductions,
            metrics.cache_hits,
            metrics.cache_hits + metrics.cache_misses,
            metrics.emergency_activations
        );
        for recommendation in &analysis.recommendations {
            log::info!("  Hint: {recommendation}");
        }
        log::info!("-----------------------");
    }

    /// Stops the control loop and releases the optimizer's text objects.
    ///
    /// The runtime is inert afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(id) = self.issue_subscription.take() {
            if let Ok(mut monitor) = self.monitor.try_borrow_mut() {
                monitor.remove_issue_callback(id);
            }
        }
        self.manager.destroy();
        if let Ok(mut optimizer) = self.optimizer.try_borrow_mut() {
            optimizer.destroy();
        }
        log::info!("QualityRuntime: shut down");
    }

    /// Whether [`destroy`](Self::destroy) ran.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for QualityRuntime {
    fn drop(&mut self) {
        self.destroy();
    }
}
