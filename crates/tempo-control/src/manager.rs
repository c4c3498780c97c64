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

//! The adaptive quality control loop.
//!
//! The manager's only state machine is the current [`QualityTier`]. It moves
//! through three paths:
//!
//! 1. **Progressive enhancement** right after [`initialize`]: step up one
//!    tier every `enhancement_step_interval` while FPS holds the target,
//!    until the device ceiling, a degraded check or `enhancement_duration`.
//! 2. **Periodic check** every `check_interval` while adaptive mode is on:
//!    reduce below `reduction_threshold`, recover above
//!    `recovery_threshold`, one tier per step, gated by the cooldown and the
//!    stability period.
//! 3. **Manual** changes through [`set_quality_level`], which bypass every
//!    gate.
//!
//! Timers are cooperative: the frame loop calls [`update`] and the manager
//! acts when an interval has elapsed.
//!
//! [`initialize`]: DynamicQualityManager::initialize
//! [`set_quality_level`]: DynamicQualityManager::set_quality_level
//! [`update`]: DynamicQualityManager::update

use crate::device::{BenchmarkConfig, DeviceCapabilityDetector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempo_core::event::{ObserverId, ObserverList};
use tempo_core::platform::{DeviceCapabilities, HardwareProbe};
use tempo_core::quality::{
    AdjustmentReason, QualityAdjustment, QualityChange, QualityLevel, QualitySettings,
    QualitySettingsUpdate, QualityTier,
};
use tempo_core::renderer::RenderHost;
use tempo_core::telemetry::PerformanceMetrics;
use tempo_core::SharedClock;
use tempo_telemetry::SharedMonitor;

/// Timing of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityManagerConfig {
    /// Interval of the periodic performance check.
    pub check_interval: Duration,
    /// Minimum time between two automatic transitions.
    pub cooldown: Duration,
    /// Time without a reduction required before a recovery.
    pub stability_period: Duration,
    /// Interval between two enhancement steps.
    pub enhancement_step_interval: Duration,
    /// Upper bound on the length of the enhancement ramp.
    pub enhancement_duration: Duration,
}

impl Default for QualityManagerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3),
            cooldown: Duration::from_secs(5),
            stability_period: Duration::from_secs(30),
            enhancement_step_interval: Duration::from_secs(2),
            enhancement_duration: Duration::from_secs(12),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Enhancement {
    started_at: Duration,
    last_step: Duration,
}

/// Owns the current quality tier and decides when to change it.
pub struct DynamicQualityManager {
    config: QualityManagerConfig,
    clock: SharedClock,
    settings: QualitySettings,
    monitor: Option<SharedMonitor>,
    detector: DeviceCapabilityDetector,
    capabilities: Option<DeviceCapabilities>,
    history: Vec<QualityAdjustment>,
    observers: ObserverList<QualityChange>,
    /// `Some` while the periodic check is scheduled.
    last_check: Option<Duration>,
    last_auto_adjustment: Option<Duration>,
    last_reduction: Option<Duration>,
    enhancement: Option<Enhancement>,
    destroyed: bool,
}

impl DynamicQualityManager {
    /// Creates a manager at [`QualityTier::Minimal`].
    ///
    /// `settings.current_level` is ignored: the manager always starts at the
    /// lowest tier.
    pub fn new(
        config: QualityManagerConfig,
        settings: QualitySettings,
        clock: SharedClock,
    ) -> Self {
        Self {
            config,
            settings: QualitySettings {
                current_level: QualityTier::Minimal,
                ..settings
            },
            detector: DeviceCapabilityDetector::new(BenchmarkConfig::default(), clock.clone()),
            clock,
            monitor: None,
            capabilities: None,
            history: Vec::new(),
            observers: ObserverList::new("DynamicQualityManager"),
            last_check: None,
            last_auto_adjustment: None,
            last_reduction: None,
            enhancement: None,
            destroyed: false,
        }
    }

    /// Replaces the capability detector's benchmark size.
    pub fn with_benchmark(mut self, benchmark: BenchmarkConfig) -> Self {
        self.detector = DeviceCapabilityDetector::new(benchmark, self.clock.clone());
        self
    }

    /// Probes the device, attaches the monitor and starts the control loop.
    ///
    /// The tier stays at minimal; progressive enhancement raises it over the
    /// following updates. Calling this again re-runs detection and restarts
    /// the ramp.
    pub async fn initialize(
        &mut self,
        probe: &dyn HardwareProbe,
        host: &mut dyn RenderHost,
        monitor: SharedMonitor,
    ) {
        if self.destroyed {
            log::warn!("DynamicQualityManager: initialize on a destroyed manager, ignored");
            return;
        }
        self.monitor = Some(monitor);
        let capabilities = self.detector.detect_capabilities(probe, host).await;
        self.capabilities = Some(capabilities);

        let now = self.clock.now();
        if self.settings.adaptive_mode {
            self.enhancement = Some(Enhancement {
                started_at: now,
                last_step: now,
            });
            self.last_check = Some(now);
            log::info!(
                "DynamicQualityManager: starting progressive enhancement (ceiling {})",
                capabilities.recommended_quality
            );
        } else {
            log::info!(
                "DynamicQualityManager: adaptive mode off, staying at {}",
                self.settings.current_level
            );
        }
    }

    /// Advances the timers. Call once per frame, after the monitor's `end_frame`.
    pub fn update(&mut self) {
        if self.destroyed {
            return;
        }
        let now = self.clock.now();

        if let Some(enhancement) = self.enhancement {
            if now.saturating_sub(enhancement.last_step) >= self.config.enhancement_step_interval {
                self.enhancement_step(now);
            }
            if let Some(enhancement) = self.enhancement {
                if now.saturating_sub(enhancement.started_at) >= self.config.enhancement_duration {
                    self.stop_enhancement(now, "duration elapsed");
                }
            }
            return;
        }

        if let Some(last) = self.last_check {
            let due = now.saturating_sub(last) >= self.config.check_interval;
            if self.settings.adaptive_mode && due {
                self.last_check = Some(now);
                self.check(now);
            }
        }
    }

    fn enhancement_step(&mut self, now: Duration) {
        let Some((metrics, has_samples)) = self.read_monitor() else {
            self.stop_enhancement(now, "no monitor");
            return;
        };
        if let Some(enhancement) = self.enhancement.as_mut() {
            enhancement.last_step = now;
        }
        if !has_samples {
            log::trace!("DynamicQualityManager: no frames yet, enhancement step skipped");
            return;
        }

        let ceiling = self.recommended_tier();
        let current = self.settings.current_level;
        if metrics.current_fps < self.settings.performance_target {
            self.stop_enhancement(now, "performance below target");
        } else if current >= ceiling {
            self.stop_enhancement(now, "device ceiling reached");
        } else if let Some(next) = current.higher() {
            self.transition(next, AdjustmentReason::ProgressiveEnhancement, metrics, now);
            self.last_auto_adjustment = Some(now);
            if next >= ceiling {
                self.stop_enhancement(now, "device ceiling reached");
            }
        }
    }

    fn stop_enhancement(&mut self, now: Duration, why: &str) {
        if self.enhancement.take().is_some() {
            log::info!(
                "DynamicQualityManager: progressive enhancement finished at {} ({})",
                self.settings.current_level,
                why
            );
            if self.settings.adaptive_mode {
                self.last_check = Some(now);
            }
        }
    }

    /// Current metrics and whether the monitor has seen any frame.
    fn read_monitor(&self) -> Option<(PerformanceMetrics, bool)> {
        let monitor = self.monitor.as_ref()?;
        let monitor = monitor.borrow();
        Some((monitor.performance_metrics(), !monitor.window().is_empty()))
    }

    fn check(&mut self, now: Duration) -> Option<QualityAdjustment> {
        let (metrics, has_samples) = self.read_monitor()?;
        if !has_samples {
            return None;
        }
        let fps = metrics.current_fps;
        let current = self.settings.current_level;
        let cooling_down = self
            .last_auto_adjustment
            .is_some_and(|at| now.saturating_sub(at) < self.config.cooldown);

        if fps < self.settings.reduction_threshold {
            if !self.settings.auto_reduction {
                return None;
            }
            if cooling_down {
                log::debug!(
                    "DynamicQualityManager: reduction suppressed by cooldown ({fps:.1} FPS)"
                );
                return None;
            }
            let lower = current.lower()?;
            let adjustment =
                self.transition(lower, AdjustmentReason::PerformanceDrop, metrics, now);
            self.last_reduction = Some(now);
            self.last_auto_adjustment = Some(now);
            return Some(adjustment);
        }

        if fps > self.settings.recovery_threshold {
            if cooling_down {
                return None;
            }
            let unstable = self
                .last_reduction
                .is_some_and(|at| now.saturating_sub(at) < self.config.stability_period);
            if unstable {
                log::debug!("DynamicQualityManager: recovery held back, reduced too recently");
                return None;
            }
            let higher = current.higher()?;
            let adjustment =
                self.transition(higher, AdjustmentReason::PerformanceRecovery, metrics, now);
            self.last_auto_adjustment = Some(now);
            return Some(adjustment);
        }

        None
    }

    /// Runs the performance check now, ignoring the check interval.
    ///
    /// The cooldown and stability rules still apply. Returns the adjustment
    /// made, if any.
    pub fn force_performance_check(&mut self) -> Option<QualityAdjustment> {
        if self.destroyed || !self.settings.adaptive_mode {
            return None;
        }
        let now = self.clock.now();
        if self.last_check.is_some() {
            self.last_check = Some(now);
        }
        self.check(now)
    }

    fn transition(
        &mut self,
        to: QualityTier,
        reason: AdjustmentReason,
        metrics: PerformanceMetrics,
        now: Duration,
    ) -> QualityAdjustment {
        let adjustment = QualityAdjustment {
            timestamp: now,
            from_level: self.settings.current_level,
            to_level: to,
            reason,
            performance_metrics: metrics,
        };
        self.settings.current_level = to;
        self.history.push(adjustment.clone());
        log::info!(
            "DynamicQualityManager: {} -> {} ({}, {:.1} FPS)",
            adjustment.from_level,
            to,
            reason,
            metrics.current_fps
        );

        let change = QualityChange {
            level: *to.level(),
            adjustment: adjustment.clone(),
        };
        self.observers.notify(&change);
        adjustment
    }

    /// Switches to the named tier immediately.
    ///
    /// Returns `false` and changes nothing if `name` is not a known tier.
    /// Requesting the current tier succeeds without recording a transition.
    /// A manual change ends progressive enhancement.
    pub fn set_quality_level(&mut self, name: &str) -> bool {
        if self.destroyed {
            return false;
        }
        let tier: QualityTier = match name.parse() {
            Ok(tier) => tier,
            Err(e) => {
                log::warn!("DynamicQualityManager: {e}");
                return false;
            }
        };
        let now = self.clock.now();
        self.stop_enhancement(now, "manual override");
        if tier != self.settings.current_level {
            let metrics = self.read_monitor().map(|(m, _)| m).unwrap_or_default();
            self.transition(tier, AdjustmentReason::Manual, metrics, now);
        }
        true
    }

    /// Knobs of the current tier.
    pub fn get_current_quality_level(&self) -> &'static QualityLevel {
        self.settings.current_level.level()
    }

    /// The current tier.
    pub fn current_tier(&self) -> QualityTier {
        self.settings.current_level
    }

    /// A snapshot of the settings.
    pub fn get_current_settings(&self) -> QualitySettings {
        self.settings
    }

    /// Merges a partial update into the settings.
    ///
    /// Turning adaptive mode off cancels the periodic check and the ramp;
    /// turning it back on reschedules the check.
    pub fn update_settings(&mut self, update: QualitySettingsUpdate) {
        if self.destroyed {
            return;
        }
        let was_adaptive = self.settings.adaptive_mode;
        self.settings.merge(&update);
        let now = self.clock.now();
        match (was_adaptive, self.settings.adaptive_mode) {
            (true, false) => {
                self.enhancement = None;
                self.last_check = None;
                log::info!("DynamicQualityManager: adaptive mode disabled");
            }
            (false, true) if self.monitor.is_some() => {
                self.last_check = Some(now);
                log::info!("DynamicQualityManager: adaptive mode enabled");
            }
            _ => {}
        }
    }

    /// Registers a subscriber called after every transition.
    pub fn on_quality_change<F>(&mut self, callback: F) -> ObserverId
    where
        F: FnMut(&QualityChange) -> anyhow::Result<()> + 'static,
    {
        self.observers.subscribe(Box::new(callback))
    }

    /// Removes a subscriber. Returns `false` if the handle is unknown.
    pub fn remove_quality_change_callback(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Every transition since creation, oldest first.
    pub fn get_adjustment_history(&self) -> &[QualityAdjustment] {
        &self.history
    }

    /// The detector's recommended starting point, minimal before detection.
    pub fn get_recommended_quality_level(&self) -> &'static QualityLevel {
        self.recommended_tier().level()
    }

    fn recommended_tier(&self) -> QualityTier {
        self.capabilities
            .map_or(QualityTier::Minimal, |c| c.recommended_quality)
    }

    /// The detected capabilities, once [`initialize`](Self::initialize) ran.
    pub fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.capabilities
    }

    /// Whether the startup ramp is still running.
    pub fn is_enhancing(&self) -> bool {
        self.enhancement.is_some()
    }

    /// Whether the periodic check is scheduled.
    pub fn is_checking(&self) -> bool {
        self.last_check.is_some()
    }

    /// Stops every timer, drops subscribers and detaches the monitor.
    ///
    /// The manager is inert afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.enhancement = None;
        self.last_check = None;
        self.observers.clear();
        self.monitor = None;
        log::debug!("DynamicQualityManager: destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_core::ManualClock;

    fn manager() -> (DynamicQualityManager, ManualClock) {
        let clock = ManualClock::new();
        let manager = DynamicQualityManager::new(
            QualityManagerConfig::default(),
            QualitySettings::default(),
            clock.shared(),
        );
        (manager, clock)
    }

    #[test]
    fn starts_at_minimal_whatever_the_settings_say() {
        let clock = ManualClock::new();
        let settings = QualitySettings {
            current_level: QualityTier::Ultra,
            ..Default::default()
        };
        let manager =
            DynamicQualityManager::new(QualityManagerConfig::default(), settings, clock.shared());
        assert_eq!(manager.current_tier(), QualityTier::Minimal);
        assert_eq!(manager.get_recommended_quality_level().tier, QualityTier::Minimal);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let (mut manager, _clock) = manager();
        assert!(!manager.set_quality_level("not-a-real-level"));
        assert_eq!(manager.current_tier(), QualityTier::Minimal);
        assert!(manager.get_adjustment_history().is_empty());
    }

    #[test]
    fn same_level_records_nothing() {
        let (mut manager, _clock) = manager();
        assert!(manager.set_quality_level("minimal"));
        assert!(manager.get_adjustment_history().is_empty());
    }

    #[test]
    fn manual_change_notifies_with_level_and_adjustment() {
        let (mut manager, _clock) = manager();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        manager.on_quality_change(move |change| {
            sink.borrow_mut()
                .push((change.level.tier, change.adjustment.reason));
            Ok(())
        });
        assert!(manager.set_quality_level("medium"));
        assert_eq!(
            *seen.borrow(),
            vec![(QualityTier::Medium, AdjustmentReason::Manual)]
        );
    }

    #[test]
    fn destroyed_manager_is_inert() {
        let (mut manager, _clock) = manager();
        manager.on_quality_change(|_| Ok(()));
        manager.destroy();
        assert!(!manager.set_quality_level("high"));
        assert!(manager.force_performance_check().is_none());
        manager.update();
        assert_eq!(manager.current_tier(), QualityTier::Minimal);
        assert!(!manager.is_checking());
    }

    #[test]
    fn check_without_monitor_does_nothing() {
        let (mut manager, _clock) = manager();
        assert!(manager.force_performance_check().is_none());
    }
}
