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

use std::cell::RefCell;
use std::rc::Rc;
use tempo_control::{DynamicQualityManager, QualityManagerConfig};
use tempo_core::platform::{HardwareProbe, MemoryInfo, NullProbe, ScreenInfo};
use tempo_core::quality::{AdjustmentReason, QualitySettings, QualitySettingsUpdate, QualityTier};
use tempo_core::testing::MockHost;
use tempo_core::ManualClock;
use tempo_telemetry::{DetectionThresholds, MonitorConfig, PerformanceMonitor, SharedMonitor};

const GIB: u64 = 1024 * 1024 * 1024;

/// A desktop strong enough to be recommended ultra.
struct WorkstationProbe;

impl HardwareProbe for WorkstationProbe {
    fn hardware_concurrency(&self) -> Option<usize> {
        Some(16)
    }

    fn memory(&self) -> Option<MemoryInfo> {
        Some(MemoryInfo {
            total_bytes: 32 * GIB,
            used_bytes: 4 * GIB,
        })
    }

    fn screen(&self) -> Option<ScreenInfo> {
        None
    }

    fn platform_name(&self) -> Option<String> {
        Some("linux".into())
    }
}

struct Harness {
    clock: ManualClock,
    monitor: SharedMonitor,
    manager: DynamicQualityManager,
}

impl Harness {
    async fn new(probe: &dyn HardwareProbe) -> Self {
        let clock = ManualClock::new();
        let monitor = PerformanceMonitor::new(
            MonitorConfig::default(),
            DetectionThresholds::default(),
            clock.shared(),
        )
        .into_shared();
        let mut manager = DynamicQualityManager::new(
            QualityManagerConfig::default(),
            QualitySettings::default(),
            clock.shared(),
        );
        let mut host = MockHost::new();
        manager.initialize(probe, &mut host, monitor.clone()).await;
        Self {
            clock,
            monitor,
            manager,
        }
    }

    /// Renders `count` frames of `ms` each, ticking the manager if asked.
    fn frames(&mut self, ms: f64, count: usize, tick: bool) {
        for _ in 0..count {
            self.monitor.borrow_mut().start_frame();
            self.clock.advance_ms(ms);
            self.monitor.borrow_mut().end_frame();
            if tick {
                self.manager.update();
            }
        }
    }

    fn reasons(&self) -> Vec<AdjustmentReason> {
        self.manager
            .get_adjustment_history()
            .iter()
            .map(|a| a.reason)
            .collect()
    }
}

#[tokio::test]
async fn test_invalid_level_name_changes_nothing() {
    let mut h = Harness::new(&NullProbe).await;
    let before = h.manager.get_current_quality_level().tier;

    assert!(!h.manager.set_quality_level("not-a-real-level"));

    assert_eq!(h.manager.get_current_quality_level().tier, before);
    assert!(h.manager.get_adjustment_history().is_empty());
}

#[tokio::test]
async fn test_manual_changes_in_succession_are_both_recorded() {
    let mut h = Harness::new(&NullProbe).await;

    assert!(h.manager.set_quality_level("high"));
    assert!(h.manager.set_quality_level("low"));

    assert_eq!(
        h.reasons(),
        vec![AdjustmentReason::Manual, AdjustmentReason::Manual]
    );
    let history = h.manager.get_adjustment_history();
    assert_eq!(history[0].from_level, QualityTier::Minimal);
    assert_eq!(history[0].to_level, QualityTier::High);
    assert_eq!(history[1].to_level, QualityTier::Low);
    assert_eq!(h.manager.current_tier(), QualityTier::Low);
}

#[tokio::test]
async fn test_two_reductions_within_cooldown_make_one_adjustment() {
    // --- 1. ARRANGE ---
    let mut h = Harness::new(&NullProbe).await;
    assert!(h.manager.set_quality_level("high"));
    h.frames(50.0, 60, false);

    // --- 2. ACT ---
    let first = h.manager.force_performance_check();
    h.frames(50.0, 10, false);
    let second = h.manager.force_performance_check();

    // --- 3. ASSERT ---
    let first = first.expect("20 FPS must trigger a reduction");
    assert_eq!(first.from_level, QualityTier::High);
    assert_eq!(first.to_level, QualityTier::Medium);
    assert!(second.is_none(), "Cooldown must suppress the second reduction");
    let drops = h
        .reasons()
        .into_iter()
        .filter(|r| *r == AdjustmentReason::PerformanceDrop)
        .count();
    assert_eq!(drops, 1);

    // Once the cooldown has elapsed the next step is allowed.
    h.frames(50.0, 100, false);
    let third = h.manager.force_performance_check().expect("cooldown elapsed");
    assert_eq!(third.to_level, QualityTier::Low);
}

#[tokio::test]
async fn test_periodic_check_steps_down_one_tier_at_a_time() {
    let mut h = Harness::new(&NullProbe).await;
    assert!(h.manager.set_quality_level("high"));

    h.frames(50.0, 340, true);

    let history = h.manager.get_adjustment_history();
    let drops: Vec<_> = history
        .iter()
        .filter(|a| a.reason == AdjustmentReason::PerformanceDrop)
        .collect();
    assert_eq!(drops.len(), 3);
    for adjustment in &drops {
        assert_eq!(
            adjustment.from_level.index(),
            adjustment.to_level.index() + 1,
            "Automatic steps never skip a tier"
        );
    }
    for pair in drops.windows(2) {
        assert!(pair[1].timestamp - pair[0].timestamp >= QualityManagerConfig::default().cooldown);
    }
    assert_eq!(h.manager.current_tier(), QualityTier::Minimal);
}

#[tokio::test]
async fn test_recovery_waits_for_the_stability_period() {
    // --- 1. ARRANGE ---
    let mut h = Harness::new(&NullProbe).await;
    assert!(h.manager.set_quality_level("high"));
    h.frames(50.0, 60, false);
    assert!(h.manager.force_performance_check().is_some());
    assert_eq!(h.manager.current_tier(), QualityTier::Medium);

    // --- 2. ACT & ASSERT ---
    h.frames(16.67, 60, false);
    assert!(h.manager.force_performance_check().is_none(), "Cooldown");

    h.frames(16.67, 600, false);
    assert!(
        h.manager.force_performance_check().is_none(),
        "Reduction happened less than 30s ago"
    );

    h.frames(16.67, 1200, false);
    let recovery = h
        .manager
        .force_performance_check()
        .expect("Stable for longer than the stability period");
    assert_eq!(recovery.reason, AdjustmentReason::PerformanceRecovery);
    assert_eq!(recovery.to_level, QualityTier::High);
}

#[tokio::test]
async fn test_sustained_60_fps_enhances_quality() {
    // --- 1. ARRANGE ---
    let mut h = Harness::new(&WorkstationProbe).await;
    assert_eq!(h.manager.current_tier(), QualityTier::Minimal);
    assert_eq!(
        h.manager.get_recommended_quality_level().tier,
        QualityTier::Ultra
    );
    assert!(h.manager.is_enhancing());

    // --- 2. ACT ---
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    h.manager.on_quality_change(move |change| {
        sink.borrow_mut().push(change.level.tier);
        Ok(())
    });
    h.frames(16.67, 13 * 60, true);

    // --- 3. ASSERT ---
    assert!(h.manager.current_tier() > QualityTier::Minimal);
    assert_eq!(h.manager.current_tier(), QualityTier::Ultra);
    assert!(!h.manager.is_enhancing());
    assert!(h
        .reasons()
        .iter()
        .all(|r| *r == AdjustmentReason::ProgressiveEnhancement));
    assert_eq!(
        *seen.borrow(),
        vec![
            QualityTier::Low,
            QualityTier::Medium,
            QualityTier::High,
            QualityTier::Ultra
        ]
    );
}

#[tokio::test]
async fn test_enhancement_stops_when_fps_is_below_target() {
    let mut h = Harness::new(&WorkstationProbe).await;

    // 40 FPS: under the 50 FPS target, but not under the 40 FPS reduction threshold.
    h.frames(25.0, 200, true);

    assert!(!h.manager.is_enhancing());
    assert_eq!(h.manager.current_tier(), QualityTier::Minimal);
    assert!(h.manager.get_adjustment_history().is_empty());
}

#[tokio::test]
async fn test_enhancement_respects_device_ceiling() {
    let mut h = Harness::new(&NullProbe).await;

    h.frames(16.67, 6 * 60, true);

    assert!(!h.manager.is_enhancing());
    let enhancements = h
        .reasons()
        .into_iter()
        .filter(|r| *r == AdjustmentReason::ProgressiveEnhancement)
        .count();
    assert_eq!(enhancements, 0);
}

#[tokio::test]
async fn test_disabling_adaptive_mode_stops_the_check() {
    let mut h = Harness::new(&NullProbe).await;
    assert!(h.manager.set_quality_level("high"));
    h.manager.update_settings(QualitySettingsUpdate {
        adaptive_mode: Some(false),
        ..Default::default()
    });

    h.frames(50.0, 200, true);

    assert!(!h.manager.is_checking());
    assert!(h.manager.force_performance_check().is_none());
    assert_eq!(h.manager.current_tier(), QualityTier::High);
    assert!(!h.manager.get_current_settings().adaptive_mode);
}

#[tokio::test]
async fn test_reenabling_adaptive_mode_reschedules_the_check() {
    // --- 1. ARRANGE ---
    let mut h = Harness::new(&NullProbe).await;
    assert!(h.manager.set_quality_level("high"));
    h.manager.update_settings(QualitySettingsUpdate {
        adaptive_mode: Some(false),
        ..Default::default()
    });
    assert!(!h.manager.is_checking());
    h.frames(50.0, 100, true);

    // --- 2. ACT ---
    h.manager.update_settings(QualitySettingsUpdate {
        adaptive_mode: Some(true),
        ..Default::default()
    });
    let checking = h.manager.is_checking();
    h.frames(50.0, 50, true);
    let before_interval = h.reasons();
    h.frames(50.0, 20, true);

    // --- 3. ASSERT ---
    assert!(checking);
    assert_eq!(before_interval, vec![AdjustmentReason::Manual]);
    assert_eq!(
        h.reasons(),
        vec![AdjustmentReason::Manual, AdjustmentReason::PerformanceDrop]
    );
    assert_eq!(h.manager.current_tier(), QualityTier::Medium);
}

#[tokio::test]
async fn test_failing_subscriber_does_not_block_others() {
    let mut h = Harness::new(&NullProbe).await;
    let hits = Rc::new(RefCell::new(0));
    h.manager
        .on_quality_change(|_| anyhow::bail!("subscriber failure"));
    let counter = hits.clone();
    let id = h.manager.on_quality_change(move |_| {
        *counter.borrow_mut() += 1;
        Ok(())
    });

    assert!(h.manager.set_quality_level("medium"));
    assert_eq!(*hits.borrow(), 1);

    assert!(h.manager.remove_quality_change_callback(id));
    assert!(h.manager.set_quality_level("low"));
    assert_eq!(*hits.borrow(), 1);
}
