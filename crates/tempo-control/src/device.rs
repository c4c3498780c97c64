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

//! One-shot host probing.
//!
//! The detector combines a handful of platform signals and a short render
//! micro-benchmark into a 0..100 score, then maps that score onto a
//! [`DeviceCapabilities`] record. Every signal is optional: a missing API or a
//! failing benchmark only lowers the score, detection itself never fails.

use serde::{Deserialize, Serialize};
use tempo_core::platform::{
    DeviceCapabilities, HardwareProbe, MemoryInfo, MemoryLevel, RenderingCapability, ScreenInfo,
};
use tempo_core::quality::QualityTier;
use tempo_core::renderer::{RenderHost, SharedDrawable};
use tempo_core::{SharedClock, Stopwatch};

const GIB: u64 = 1024 * 1024 * 1024;

/// Score every device starts from.
const BASE_SCORE: f64 = 20.0;
/// Device pixels of a 2560x1440 screen.
const QHD_PIXELS: f64 = 2560.0 * 1440.0;
/// Deducted on phones and tablets.
const MOBILE_PENALTY: f64 = 15.0;
/// Platform name fragments identifying a mobile device.
const MOBILE_MARKERS: [&str; 5] = ["android", "iphone", "ipad", "ios", "mobile"];

/// Size of the render micro-benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Objects created and destroyed per batch.
    pub object_count: usize,
    /// Number of batches. The probe yields between batches.
    pub batches: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            object_count: 50,
            batches: 5,
        }
    }
}

/// Probes the host and caches the resulting [`DeviceCapabilities`].
pub struct DeviceCapabilityDetector {
    config: BenchmarkConfig,
    clock: SharedClock,
    cached: Option<DeviceCapabilities>,
}

impl DeviceCapabilityDetector {
    /// Creates a detector timing its benchmark against `clock`.
    pub fn new(config: BenchmarkConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            cached: None,
        }
    }

    /// The last detection result, if any.
    pub fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.cached
    }

    /// Forgets the cached result.
    pub fn reset(&mut self) {
        self.cached = None;
    }

    /// Runs a full detection and caches the result.
    ///
    /// Repeated calls re-run the probe. The returned record is always valid;
    /// unavailable signals fall back to their most conservative value.
    pub async fn detect_capabilities(
        &mut self,
        probe: &dyn HardwareProbe,
        host: &mut dyn RenderHost,
    ) -> DeviceCapabilities {
        let concurrency = probe.hardware_concurrency();
        let memory = probe.memory();
        let screen = probe.screen();
        let platform = probe.platform_name();

        let benchmark_ms = self.run_benchmark(host).await;

        let mut score = BASE_SCORE
            + concurrency_score(concurrency)
            + memory_score(memory)
            + benchmark_ms.map_or(0.0, benchmark_score)
            - usage_penalty(memory)
            - resolution_penalty(screen);
        if platform.as_deref().is_some_and(is_mobile) {
            score -= MOBILE_PENALTY;
        }
        let score = score.clamp(0.0, 100.0);

        let capabilities = capabilities_for(score, memory);
        log::info!(
            "DeviceCapabilityDetector: score {:.0} (cpu {:?}, memory {:?}, benchmark {:?}ms) -> {}",
            score,
            concurrency,
            memory.map(|m| m.total_bytes / (1024 * 1024)),
            benchmark_ms,
            capabilities.recommended_quality
        );
        self.cached = Some(capabilities);
        capabilities
    }

    /// Creates and destroys rectangles in batches, yielding in between.
    ///
    /// Returns the mean time per object in milliseconds, or `None` if the
    /// host failed to create an object.
    async fn run_benchmark(&self, host: &mut dyn RenderHost) -> Option<f64> {
        let per_batch = self.config.object_count.max(1);
        let batches = self.config.batches.max(1);
        let mut total_ms = 0.0;

        for batch in 0..batches {
            let watch = Stopwatch::start(self.clock.clone());
            let mut created: Vec<SharedDrawable> = Vec::with_capacity(per_batch);
            let mut failed = false;
            for i in 0..per_batch {
                let x = (i % 10) as f32 * 10.0;
                let y = (i / 10) as f32 * 10.0;
                match host.add_rectangle(x, y, 8.0, 8.0) {
                    Ok(object) => created.push(object),
                    Err(e) => {
                        log::warn!(
                            "DeviceCapabilityDetector: benchmark aborted in batch {}: {}",
                            batch,
                            e
                        );
                        failed = true;
                        break;
                    }
                }
            }
            for object in created {
                if let Err(e) = object.borrow_mut().destroy() {
                    log::warn!("DeviceCapabilityDetector: could not destroy benchmark object: {e}");
                }
            }
            if failed {
                return None;
            }
            total_ms += watch.elapsed_ms();
            tokio::task::yield_now().await;
        }

        Some(total_ms / (per_batch * batches) as f64)
    }
}

fn concurrency_score(threads: Option<usize>) -> f64 {
    match threads {
        None => 5.0,
        Some(n) if n <= 2 => 5.0,
        Some(n) if n <= 4 => 12.0,
        Some(n) if n <= 8 => 20.0,
        Some(_) => 25.0,
    }
}

fn memory_score(memory: Option<MemoryInfo>) -> f64 {
    match memory.map(|m| m.total_bytes) {
        None => 6.0,
        Some(total) if total < 2 * GIB => 6.0,
        Some(total) if total < 4 * GIB => 12.0,
        Some(total) if total < 8 * GIB => 18.0,
        Some(total) if total < 16 * GIB => 22.0,
        Some(_) => 25.0,
    }
}

fn usage_penalty(memory: Option<MemoryInfo>) -> f64 {
    match memory.map(|m| m.usage_ratio()) {
        Some(ratio) if ratio > 0.9 => 10.0,
        Some(ratio) if ratio > 0.75 => 5.0,
        _ => 0.0,
    }
}

fn resolution_penalty(screen: Option<ScreenInfo>) -> f64 {
    match screen.map(|s| s.device_pixels()) {
        Some(pixels) if pixels > 2.0 * QHD_PIXELS => 10.0,
        Some(pixels) if pixels > QHD_PIXELS => 5.0,
        _ => 0.0,
    }
}

fn benchmark_score(ms_per_object: f64) -> f64 {
    if ms_per_object <= 0.01 {
        30.0
    } else if ms_per_object <= 0.05 {
        22.0
    } else if ms_per_object <= 0.2 {
        12.0
    } else if ms_per_object <= 1.0 {
        5.0
    } else {
        0.0
    }
}

fn is_mobile(platform: &str) -> bool {
    let platform = platform.to_lowercase();
    MOBILE_MARKERS.iter().any(|marker| platform.contains(marker))
}

/// Highest tier a device of `score` is expected to sustain.
pub fn recommended_quality(score: f64) -> QualityTier {
    if score >= 90.0 {
        QualityTier::Ultra
    } else if score >= 80.0 {
        QualityTier::High
    } else if score >= 60.0 {
        QualityTier::Medium
    } else if score >= 35.0 {
        QualityTier::Low
    } else {
        QualityTier::Minimal
    }
}

fn capabilities_for(score: f64, memory: Option<MemoryInfo>) -> DeviceCapabilities {
    let memory_level = match memory.map(|m| m.total_bytes) {
        Some(total) if total >= 8 * GIB => MemoryLevel::High,
        Some(total) if total >= 4 * GIB => MemoryLevel::Medium,
        _ => MemoryLevel::Low,
    };
    let rendering_capability = if score >= 75.0 {
        RenderingCapability::Enhanced
    } else if score >= 45.0 {
        RenderingCapability::Standard
    } else {
        RenderingCapability::Basic
    };
    let recommended = recommended_quality(score);
    let level = recommended.level();
    let max_objects = match recommended {
        QualityTier::Minimal => 100,
        QualityTier::Low => 200,
        QualityTier::Medium => 400,
        QualityTier::High => 800,
        QualityTier::Ultra => 1500,
    };

    DeviceCapabilities {
        performance_score: score,
        memory_level,
        rendering_capability,
        recommended_quality: recommended,
        max_particles: level.particle_count,
        max_objects,
        can_handle_effects: level.effects_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempo_core::platform::NullProbe;
    use tempo_core::testing::MockHost;
    use tempo_core::ManualClock;

    struct DesktopProbe;

    impl HardwareProbe for DesktopProbe {
        fn hardware_concurrency(&self) -> Option<usize> {
            Some(16)
        }

        fn memory(&self) -> Option<MemoryInfo> {
            Some(MemoryInfo {
                total_bytes: 32 * GIB,
                used_bytes: 8 * GIB,
            })
        }

        fn screen(&self) -> Option<ScreenInfo> {
            Some(ScreenInfo {
                width: 1920,
                height: 1080,
                pixel_ratio: 1.0,
            })
        }

        fn platform_name(&self) -> Option<String> {
            Some("Linux 6.8".into())
        }
    }

    struct PhoneProbe;

    impl HardwareProbe for PhoneProbe {
        fn hardware_concurrency(&self) -> Option<usize> {
            Some(8)
        }

        fn memory(&self) -> Option<MemoryInfo> {
            Some(MemoryInfo {
                total_bytes: 4 * GIB,
                used_bytes: 3_950_000_000,
            })
        }

        fn screen(&self) -> Option<ScreenInfo> {
            Some(ScreenInfo {
                width: 1170,
                height: 2532,
                pixel_ratio: 3.0,
            })
        }

        fn platform_name(&self) -> Option<String> {
            Some("Android 14".into())
        }
    }

    fn detector() -> DeviceCapabilityDetector {
        DeviceCapabilityDetector::new(BenchmarkConfig::default(), ManualClock::new().shared())
    }

    #[test]
    fn recommended_quality_bands() {
        assert_eq!(recommended_quality(95.0), QualityTier::Ultra);
        assert_eq!(recommended_quality(80.0), QualityTier::High);
        assert_eq!(recommended_quality(60.0), QualityTier::Medium);
        assert_eq!(recommended_quality(35.0), QualityTier::Low);
        assert_eq!(recommended_quality(34.9), QualityTier::Minimal);
    }

    #[tokio::test]
    async fn strong_desktop_gets_ultra() {
        let mut detector = detector();
        let mut host = MockHost::new();
        let caps = detector.detect_capabilities(&DesktopProbe, &mut host).await;
        assert_eq!(caps.recommended_quality, QualityTier::Ultra);
        assert_eq!(caps.memory_level, MemoryLevel::High);
        assert_eq!(caps.rendering_capability, RenderingCapability::Enhanced);
        assert!(caps.can_handle_effects);
        assert_eq!(detector.capabilities(), Some(caps));
    }

    #[tokio::test]
    async fn benchmark_cleans_up_after_itself() {
        let mut detector = detector();
        let mut host = MockHost::new();
        detector.detect_capabilities(&NullProbe, &mut host).await;
        assert_eq!(host.created.len(), 250);
        assert_eq!(host.live_objects(), 0);
    }

    #[tokio::test]
    async fn phone_is_penalised() {
        let mut detector = detector();
        let mut host = MockHost::new();
        let caps = detector.detect_capabilities(&PhoneProbe, &mut host).await;
        // 20 + 20 + 18 + 30 - 10 (usage) - 10 (resolution) - 15 (mobile)
        assert_relative_eq!(caps.performance_score, 53.0);
        assert_eq!(caps.recommended_quality, QualityTier::Low);
        assert_eq!(caps.memory_level, MemoryLevel::Medium);
    }

    #[tokio::test]
    async fn nothing_available_still_yields_a_valid_record() {
        let mut detector = detector();
        let mut host = MockHost::new();
        host.fail_creation = true;
        let caps = detector.detect_capabilities(&NullProbe, &mut host).await;
        assert_relative_eq!(caps.performance_score, 31.0);
        assert_eq!(caps.recommended_quality, QualityTier::Minimal);
        assert_eq!(caps.rendering_capability, RenderingCapability::Basic);
        assert!(!caps.can_handle_effects);
    }

    #[tokio::test]
    async fn reset_forgets_the_cache() {
        let mut detector = detector();
        let mut host = MockHost::new();
        detector.detect_capabilities(&NullProbe, &mut host).await;
        assert!(detector.capabilities().is_some());
        detector.reset();
        assert!(detector.capabilities().is_none());
    }
}
