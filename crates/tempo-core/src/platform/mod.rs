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

//! Abstractions over the host platform and the capability record derived from it.
//!
//! Every probe method returns an `Option`: a platform that cannot answer a
//! question simply says so, and the capability detector falls back to a
//! conservative value instead of failing.

use crate::quality::QualityTier;
use serde::{Deserialize, Serialize};

/// Installed and used memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Memory ceiling available to the process.
    pub total_bytes: u64,
    /// Memory currently in use.
    pub used_bytes: u64,
}

impl MemoryInfo {
    /// Used fraction of the ceiling (0..1). Zero when the ceiling is unknown.
    pub fn usage_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
        }
    }
}

/// Physical screen description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Width in logical pixels.
    pub width: u32,
    /// Height in logical pixels.
    pub height: u32,
    /// Device pixels per logical pixel.
    pub pixel_ratio: f32,
}

impl ScreenInfo {
    /// Number of device pixels the renderer has to fill.
    pub fn device_pixels(&self) -> f64 {
        let ratio = f64::from(self.pixel_ratio.max(1.0));
        f64::from(self.width) * f64::from(self.height) * ratio * ratio
    }
}

/// Read-only questions asked of the host during capability detection.
pub trait HardwareProbe {
    /// Number of hardware threads, if known.
    fn hardware_concurrency(&self) -> Option<usize>;
    /// Memory ceiling and usage, if known.
    fn memory(&self) -> Option<MemoryInfo>;
    /// Screen resolution, if a screen is attached.
    fn screen(&self) -> Option<ScreenInfo>;
    /// A free-form platform identification string (OS name, user agent...).
    fn platform_name(&self) -> Option<String>;
}

/// A source of the current memory usage ratio, sampled every frame.
pub trait MemoryProbe {
    /// Used fraction of the memory ceiling (0..1), if known.
    fn memory_usage(&self) -> Option<f64>;
}

/// A probe that knows nothing. Used when no platform API is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl HardwareProbe for NullProbe {
    fn hardware_concurrency(&self) -> Option<usize> {
        None
    }

    fn memory(&self) -> Option<MemoryInfo> {
        None
    }

    fn screen(&self) -> Option<ScreenInfo> {
        None
    }

    fn platform_name(&self) -> Option<String> {
        None
    }
}

impl MemoryProbe for NullProbe {
    fn memory_usage(&self) -> Option<f64> {
        None
    }
}

/// Coarse memory class of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLevel {
    /// Tight memory budget.
    Low,
    /// Typical budget.
    Medium,
    /// Plenty of memory.
    High,
}

/// Coarse rendering class of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingCapability {
    /// Keep scenes simple.
    Basic,
    /// Typical scenes.
    Standard,
    /// Heavy scenes and effects.
    Enhanced,
}

/// The result of capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Composite hardware score (0..100).
    pub performance_score: f64,
    /// Memory class.
    pub memory_level: MemoryLevel,
    /// Rendering class.
    pub rendering_capability: RenderingCapability,
    /// Highest tier the device is expected to sustain.
    pub recommended_quality: QualityTier,
    /// Suggested particle budget.
    pub max_particles: u32,
    /// Suggested live-object budget.
    pub max_objects: u32,
    /// Whether post effects are affordable.
    pub can_handle_effects: bool,
}

impl DeviceCapabilities {
    /// The most conservative record, valid on any device.
    pub fn lower_bound() -> Self {
        Self {
            performance_score: 0.0,
            memory_level: MemoryLevel::Low,
            rendering_capability: RenderingCapability::Basic,
            recommended_quality: QualityTier::Minimal,
            max_particles: 0,
            max_objects: 100,
            can_handle_effects: false,
        }
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::lower_bound()
    }
}
