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

//! Quality tiers, their static rendering knobs, and controller state records.

use crate::error::QualityError;
use crate::telemetry::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A named quality tier, ordered from cheapest to most expensive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Bare minimum: no effects, aggressive culling.
    #[default]
    Minimal,
    /// Low detail.
    Low,
    /// Balanced.
    Medium,
    /// High detail with shadows and antialiasing.
    High,
    /// Everything on.
    Ultra,
}

impl QualityTier {
    /// All tiers in ascending order.
    pub const ALL: [QualityTier; 5] = [
        QualityTier::Minimal,
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    /// Stable lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Minimal => "minimal",
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }

    /// Position of the tier in [`QualityTier::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The next tier up, or `None` at the top.
    pub fn higher(self) -> Option<QualityTier> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The next tier down, or `None` at the bottom.
    pub fn lower(self) -> Option<QualityTier> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// The static knobs for this tier.
    pub fn level(self) -> &'static QualityLevel {
        &QUALITY_LEVELS[self.index()]
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| QualityError::UnknownLevel(s.to_string()))
    }
}

/// The rendering knobs attached to one tier. Static; never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Which tier these knobs belong to.
    pub tier: QualityTier,
    /// Upper bound on live particles.
    pub particle_count: u32,
    /// Texture resolution factor (0..1).
    pub texture_quality: f32,
    /// Post-processing and particle effects.
    pub effects_enabled: bool,
    /// Dynamic shadows.
    pub shadows_enabled: bool,
    /// Antialiasing.
    pub antialiasing: bool,
    /// Frame-rate cap.
    pub max_fps: u32,
}

impl QualityLevel {
    /// The tier's name.
    pub fn name(&self) -> &'static str {
        self.tier.as_str()
    }
}

/// The fixed quality table, indexed by [`QualityTier::index`].
pub const QUALITY_LEVELS: [QualityLevel; 5] = [
    QualityLevel {
        tier: QualityTier::Minimal,
        particle_count: 0,
        texture_quality: 0.25,
        effects_enabled: false,
        shadows_enabled: false,
        antialiasing: false,
        max_fps: 30,
    },
    QualityLevel {
        tier: QualityTier::Low,
        particle_count: 25,
        texture_quality: 0.5,
        effects_enabled: false,
        shadows_enabled: false,
        antialiasing: false,
        max_fps: 60,
    },
    QualityLevel {
        tier: QualityTier::Medium,
        particle_count: 50,
        texture_quality: 0.75,
        effects_enabled: true,
        shadows_enabled: false,
        antialiasing: false,
        max_fps: 60,
    },
    QualityLevel {
        tier: QualityTier::High,
        particle_count: 100,
        texture_quality: 1.0,
        effects_enabled: true,
        shadows_enabled: true,
        antialiasing: true,
        max_fps: 60,
    },
    QualityLevel {
        tier: QualityTier::Ultra,
        particle_count: 200,
        texture_quality: 1.0,
        effects_enabled: true,
        shadows_enabled: true,
        antialiasing: true,
        max_fps: 120,
    },
];

/// Mutable controller state, exclusively owned by the quality manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// The active tier.
    pub current_level: QualityTier,
    /// Whether the periodic performance check runs at all.
    pub adaptive_mode: bool,
    /// Whether the periodic check may lower quality on its own.
    pub auto_reduction: bool,
    /// FPS that progressive enhancement must sustain to keep stepping up.
    pub performance_target: f64,
    /// Below this FPS the check steps down one tier.
    pub reduction_threshold: f64,
    /// Above this FPS the check may step up one tier.
    pub recovery_threshold: f64,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            current_level: QualityTier::Minimal,
            adaptive_mode: true,
            auto_reduction: true,
            performance_target: 50.0,
            reduction_threshold: 40.0,
            recovery_threshold: 55.0,
        }
    }
}

/// A partial update for [`QualitySettings`]. `None` fields are left unchanged.
///
/// The active tier is not part of it; use the manager's manual path instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySettingsUpdate {
    /// New value for [`QualitySettings::adaptive_mode`].
    pub adaptive_mode: Option<bool>,
    /// New value for [`QualitySettings::auto_reduction`].
    pub auto_reduction: Option<bool>,
    /// New value for [`QualitySettings::performance_target`].
    pub performance_target: Option<f64>,
    /// New value for [`QualitySettings::reduction_threshold`].
    pub reduction_threshold: Option<f64>,
    /// New value for [`QualitySettings::recovery_threshold`].
    pub recovery_threshold: Option<f64>,
}

impl QualitySettings {
    /// Applies every `Some` field of `update`.
    pub fn merge(&mut self, update: &QualitySettingsUpdate) {
        if let Some(v) = update.adaptive_mode {
            self.adaptive_mode = v;
        }
        if let Some(v) = update.auto_reduction {
            self.auto_reduction = v;
        }
        if let Some(v) = update.performance_target {
            self.performance_target = v;
        }
        if let Some(v) = update.reduction_threshold {
            self.reduction_threshold = v;
        }
        if let Some(v) = update.recovery_threshold {
            self.recovery_threshold = v;
        }
    }
}

/// Why a quality transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// Requested explicitly by the application.
    Manual,
    /// The periodic check saw FPS under the reduction threshold.
    PerformanceDrop,
    /// The periodic check saw FPS back above the recovery threshold.
    PerformanceRecovery,
    /// A step of the startup ramp.
    ProgressiveEnhancement,
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdjustmentReason::Manual => "manual",
            AdjustmentReason::PerformanceDrop => "performance_drop",
            AdjustmentReason::PerformanceRecovery => "performance_recovery",
            AdjustmentReason::ProgressiveEnhancement => "progressive_enhancement",
        })
    }
}

/// Audit record of one transition. Appended to the history, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAdjustment {
    /// When the transition was applied.
    pub timestamp: Duration,
    /// Tier before the transition.
    pub from_level: QualityTier,
    /// Tier after the transition.
    pub to_level: QualityTier,
    /// What triggered it.
    pub reason: AdjustmentReason,
    /// The metrics in effect at that moment.
    pub performance_metrics: PerformanceMetrics,
}

/// The payload delivered to quality-change subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityChange {
    /// Knobs of the new tier.
    pub level: QualityLevel,
    /// The audit record of the transition.
    pub adjustment: QualityAdjustment,
}
