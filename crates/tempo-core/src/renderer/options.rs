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

//! The rendering policy executed by the optimizer.

use crate::quality::{QualityLevel, QualityTier};
use serde::{Deserialize, Serialize};

/// Distance from the camera center (world units) used while emergency mode is on.
pub const EMERGENCY_CULL_DISTANCE: f32 = 300.0;

/// Fraction of the cull distance that stays at full scale in normal operation.
pub const DEFAULT_LOD_NEAR_FRACTION: f32 = 0.5;

/// Fraction of the cull distance that stays at full scale in emergency mode.
pub const EMERGENCY_LOD_NEAR_FRACTION: f32 = 0.3;

/// Policy consumed by the rendering optimizer.
///
/// | tier    | culling | cull distance | LOD | text cache | batching |
/// |---------|---------|---------------|-----|------------|----------|
/// | minimal | on      | 600           | on  | 50         | on       |
/// | low     | on      | 800           | on  | 100        | on       |
/// | medium  | on      | 1000          | on  | 150        | on       |
/// | high    | on      | 1400          | off | 75         | on       |
/// | ultra   | off     | 2000          | off | off        | on       |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderingOptions {
    /// Hide objects outside the camera rectangle.
    pub enable_culling: bool,
    /// Distance from the camera center past which LOD hides objects.
    pub cull_distance: f32,
    /// Scale objects down with distance.
    pub enable_lod: bool,
    /// Fraction of `cull_distance` rendered at full scale.
    pub lod_near_fraction: f32,
    /// Scale applied between the near band and `cull_distance`.
    pub lod_mid_scale: f32,
    /// Reuse text objects keyed by content and style.
    pub enable_text_caching: bool,
    /// Text cache capacity.
    pub max_cached_texts: usize,
    /// Group render calls by object kind.
    pub enable_batching: bool,
    /// Forced maximally conservative policy.
    pub emergency_mode: bool,
    /// Mirrors the tier's antialiasing flag.
    pub antialiasing: bool,
    /// Mirrors the tier's shadow flag.
    pub shadows_enabled: bool,
    /// Mirrors the tier's effects flag.
    pub effects_enabled: bool,
}

impl RenderingOptions {
    /// The preset for a quality level.
    pub fn for_level(level: &QualityLevel) -> Self {
        let (enable_culling, cull_distance, enable_lod, max_cached_texts) = match level.tier {
            QualityTier::Minimal => (true, 600.0, true, 50),
            QualityTier::Low => (true, 800.0, true, 100),
            QualityTier::Medium => (true, 1000.0, true, 150),
            QualityTier::High => (true, 1400.0, false, 75),
            QualityTier::Ultra => (false, 2000.0, false, 0),
        };
        Self {
            enable_culling,
            cull_distance,
            enable_lod,
            lod_near_fraction: DEFAULT_LOD_NEAR_FRACTION,
            lod_mid_scale: 0.75,
            enable_text_caching: max_cached_texts > 0,
            max_cached_texts,
            enable_batching: true,
            emergency_mode: false,
            antialiasing: level.antialiasing,
            shadows_enabled: level.shadows_enabled,
            effects_enabled: level.effects_enabled,
        }
    }

    /// Applies the emergency overrides on top of the current preset.
    pub fn into_emergency(mut self, cull_distance: f32) -> Self {
        self.emergency_mode = true;
        self.enable_culling = true;
        self.enable_lod = true;
        self.cull_distance = cull_distance;
        self.lod_near_fraction = EMERGENCY_LOD_NEAR_FRACTION;
        self.enable_text_caching = false;
        self.antialiasing = false;
        self.shadows_enabled = false;
        self.effects_enabled = false;
        self
    }
}

impl Default for RenderingOptions {
    fn default() -> Self {
        Self::for_level(QualityTier::Minimal.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheap_tiers_are_aggressive() {
        for tier in [QualityTier::Minimal, QualityTier::Low] {
            let opts = RenderingOptions::for_level(tier.level());
            assert!(opts.enable_culling && opts.enable_lod && opts.enable_text_caching);
            assert!(opts.enable_batching);
        }
    }

    #[test]
    fn expensive_tiers_relax_policies() {
        let ultra = RenderingOptions::for_level(QualityTier::Ultra.level());
        assert!(!ultra.enable_lod && !ultra.enable_culling && !ultra.enable_text_caching);
        assert!(ultra.antialiasing && ultra.shadows_enabled);

        let high = RenderingOptions::for_level(QualityTier::High.level());
        let low = RenderingOptions::for_level(QualityTier::Low.level());
        assert!(high.max_cached_texts < low.max_cached_texts);
    }

    #[test]
    fn emergency_overrides() {
        let opts = RenderingOptions::for_level(QualityTier::Minimal.level())
            .into_emergency(EMERGENCY_CULL_DISTANCE);
        assert!(opts.emergency_mode);
        assert!(!opts.enable_text_caching);
        assert_eq!(opts.cull_distance, EMERGENCY_CULL_DISTANCE);
        assert_eq!(opts.lod_near_fraction, EMERGENCY_LOD_NEAR_FRACTION);
    }
}
