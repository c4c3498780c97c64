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

//! The quality-aware rendering optimizer.

use super::text_cache::TextCache;
use super::visibility::{ObjectState, VisibilityTable};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempo_core::quality::{AdjustmentReason, QualityChange, QualityTier};
use tempo_core::renderer::{
    CameraView, DrawableId, Position, RenderHost, RenderingOptions, SharedDrawable, TextStyle,
    EMERGENCY_CULL_DISTANCE,
};
use tempo_core::telemetry::{IssueSeverity, PerformanceIssue};
use tempo_core::{HostError, HostResult, SharedClock};

/// Emergency-mode and self-check tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Consecutive high-severity issues that force emergency mode.
    pub emergency_issue_streak: u32,
    /// A gap this long between high-severity issues resets the streak.
    pub issue_streak_timeout: Duration,
    /// Interval of the self-check run by [`RenderingOptimizer::update`].
    pub self_check_interval: Duration,
    /// Cull distance forced while emergency mode is on.
    pub emergency_cull_distance: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            emergency_issue_streak: 30,
            issue_streak_timeout: Duration::from_secs(5),
            self_check_interval: Duration::from_secs(1),
            emergency_cull_distance: EMERGENCY_CULL_DISTANCE,
        }
    }
}

/// Counters of the optimizer's work since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerMetrics {
    /// Objects passed to a render callback.
    pub objects_rendered: u64,
    /// Objects hidden by frustum culling.
    pub objects_culled: u64,
    /// LOD passes that left an object scaled down or hidden.
    pub lod_reductions: u64,
    /// Text requests served from the cache.
    pub cache_hits: u64,
    /// Text requests that created a cached object.
    pub cache_misses: u64,
    /// Times emergency mode was switched on.
    pub emergency_activations: u64,
}

/// A text object request for [`RenderingOptimizer::batch_render_texts`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    /// Displayed text.
    pub text: String,
    /// Appearance.
    pub style: TextStyle,
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
}

impl TextRequest {
    /// Creates a request.
    pub fn new(text: impl Into<String>, style: TextStyle, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            style,
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmergencyTrigger {
    QualityDrop,
    IssueStreak,
}

/// Executes the current quality level on externally owned drawables.
///
/// The optimizer reacts to two signals:
/// - **Quality changes** from the quality manager select a
///   [`RenderingOptions`] preset. A performance drop to minimal switches
///   emergency mode on; any later rise above minimal switches it off.
/// - **Performance issues** from the monitor. A streak of high-severity
///   issues switches emergency mode on independently of the quality level;
///   the streak resets after a quiet period and emergency mode with it.
///
/// The scene then calls [`cull_objects`](Self::cull_objects),
/// [`apply_dynamic_lod`](Self::apply_dynamic_lod) and
/// [`get_cached_text`](Self::get_cached_text) every frame.
pub struct RenderingOptimizer {
    config: OptimizerConfig,
    clock: SharedClock,
    tier: QualityTier,
    base: RenderingOptions,
    options: RenderingOptions,
    emergency: Option<EmergencyTrigger>,
    high_issue_streak: u32,
    last_high_issue: Option<Duration>,
    camera: Option<CameraView>,
    objects: VisibilityTable,
    text_cache: TextCache,
    metrics: OptimizerMetrics,
    last_self_check: Duration,
    destroyed: bool,
}

impl RenderingOptimizer {
    /// Creates an optimizer using the minimal preset.
    pub fn new(config: OptimizerConfig, clock: SharedClock) -> Self {
        let base = RenderingOptions::for_level(QualityTier::Minimal.level());
        let last_self_check = clock.now();
        Self {
            config,
            clock,
            tier: QualityTier::Minimal,
            base,
            options: base,
            emergency: None,
            high_issue_streak: 0,
            last_high_issue: None,
            camera: None,
            objects: VisibilityTable::default(),
            text_cache: TextCache::new(base.max_cached_texts),
            metrics: OptimizerMetrics::default(),
            last_self_check,
            destroyed: false,
        }
    }

    /// Switches to the preset of the new level.
    pub fn apply_quality_change(&mut self, change: &QualityChange) {
        if self.destroyed {
            return;
        }
        let from = change.adjustment.from_level;
        let to = change.level.tier;
        self.tier = to;
        self.base = RenderingOptions::for_level(&change.level);

        let dropped = change.adjustment.reason == AdjustmentReason::PerformanceDrop;
        if to == QualityTier::Minimal && dropped {
            self.activate_emergency(EmergencyTrigger::QualityDrop);
        } else if self.emergency.is_some() && to > QualityTier::Minimal && to > from {
            self.deactivate_emergency("quality recovered");
        }
        self.refresh_options();
        log::debug!(
            "RenderingOptimizer: applied {} preset (culling {}, LOD {}, cache {})",
            to,
            self.options.enable_culling,
            self.options.enable_lod,
            self.options.enable_text_caching
        );
    }

    /// Feeds one detected issue into the high-severity streak.
    pub fn on_performance_issue(&mut self, issue: &PerformanceIssue) {
        if self.destroyed || issue.severity != IssueSeverity::High {
            return;
        }
        let continues = self.last_high_issue.is_some_and(|at| {
            issue.timestamp.saturating_sub(at) <= self.config.issue_streak_timeout
        });
        self.high_issue_streak = if continues {
            self.high_issue_streak + 1
        } else {
            1
        };
        self.last_high_issue = Some(issue.timestamp);

        let streak_full = self.high_issue_streak >= self.config.emergency_issue_streak;
        if streak_full && self.emergency.is_none() {
            self.activate_emergency(EmergencyTrigger::IssueStreak);
            self.refresh_options();
        }
    }

    /// Periodic self-check. Call once per frame; acts once per interval.
    ///
    /// Prunes memory of dropped objects and ends an issue streak that went
    /// quiet. Returns `true` if the check ran.
    pub fn update(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        let now = self.clock.now();
        if now.saturating_sub(self.last_self_check) < self.config.self_check_interval {
            return false;
        }
        self.last_self_check = now;

        let pruned = self.objects.prune();
        if pruned > 0 {
            log::trace!("RenderingOptimizer: forgot {pruned} dropped objects");
        }

        let quiet = self
            .last_high_issue
            .is_some_and(|at| now.saturating_sub(at) > self.config.issue_streak_timeout);
        if quiet {
            self.high_issue_streak = 0;
            self.last_high_issue = None;
            if self.emergency == Some(EmergencyTrigger::IssueStreak) {
                self.deactivate_emergency("issue streak reset");
                self.refresh_options();
            }
        }
        true
    }

    /// Switches emergency mode on. A quality drop takes over an active
    /// streak trigger without counting a second activation.
    fn activate_emergency(&mut self, trigger: EmergencyTrigger) {
        match (self.emergency, trigger) {
            (None, _) => {}
            (Some(EmergencyTrigger::IssueStreak), EmergencyTrigger::QualityDrop) => {
                self.emergency = Some(trigger);
                log::info!("RenderingOptimizer: emergency mode now held by the quality drop");
                return;
            }
            (Some(_), _) => return,
        }
        self.emergency = Some(trigger);
        self.metrics.emergency_activations += 1;
        log::warn!("RenderingOptimizer: emergency mode ON ({trigger:?})");
    }

    fn deactivate_emergency(&mut self, why: &str) {
        if self.emergency.take().is_some() {
            self.high_issue_streak = 0;
            self.last_high_issue = None;
            log::info!("RenderingOptimizer: emergency mode OFF ({why})");
        }
    }

    fn refresh_options(&mut self) {
        self.options = match self.emergency {
            Some(_) => self.base.into_emergency(self.config.emergency_cull_distance),
            None => self.base,
        };
        let capacity = self.base.max_cached_texts;
        if capacity == 0 {
            self.clear_text_cache();
        } else if capacity != self.text_cache.capacity() {
            for evicted in self.text_cache.resize(capacity) {
                destroy_quietly(&evicted);
            }
        }
    }

    /// Camera used by [`apply_dynamic_lod`](Self::apply_dynamic_lod).
    pub fn set_camera(&mut self, camera: CameraView) {
        self.camera = Some(camera);
    }

    /// The last camera seen.
    pub fn camera(&self) -> Option<CameraView> {
        self.camera
    }

    /// Scales or hides `object` by its distance to the camera center.
    ///
    /// Near band: full scale. Up to the cull distance: reduced scale. Beyond:
    /// hidden. Objects without a position, or calls before any camera is
    /// known, are left untouched.
    pub fn apply_dynamic_lod(&mut self, object: &SharedDrawable) {
        if self.destroyed {
            return;
        }
        let Some(camera) = self.camera else {
            return;
        };
        let Some((id, position)) = identify(object) else {
            return;
        };
        let Some(position) = position else {
            return;
        };

        let current = self.objects.state(id);
        let mut next = current;
        if self.options.enable_lod {
            let distance = position.distance_to(camera.center());
            let cull = self.options.cull_distance;
            if distance <= cull * self.options.lod_near_fraction {
                next.lod_hidden = false;
                next.scale = 1.0;
            } else if distance <= cull {
                next.lod_hidden = false;
                next.scale = self.options.lod_mid_scale;
                self.metrics.lod_reductions += 1;
            } else {
                next.lod_hidden = true;
                self.metrics.lod_reductions += 1;
            }
        } else {
            next.lod_hidden = false;
            next.scale = 1.0;
        }

        if next != current {
            if let Err(e) = self.objects.apply(object, next) {
                log::warn!("RenderingOptimizer: LOD update failed for {id}: {e}");
            }
        }
    }

    /// Hides objects outside `camera` and restores those that came back.
    ///
    /// Only objects whose culled state changes are touched, so repeated
    /// calls with an unchanged scene make no host calls. Returns how many of
    /// `objects` are currently culled.
    pub fn cull_objects(&mut self, objects: &[SharedDrawable], camera: CameraView) -> usize {
        if self.destroyed {
            return 0;
        }
        self.camera = Some(camera);
        let mut culled_now = 0;

        for object in objects {
            let Some((id, Some(position))) = identify(object) else {
                continue;
            };
            let current = self.objects.state(id);
            let culled = self.options.enable_culling && !camera.contains(position);
            if culled {
                culled_now += 1;
            }
            if culled == current.culled {
                continue;
            }
            match self.objects.apply(object, ObjectState { culled, ..current }) {
                Ok(()) if culled => self.metrics.objects_culled += 1,
                Ok(()) => {}
                Err(e) => log::warn!("RenderingOptimizer: culling failed for {id}: {e}"),
            }
        }
        culled_now
    }

    /// Returns a text object for `(text, style)` at `(x, y)`.
    ///
    /// With caching on, a cached object is reused and moved; otherwise a new
    /// one is created through `host`. Creating into a full cache destroys the
    /// least recently used entry. With caching off (or in emergency mode) the
    /// cache is bypassed and every call creates a fresh object owned by the
    /// caller.
    pub fn get_cached_text(
        &mut self,
        host: &mut dyn RenderHost,
        text: &str,
        style: &TextStyle,
        x: f32,
        y: f32,
    ) -> HostResult<SharedDrawable> {
        if self.destroyed || !self.options.enable_text_caching {
            return host.add_text(text, style, x, y);
        }

        let key = TextCache::key(text, style);
        if let Some(object) = self.text_cache.get(&key) {
            let moved = match object.try_borrow_mut() {
                Ok(mut drawable) => drawable.set_position(x, y),
                Err(_) => Err(HostError::Backend("cached text is already borrowed".into())),
            };
            match moved {
                Ok(()) => {
                    self.metrics.cache_hits += 1;
                    return Ok(object);
                }
                Err(e) => {
                    log::warn!("RenderingOptimizer: dropping stale cached text {text:?}: {e}");
                    self.text_cache.remove(&key);
                }
            }
        }

        self.metrics.cache_misses += 1;
        let object = host.add_text(text, style, x, y)?;
        if let Some(evicted) = self.text_cache.insert(key, object.clone()) {
            destroy_quietly(&evicted);
        }
        Ok(object)
    }

    /// Destroys and forgets every cached text object.
    pub fn clear_text_cache(&mut self) {
        for object in self.text_cache.drain() {
            destroy_quietly(&object);
        }
    }

    /// Number of cached text objects.
    pub fn cached_text_count(&self) -> usize {
        self.text_cache.len()
    }

    /// Serves every request through [`get_cached_text`](Self::get_cached_text).
    ///
    /// Failed requests are logged and skipped.
    pub fn batch_render_texts(
        &mut self,
        host: &mut dyn RenderHost,
        requests: &[TextRequest],
    ) -> Vec<SharedDrawable> {
        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            match self.get_cached_text(host, &request.text, &request.style, request.x, request.y) {
                Ok(object) => out.push(object),
                Err(e) => log::warn!(
                    "RenderingOptimizer: text request {:?} failed: {}",
                    request.text,
                    e
                ),
            }
        }
        out
    }

    /// Calls `render` exactly once per object.
    ///
    /// With batching on, objects are grouped by kind (groups in order of
    /// first appearance). A failing call is logged and does not stop the
    /// batch. Returns the number of successful calls.
    pub fn batch_render<F>(&mut self, objects: &[SharedDrawable], mut render: F) -> usize
    where
        F: FnMut(&SharedDrawable) -> anyhow::Result<()>,
    {
        if self.destroyed {
            return 0;
        }
        let order = if self.options.enable_batching {
            group_by_kind(objects)
        } else {
            objects.iter().collect()
        };

        let mut rendered = 0;
        for object in order {
            match render(object) {
                Ok(()) => rendered += 1,
                Err(e) => log::warn!("RenderingOptimizer: render callback failed: {e:#}"),
            }
        }
        self.metrics.objects_rendered += rendered as u64;
        rendered
    }

    /// Counters since creation or the last reset.
    pub fn get_metrics(&self) -> OptimizerMetrics {
        self.metrics
    }

    /// Zeroes the counters.
    pub fn reset_metrics(&mut self) {
        self.metrics = OptimizerMetrics::default();
    }

    /// Whether emergency mode is on.
    pub fn is_emergency_mode_active(&self) -> bool {
        self.emergency.is_some()
    }

    /// The effective policy, emergency overrides included.
    pub fn get_settings(&self) -> RenderingOptions {
        self.options
    }

    /// The tier of the last applied quality change.
    pub fn current_tier(&self) -> QualityTier {
        self.tier
    }

    /// Destroys cached text objects and forgets every tracked object.
    ///
    /// The optimizer is inert afterwards: per-frame calls do nothing and text
    /// requests go straight to the host.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.clear_text_cache();
        self.objects.clear();
        self.emergency = None;
        self.high_issue_streak = 0;
        self.last_high_issue = None;
        self.destroyed = true;
        log::debug!("RenderingOptimizer: destroyed");
    }
}

fn identify(object: &SharedDrawable) -> Option<(DrawableId, Option<Position>)> {
    match object.try_borrow() {
        Ok(drawable) => Some((drawable.id(), drawable.position())),
        Err(_) => {
            log::warn!("RenderingOptimizer: skipping a drawable that is already borrowed");
            None
        }
    }
}

fn group_by_kind(objects: &[SharedDrawable]) -> Vec<&SharedDrawable> {
    let mut groups: Vec<Vec<&SharedDrawable>> = Vec::new();
    let mut index: AHashMap<String, usize> = AHashMap::new();
    for object in objects {
        let kind = object
            .try_borrow()
            .map(|drawable| drawable.kind().to_string())
            .unwrap_or_default();
        let slot = *index.entry(kind).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(object);
    }
    groups.into_iter().flatten().collect()
}

fn destroy_quietly(object: &SharedDrawable) {
    let result = match object.try_borrow_mut() {
        Ok(mut drawable) => drawable.destroy(),
        Err(_) => Err(HostError::Backend("drawable is already borrowed".into())),
    };
    match result {
        Ok(()) => {}
        Err(HostError::Destroyed(id)) => {
            log::debug!("RenderingOptimizer: cached text {id} was already destroyed")
        }
        Err(e) => log::warn!("RenderingOptimizer: could not destroy cached text: {e}"),
    }
}
