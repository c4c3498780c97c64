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

//! The narrow interface through which the core touches the scene.
//!
//! The scene graph and its concrete objects live outside the core. The core
//! only creates objects through a [`RenderHost`] and nudges them through the
//! [`Drawable`] mutators; it never decides when they die, beyond destroying
//! the text objects it created for its own cache.

use crate::error::{HostError, HostResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Stable identity of a drawable, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DrawableId(pub u64);

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Position {
    /// Creates a position.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The visible rectangle of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraView {
    /// Left edge in world units.
    pub scroll_x: f32,
    /// Top edge in world units.
    pub scroll_y: f32,
    /// Visible width.
    pub width: f32,
    /// Visible height.
    pub height: f32,
}

impl CameraView {
    /// Creates a camera view.
    pub fn new(scroll_x: f32, scroll_y: f32, width: f32, height: f32) -> Self {
        Self {
            scroll_x,
            scroll_y,
            width,
            height,
        }
    }

    /// Center of the visible rectangle.
    pub fn center(&self) -> Position {
        Position::new(
            self.scroll_x + self.width / 2.0,
            self.scroll_y + self.height / 2.0,
        )
    }

    /// Whether `pos` lies inside the visible rectangle (edges included).
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.scroll_x
            && pos.x <= self.scroll_x + self.width
            && pos.y >= self.scroll_y
            && pos.y <= self.scroll_y + self.height
    }
}

/// Text appearance. Serialized as part of the text-cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Font family name.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// CSS-like color string.
    pub color: String,
    /// Optional stroke color.
    pub stroke: Option<String>,
    /// Stroke thickness in pixels.
    pub stroke_thickness: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 16.0,
            color: "#ffffff".to_string(),
            stroke: None,
            stroke_thickness: 0.0,
        }
    }
}

/// An object owned by the scene that the core may adjust.
///
/// Every mutator may fail; callers in the core catch the error, log it and
/// continue with the next object.
pub trait Drawable {
    /// Host-assigned identity.
    fn id(&self) -> DrawableId;

    /// Object category used to group batches (e.g. `"text"`, `"sprite"`).
    fn kind(&self) -> &str;

    /// World position, if the object has one.
    fn position(&self) -> Option<Position>;

    /// Shows or hides the object.
    fn set_visible(&mut self, visible: bool) -> HostResult<()>;

    /// Sets a uniform scale factor.
    fn set_scale(&mut self, scale: f32) -> HostResult<()>;

    /// Moves the object.
    fn set_position(&mut self, x: f32, y: f32) -> HostResult<()>;

    /// Replaces the displayed text. Only text objects support it.
    fn set_text(&mut self, _text: &str) -> HostResult<()> {
        Err(HostError::Unsupported("set_text"))
    }

    /// Releases the object in the host.
    fn destroy(&mut self) -> HostResult<()>;
}

/// A drawable shared between the scene and the core.
pub type SharedDrawable = Rc<RefCell<dyn Drawable>>;

/// Object factory and camera access provided by the scene.
pub trait RenderHost {
    /// Creates a text object.
    fn add_text(&mut self, text: &str, style: &TextStyle, x: f32, y: f32)
        -> HostResult<SharedDrawable>;

    /// Creates a sprite from a texture key.
    fn add_sprite(&mut self, texture: &str, x: f32, y: f32) -> HostResult<SharedDrawable>;

    /// Creates a filled rectangle.
    fn add_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32)
        -> HostResult<SharedDrawable>;

    /// Creates an empty vector-graphics object.
    fn add_graphics(&mut self) -> HostResult<SharedDrawable>;

    /// The main camera, if the scene has one.
    fn camera(&self) -> Option<CameraView>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn camera_bounds_include_edges() {
        let cam = CameraView::new(100.0, 50.0, 800.0, 600.0);
        assert!(cam.contains(Position::new(100.0, 50.0)));
        assert!(cam.contains(Position::new(900.0, 650.0)));
        assert!(!cam.contains(Position::new(901.0, 300.0)));
        assert!(!cam.contains(Position::new(500.0, 49.0)));
        assert_eq!(cam.center(), Position::new(500.0, 350.0));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0);
        assert_relative_eq!(a.distance_to(Position::new(3.0, 4.0)), 5.0);
    }
}
