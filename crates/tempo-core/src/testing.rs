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

//! Recording doubles for the render-host contracts.
//!
//! Every mutator call is counted so tests can assert on exactly how many
//! times the core touched the host. Faults can be injected per object or
//! per host.

use crate::error::{HostError, HostResult};
use crate::renderer::{
    CameraView, Drawable, DrawableId, Position, RenderHost, SharedDrawable, TextStyle,
};
use std::cell::RefCell;
use std::rc::Rc;

/// A drawable that remembers its state and counts every call.
#[derive(Debug, Clone)]
pub struct MockDrawable {
    /// Identity.
    pub id: DrawableId,
    /// Object category.
    pub kind: String,
    /// World position.
    pub position: Option<Position>,
    /// Last visibility set through `set_visible`.
    pub visible: bool,
    /// Last scale set through `set_scale`.
    pub scale: f32,
    /// Current text, for text objects.
    pub text: Option<String>,
    /// Whether `destroy` succeeded.
    pub destroyed: bool,
    /// Number of `set_visible` calls.
    pub set_visible_calls: usize,
    /// Number of `set_scale` calls.
    pub set_scale_calls: usize,
    /// Number of `set_position` calls.
    pub set_position_calls: usize,
    /// Number of `set_text` calls.
    pub set_text_calls: usize,
    /// Number of `destroy` calls.
    pub destroy_calls: usize,
    /// When set, every mutator fails with a backend error.
    pub faulty: bool,
}

impl MockDrawable {
    /// A visible object of the given kind.
    pub fn new(id: u64, kind: &str, position: Option<Position>) -> Self {
        Self {
            id: DrawableId(id),
            kind: kind.to_string(),
            position,
            visible: true,
            scale: 1.0,
            text: None,
            destroyed: false,
            set_visible_calls: 0,
            set_scale_calls: 0,
            set_position_calls: 0,
            set_text_calls: 0,
            destroy_calls: 0,
            faulty: false,
        }
    }

    /// A sprite at `(x, y)` wrapped for sharing.
    pub fn sprite_at(id: u64, x: f32, y: f32) -> Rc<RefCell<MockDrawable>> {
        Rc::new(RefCell::new(Self::new(id, "sprite", Some(Position::new(x, y)))))
    }

    fn check(&self) -> HostResult<()> {
        if self.faulty {
            Err(HostError::Backend(format!("mock drawable {} is faulty", self.id)))
        } else if self.destroyed {
            Err(HostError::Destroyed(self.id))
        } else {
            Ok(())
        }
    }
}

impl Drawable for MockDrawable {
    fn id(&self) -> DrawableId {
        self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn position(&self) -> Option<Position> {
        self.position
    }

    fn set_visible(&mut self, visible: bool) -> HostResult<()> {
        self.set_visible_calls += 1;
        self.check()?;
        self.visible = visible;
        Ok(())
    }

    fn set_scale(&mut self, scale: f32) -> HostResult<()> {
        self.set_scale_calls += 1;
        self.check()?;
        self.scale = scale;
        Ok(())
    }

    fn set_position(&mut self, x: f32, y: f32) -> HostResult<()> {
        self.set_position_calls += 1;
        self.check()?;
        self.position = Some(Position::new(x, y));
        Ok(())
    }

    fn set_text(&mut self, text: &str) -> HostResult<()> {
        self.set_text_calls += 1;
        self.check()?;
        if self.text.is_none() {
            return Err(HostError::Unsupported("set_text"));
        }
        self.text = Some(text.to_string());
        Ok(())
    }

    fn destroy(&mut self) -> HostResult<()> {
        self.destroy_calls += 1;
        self.check()?;
        self.destroyed = true;
        Ok(())
    }
}

/// Coerces a concrete mock into the shared trait-object handle.
pub fn shared(mock: &Rc<RefCell<MockDrawable>>) -> SharedDrawable {
    mock.clone()
}

/// A host that hands out [`MockDrawable`]s and keeps them all.
#[derive(Debug, Default)]
pub struct MockHost {
    /// Every object created so far, in creation order.
    pub created: Vec<Rc<RefCell<MockDrawable>>>,
    /// Number of `add_text` calls that produced an object.
    pub text_creations: usize,
    /// When set, every factory method fails.
    pub fail_creation: bool,
    /// Camera returned by [`RenderHost::camera`].
    pub camera: Option<CameraView>,
    next_id: u64,
}

impl MockHost {
    /// Creates an empty host without a camera.
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(
        &mut self,
        kind: &str,
        position: Option<Position>,
    ) -> HostResult<Rc<RefCell<MockDrawable>>> {
        if self.fail_creation {
            return Err(HostError::Backend(format!("cannot create {kind}")));
        }
        self.next_id += 1;
        let mock = Rc::new(RefCell::new(MockDrawable::new(
            1_000_000 + self.next_id,
            kind,
            position,
        )));
        self.created.push(mock.clone());
        Ok(mock)
    }

    /// Number of created objects that have not been destroyed.
    pub fn live_objects(&self) -> usize {
        self.created.iter().filter(|d| !d.borrow().destroyed).count()
    }
}

impl RenderHost for MockHost {
    fn add_text(
        &mut self,
        text: &str,
        _style: &TextStyle,
        x: f32,
        y: f32,
    ) -> HostResult<SharedDrawable> {
        let mock = self.spawn("text", Some(Position::new(x, y)))?;
        mock.borrow_mut().text = Some(text.to_string());
        self.text_creations += 1;
        Ok(mock)
    }

    fn add_sprite(&mut self, _texture: &str, x: f32, y: f32) -> HostResult<SharedDrawable> {
        Ok(self.spawn("sprite", Some(Position::new(x, y)))?)
    }

    fn add_rectangle(
        &mut self,
        x: f32,
        y: f32,
        _width: f32,
        _height: f32,
    ) -> HostResult<SharedDrawable> {
        Ok(self.spawn("rectangle", Some(Position::new(x, y)))?)
    }

    fn add_graphics(&mut self) -> HostResult<SharedDrawable> {
        Ok(self.spawn("graphics", None)?)
    }

    fn camera(&self) -> Option<CameraView> {
        self.camera
    }
}
