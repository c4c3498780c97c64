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

//! Identity-keyed memory of what the optimizer did to each object.
//!
//! Only objects whose state differs from the default (visible, unscaled)
//! have an entry. Entries hold weak handles so the table never extends an
//! object's lifetime; dead entries are pruned by the optimizer's self-check.

use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tempo_core::renderer::{Drawable, DrawableId, SharedDrawable};
use tempo_core::{HostError, HostResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ObjectState {
    pub culled: bool,
    pub lod_hidden: bool,
    pub scale: f32,
}

impl ObjectState {
    pub const DEFAULT: Self = Self {
        culled: false,
        lod_hidden: false,
        scale: 1.0,
    };

    pub fn visible(&self) -> bool {
        !self.culled && !self.lod_hidden
    }
}

struct Tracked {
    handle: Weak<RefCell<dyn Drawable>>,
    state: ObjectState,
}

#[derive(Default)]
pub(crate) struct VisibilityTable {
    entries: AHashMap<DrawableId, Tracked>,
}

impl VisibilityTable {
    pub fn state(&self, id: DrawableId) -> ObjectState {
        self.entries
            .get(&id)
            .map_or(ObjectState::DEFAULT, |tracked| tracked.state)
    }

    /// Moves `object` to `next`, calling only the mutators whose value changes.
    ///
    /// On a host fault the part that did succeed is remembered and the error
    /// is returned, so the next pass retries the rest.
    pub fn apply(&mut self, object: &SharedDrawable, next: ObjectState) -> HostResult<()> {
        let mut drawable = object
            .try_borrow_mut()
            .map_err(|_| HostError::Backend("drawable is already borrowed".into()))?;
        let id = drawable.id();
        let current = self.state(id);
        let mut applied = current;

        if current.visible() != next.visible() {
            drawable.set_visible(next.visible())?;
        }
        applied.culled = next.culled;
        applied.lod_hidden = next.lod_hidden;

        let scaled = if current.scale != next.scale {
            drawable.set_scale(next.scale)
        } else {
            Ok(())
        };
        if scaled.is_ok() {
            applied.scale = next.scale;
        }
        drop(drawable);

        self.store(id, object, applied);
        scaled
    }

    fn store(&mut self, id: DrawableId, object: &SharedDrawable, state: ObjectState) {
        if state == ObjectState::DEFAULT {
            self.entries.remove(&id);
        } else {
            self.entries.insert(
                id,
                Tracked {
                    handle: Rc::downgrade(object),
                    state,
                },
            );
        }
    }

    /// Drops entries whose object no longer exists. Returns how many went.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, tracked| tracked.handle.strong_count() > 0);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
