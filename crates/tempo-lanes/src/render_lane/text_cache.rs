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

use lru::LruCache;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tempo_core::renderer::{SharedDrawable, TextStyle};

/// Cache key: the text and its serialized style.
pub type TextKey = (String, String);

/// A bounded, least-recently-used cache of text objects.
///
/// The cache only hands entries back; destroying evicted objects is the
/// caller's job since it owns the host connection and the logging policy.
pub struct TextCache {
    entries: LruCache<TextKey, SharedDrawable>,
}

impl TextCache {
    /// Creates an empty cache. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(non_zero(capacity)),
        }
    }

    /// Builds the key of `(text, style)`.
    pub fn key(text: &str, style: &TextStyle) -> TextKey {
        let style = serde_json::to_string(style).unwrap_or_else(|_| format!("{style:?}"));
        (text.to_string(), style)
    }

    /// Looks up `key`, marking it most recently used.
    pub fn get(&mut self, key: &TextKey) -> Option<SharedDrawable> {
        self.entries.get(key).cloned()
    }

    /// Inserts an object and returns whatever had to leave the cache.
    pub fn insert(&mut self, key: TextKey, object: SharedDrawable) -> Option<SharedDrawable> {
        let inserted = object.clone();
        self.entries
            .push(key, object)
            .map(|(_, old)| old)
            .filter(|old| !Rc::ptr_eq(old, &inserted))
    }

    /// Removes one entry.
    pub fn remove(&mut self, key: &TextKey) -> Option<SharedDrawable> {
        self.entries.pop(key)
    }

    /// Changes the capacity and returns the entries that no longer fit,
    /// least recently used first.
    pub fn resize(&mut self, capacity: usize) -> Vec<SharedDrawable> {
        let capacity = non_zero(capacity);
        let mut evicted = Vec::new();
        while self.entries.len() > capacity.get() {
            match self.entries.pop_lru() {
                Some((_, object)) => evicted.push(object),
                None => break,
            }
        }
        self.entries.resize(capacity);
        evicted
    }

    /// Empties the cache and returns every entry.
    pub fn drain(&mut self) -> Vec<SharedDrawable> {
        let mut out = Vec::with_capacity(self.entries.len());
        while let Some((_, object)) = self.entries.pop_lru() {
            out.push(object);
        }
        out
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
