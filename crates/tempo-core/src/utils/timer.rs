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

//! Time sources and a simple stopwatch.
//!
//! Every timestamp in the data model is a [`Duration`] measured from the origin
//! of the [`Clock`] that produced it. Components receive the clock as a
//! [`SharedClock`] so tests can drive time by hand with a [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock {
    /// Returns the time elapsed since this clock's origin.
    fn now(&self) -> Duration;
}

/// A reference-counted clock handle shared by the components of one session.
pub type SharedClock = Rc<dyn Clock>;

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Convenience constructor returning a [`SharedClock`].
    pub fn shared() -> SharedClock {
        Rc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the component under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Creates a manual clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    /// Moves the clock forward by a fractional number of milliseconds.
    pub fn advance_ms(&self, ms: f64) {
        self.advance(Duration::from_secs_f64(ms / 1000.0));
    }

    /// Jumps to an absolute time. Moving backwards is ignored.
    pub fn set(&self, now: Duration) {
        if now >= self.now.get() {
            self.now.set(now);
        }
    }

    /// Returns a [`SharedClock`] handle backed by this clock.
    pub fn shared(&self) -> SharedClock {
        Rc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Measures elapsed time against a [`Clock`].
pub struct Stopwatch {
    clock: SharedClock,
    started_at: Duration,
}

impl Stopwatch {
    /// Starts a new stopwatch immediately.
    pub fn start(clock: SharedClock) -> Self {
        let started_at = clock.now();
        Self { clock, started_at }
    }

    /// Time since the stopwatch was started.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started_at)
    }

    /// Time since the stopwatch was started, in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}
