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

//! # Tempo Core
//!
//! Foundational crate containing the plain data model, the quality table, and
//! the interface contracts through which the adaptive-quality core talks to
//! the render host.
//!
//! Nothing in here owns behaviour beyond small helpers: `tempo-telemetry`
//! measures, `tempo-control` decides, and `tempo-lanes` applies.

#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod platform;
pub mod quality;
pub mod renderer;
pub mod telemetry;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{HostError, HostResult, QualityError};
pub use utils::timer::{Clock, ManualClock, SharedClock, Stopwatch, SystemClock};
