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

//! # Tempo Control
//!
//! Decides how much detail the application can afford.
//!
//! [`DeviceCapabilityDetector`] probes the host once at startup and
//! recommends a ceiling. [`DynamicQualityManager`] owns the current quality
//! tier and runs the control loop: a progressive ramp after startup, then a
//! periodic check that reduces or recovers quality one tier at a time under
//! a cooldown and a stability period.

#![warn(missing_docs)]

pub mod device;
pub mod manager;

pub use device::{BenchmarkConfig, DeviceCapabilityDetector};
pub use manager::{DynamicQualityManager, QualityManagerConfig};
