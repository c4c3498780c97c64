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

//! sysinfo-based implementation of the platform probes.

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};
use sysinfo::System;
use tempo_core::platform::{HardwareProbe, MemoryInfo, MemoryProbe, ScreenInfo};

/// Minimum time between two memory refreshes when sampled per frame.
const MEMORY_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// A platform probe backed by the `sysinfo` crate.
///
/// Screen information is not available from `sysinfo`; an optional screen
/// description can be supplied by the windowing layer.
pub struct SysinfoProbe {
    system: RefCell<System>,
    screen: Option<ScreenInfo>,
    last_refresh: Cell<Option<Instant>>,
    last_usage: Cell<Option<f64>>,
}

impl SysinfoProbe {
    /// Creates a probe with a fresh memory reading.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: RefCell::new(system),
            screen: None,
            last_refresh: Cell::new(Some(Instant::now())),
            last_usage: Cell::new(None),
        }
    }

    /// Reports `screen` from [`HardwareProbe::screen`].
    pub fn with_screen(mut self, screen: ScreenInfo) -> Self {
        self.screen = Some(screen);
        self
    }

    fn read_memory(&self) -> Option<MemoryInfo> {
        let system = self.system.borrow();
        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return None;
        }
        Some(MemoryInfo {
            total_bytes,
            used_bytes: system.used_memory(),
        })
    }

    /// Refreshes the memory counters if the interval has passed.
    fn tick(&self) {
        let due = self
            .last_refresh
            .get()
            .map_or(true, |at| at.elapsed() >= MEMORY_REFRESH_INTERVAL);
        if due {
            log::trace!("SysinfoProbe: refreshing memory counters");
            self.system.borrow_mut().refresh_memory();
            self.last_refresh.set(Some(Instant::now()));
            self.last_usage
                .set(self.read_memory().map(|info| info.usage_ratio()));
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareProbe for SysinfoProbe {
    fn hardware_concurrency(&self) -> Option<usize> {
        std::thread::available_parallelism().ok().map(|n| n.get())
    }

    fn memory(&self) -> Option<MemoryInfo> {
        self.system.borrow_mut().refresh_memory();
        self.read_memory()
    }

    fn screen(&self) -> Option<ScreenInfo> {
        self.screen
    }

    fn platform_name(&self) -> Option<String> {
        Some(System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string()))
    }
}

impl MemoryProbe for SysinfoProbe {
    fn memory_usage(&self) -> Option<f64> {
        self.tick();
        match self.last_usage.get() {
            Some(usage) => Some(usage),
            None => self.read_memory().map(|info| info.usage_ratio()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_concurrency_and_platform() {
        let probe = SysinfoProbe::new();
        assert!(probe.hardware_concurrency().unwrap_or(1) >= 1);
        assert!(probe.platform_name().is_some());
        assert!(probe.screen().is_none());
    }

    #[test]
    fn memory_usage_is_a_ratio() {
        let probe = SysinfoProbe::new();
        if let Some(usage) = probe.memory_usage() {
            assert!((0.0..=1.0).contains(&usage));
        }
        if let Some(info) = probe.memory() {
            assert!(info.total_bytes > 0);
        }
    }

    #[test]
    fn screen_can_be_supplied() {
        let screen = ScreenInfo {
            width: 1920,
            height: 1080,
            pixel_ratio: 1.0,
        };
        let probe = SysinfoProbe::new().with_screen(screen);
        assert_eq!(probe.screen(), Some(screen));
    }
}
