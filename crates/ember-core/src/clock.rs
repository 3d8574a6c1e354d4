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

//! Fixed-rate frame pacing for modules that drive an animation or a simulation.

use std::time::{Duration, Instant};

/// Target frame duration used until a module picks its own: 120 frames per second.
pub const DEFAULT_FRAME_DT: Duration = Duration::from_nanos(1_000_000_000 / 120);

/// Tracks the start of the current frame and how many frames were skipped.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    /// Target frame duration.
    pub dt: Duration,
    frame_start: Option<Instant>,
    frame_skips: u32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_DT)
    }
}

impl FrameClock {
    /// Creates a clock targeting frames of length `dt`.
    pub const fn new(dt: Duration) -> Self {
        Self {
            dt,
            frame_start: None,
            frame_skips: 0,
        }
    }

    /// Closes the current frame at `now` and returns how long to sleep before the
    /// next one starts.
    ///
    /// A frame that overran its budget is counted as skipped: the schedule is
    /// re-anchored at `now` and no sleep is requested.
    pub fn advance(&mut self, now: Instant) -> Duration {
        let start = *self.frame_start.get_or_insert(now);
        let end = start + self.dt;

        if now > end {
            self.frame_start = Some(now);
            self.frame_skips += 1;
            Duration::ZERO
        } else {
            self.frame_start = Some(end);
            end - now
        }
    }

    /// Number of frames that overran their budget so far.
    pub fn frame_skips(&self) -> u32 {
        self.frame_skips
    }

    /// Instant at which the next frame is scheduled, if any frame was closed yet.
    pub fn next_frame(&self) -> Option<Instant> {
        self.frame_start
    }
}
