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

//! The long-lived context handed to every module invocation.

use crate::clock::FrameClock;
use crate::memory::{Arena, ChunkCache};
use crate::output::Output;
use log::LevelFilter;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};
use std::time::{Duration, Instant};

/// Delay between two invocations when a module does not ask for another one.
pub const DEFAULT_WAKE_DELAY: Duration = Duration::from_millis(100);

/// Process-lifetime state shared between the host and every module generation.
///
/// The host creates exactly one `Context` before the first load and passes the
/// same instance, by pointer, to every invocation of every generation. Fields
/// are only touched by the thread that runs the reload loop.
///
/// The layout is shared with modules compiled from the same source, so a
/// module must be rebuilt whenever this crate changes.
#[repr(C)]
pub struct Context {
    /// `true` exactly for the first invocation after a (re)load.
    pub reloaded: bool,
    /// Last identifier handed out by [`Context::next_id`].
    pub id: u32,
    /// Opaque pointer to the module's persistent state, null until initialized.
    pub app: *mut c_void,
    /// Formatted output sink.
    pub out: Output,
    /// Deterministic random generator, seeded once per process.
    pub rng: ChaCha8Rng,
    /// Arguments passed through to the module.
    pub args: Vec<String>,
    /// Delay the loop waits before the next invocation.
    ///
    /// Reset to the default before each invocation; a module overrides it for
    /// the current iteration only.
    pub wake_delay: Duration,
    /// The free-chunk cache shared by every arena.
    pub chunks: ChunkCache,
    /// Persistent arena, survives reloads.
    pub mem: Arena,
    /// Scratch arena, freed after every invocation.
    pub tmp: Arena,
    /// Frame pacing for modules that need a fixed rate.
    pub clock: FrameClock,
    /// Number of completed invocations.
    pub tick: u64,
    exit_code: Option<i32>,
    logger: &'static dyn log::Log,
    max_level: LevelFilter,
}

impl Context {
    /// Creates the context, capturing the host's installed logger so modules
    /// can forward to it.
    pub fn new(args: Vec<String>, seed: u64, out: Output) -> Self {
        Self {
            reloaded: false,
            id: 0,
            app: ptr::null_mut(),
            out,
            rng: ChaCha8Rng::seed_from_u64(seed),
            args,
            wake_delay: DEFAULT_WAKE_DELAY,
            chunks: ChunkCache::new(),
            mem: Arena::new(),
            tmp: Arena::new(),
            clock: FrameClock::default(),
            tick: 0,
            exit_code: None,
            logger: log::logger(),
            max_level: log::max_level(),
        }
    }

    /// Returns a fresh identifier. Identifiers are never zero.
    pub fn next_id(&mut self) -> u32 {
        self.id = self.id.wrapping_add(1);
        if self.id == 0 {
            self.id = 1;
        }
        self.id
    }

    /// Overrides the delay before the next invocation.
    pub fn set_wake_delay(&mut self, delay: Duration) {
        self.wake_delay = delay;
    }

    /// Asks the host to stop after this invocation with `code`.
    pub fn request_exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    /// The exit code requested by the module, if any.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Prepares the context for one invocation.
    pub fn begin_tick(&mut self, default_wake: Duration) {
        self.wake_delay = default_wake;
    }

    /// Closes one invocation: the scratch arena goes back to the chunk cache.
    pub fn end_tick(&mut self) {
        self.tmp.free(&mut self.chunks);
        self.tick += 1;
    }

    /// Returns the module's persistent state, creating it with `init` if the
    /// context holds none yet.
    ///
    /// The state is placed in the persistent arena and is never dropped.
    ///
    /// # Safety
    ///
    /// Every call for the lifetime of the process, across every code
    /// generation, must use the same `T` with the same layout, until
    /// [`Context::reset_app`] is called.
    pub unsafe fn app_or_init<T>(&mut self, init: impl FnOnce(&mut Context) -> T) -> NonNull<T> {
        if let Some(app) = NonNull::new(self.app) {
            return app.cast();
        }
        let value = init(self);
        let ptr = self.mem.alloc_value(&mut self.chunks, value);
        self.app = ptr.as_ptr().cast();
        ptr
    }

    /// Drops the module state pointer and frees the persistent arena.
    pub fn reset_app(&mut self) {
        self.mem.free(&mut self.chunks);
        self.app = ptr::null_mut();
    }

    /// Routes the calling image's `log` macros to the host's logger.
    ///
    /// A module carries its own copy of the `log` crate, whose logger starts out
    /// unset. Call this once per load, typically when [`Context::reloaded`] is set.
    ///
    /// Returns `false` when this image already had a logger, which is then kept.
    pub fn forward_logging(&self) -> bool {
        let installed = log::set_logger(self.logger).is_ok();
        if !installed {
            log::trace!("Logger already installed in this image");
        }
        log::set_max_level(self.max_level);
        installed
    }

    /// Closes the current frame on [`Context::clock`] and sets the wake delay to
    /// whatever is left of its budget.
    pub fn pace(&mut self) {
        self.wake_delay = self.clock.advance(Instant::now());
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("reloaded", &self.reloaded)
            .field("id", &self.id)
            .field("app", &self.app)
            .field("args", &self.args)
            .field("wake_delay", &self.wake_delay)
            .field("chunks", &self.chunks.stats())
            .field("mem_chunks", &self.mem.chunk_count())
            .field("tmp_chunks", &self.tmp.chunk_count())
            .field("tick", &self.tick)
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::alloc::Layout;

    fn context() -> Context {
        Context::new(vec!["app".to_string()], 7, Output::sink())
    }

    #[test]
    fn test_next_id_starts_at_one() {
        let mut ctx = context();
        assert_eq!(ctx.next_id(), 1);
        assert_eq!(ctx.next_id(), 2);
    }

    #[test]
    fn test_next_id_skips_zero_on_wrap() {
        let mut ctx = context();
        ctx.id = u32::MAX;
        assert_eq!(ctx.next_id(), 1);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = context();
        let mut b = context();
        let xs: Vec<u32> = (0..8).map(|_| a.rng.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.rng.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_begin_tick_resets_wake_delay() {
        let mut ctx = context();
        ctx.set_wake_delay(Duration::from_secs(5));
        ctx.begin_tick(DEFAULT_WAKE_DELAY);
        assert_eq!(ctx.wake_delay, DEFAULT_WAKE_DELAY);
    }

    #[test]
    fn test_end_tick_recycles_scratch_chunks() {
        let mut ctx = context();
        ctx.tmp
            .allocate(&mut ctx.chunks, Layout::from_size_align(64, 8).unwrap());
        assert_eq!(ctx.tmp.chunk_count(), 1);

        ctx.end_tick();
        assert_eq!(ctx.tmp.chunk_count(), 0);
        assert_eq!(ctx.chunks.cached(), 1);
        assert_eq!(ctx.tick, 1);
    }

    #[test]
    fn test_app_state_is_created_once() {
        let mut ctx = context();
        let mut calls = 0;
        // SAFETY: `u64` is used for every call in this test.
        let first = unsafe {
            ctx.app_or_init(|_| {
                calls += 1;
                41u64
            })
        };
        // SAFETY: same type as above.
        let second = unsafe { ctx.app_or_init(|_| 0u64) };
        assert_eq!(first, second);
        assert_eq!(calls, 1);
        assert!(ctx.mem.owns(first.as_ptr().cast()));
    }

    #[test]
    fn test_reset_app_clears_state() {
        let mut ctx = context();
        // SAFETY: `u32` is used for every call in this test.
        unsafe { ctx.app_or_init(|_| 1u32) };
        ctx.reset_app();
        assert!(ctx.app.is_null());
        assert_eq!(ctx.mem.chunk_count(), 0);
    }

    #[test]
    fn test_exit_request() {
        let mut ctx = context();
        assert_eq!(ctx.exit_code(), None);
        ctx.request_exit(3);
        assert_eq!(ctx.exit_code(), Some(3));
    }

    #[test]
    fn test_forward_logging_keeps_the_first_logger() {
        let ctx = context();
        ctx.forward_logging();
        // Any later call in the same image finds a logger in place.
        assert!(!ctx.forward_logging());
        assert_eq!(log::max_level(), ctx.max_level);
    }
}
