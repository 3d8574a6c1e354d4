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

//! The reload loop: rebuild on change, swap generations, invoke every tick.

use ember_core::abi::legacy_exit_code;
use ember_core::{
    BuildError, ChangeSource, Context, EntryPoint, LoadError, Loader, Module, ModuleBuilder,
};
use std::ffi::c_void;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a generation could not be brought up.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The compiler rejected the sources or could not run.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// The artifact could not be mapped or exports no entry point.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Wait this long, or until a change, then tick again.
    Continue(Duration),
    /// Stop with this process exit code.
    Exit(i32),
}

/// Static parameters of a [`Reloader`].
#[derive(Debug, Clone)]
pub struct ReloaderConfig {
    /// The module's source file.
    pub input: PathBuf,
    /// Wake delay applied before every invocation.
    pub default_wake: Duration,
}

impl ReloaderConfig {
    /// Uses the default wake delay.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            default_wake: ember_core::context::DEFAULT_WAKE_DELAY,
        }
    }
}

/// Counters kept across the lifetime of a [`Reloader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
    /// Build attempts.
    pub builds: u64,
    /// Attempts that failed in the compiler.
    pub build_failures: u64,
    /// Attempts that built but could not be loaded.
    pub load_failures: u64,
    /// Generations made active.
    pub swaps: u64,
    /// Module invocations.
    pub invocations: u64,
}

struct ActiveModule {
    entry: EntryPoint,
    generation: u64,
    module: Box<dyn Module>,
}

enum State {
    Unloaded,
    Loaded(ActiveModule),
}

/// Drives one module through build, load and per-tick invocation.
///
/// A generation only replaces the active one after it has been built, loaded
/// and its entry point resolved. Any failure leaves the previous generation
/// running and is retried on the next reported change.
pub struct Reloader<B: ModuleBuilder, L: Loader> {
    builder: B,
    loader: L,
    config: ReloaderConfig,
    state: State,
    first_tick: bool,
    pending_change: bool,
    legacy_state: Option<*mut c_void>,
    stats: ReloadStats,
}

impl<B: ModuleBuilder, L: Loader> Reloader<B, L> {
    /// Creates a reloader in the unloaded state. Nothing is built until the first tick.
    pub fn new(builder: B, loader: L, config: ReloaderConfig) -> Self {
        Self {
            builder,
            loader,
            config,
            state: State::Unloaded,
            first_tick: true,
            pending_change: false,
            legacy_state: None,
            stats: ReloadStats::default(),
        }
    }

    /// Marks the sources as changed; the next tick rebuilds.
    pub fn notify_change(&mut self) {
        self.pending_change = true;
    }

    /// Whether a generation is active.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    /// Generation number of the active module, starting at 1.
    pub fn generation(&self) -> Option<u64> {
        match &self.state {
            State::Loaded(active) => Some(active.generation),
            State::Unloaded => None,
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> ReloadStats {
        self.stats
    }

    /// The builder, for inspection.
    pub fn builder_mut(&mut self) -> &mut B {
        &mut self.builder
    }

    /// The loader, for inspection.
    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// Runs one iteration: reload if due, then invoke the active module once.
    pub fn tick(&mut self, ctx: &mut Context) -> TickOutcome {
        if self.first_tick || self.pending_change {
            self.first_tick = false;
            self.pending_change = false;
            self.reload(ctx);
        }

        ctx.begin_tick(self.config.default_wake);
        let entry = match &self.state {
            State::Loaded(active) => Some(active.entry),
            State::Unloaded => None,
        };
        let requested = entry.and_then(|entry| self.invoke(entry, ctx));
        ctx.reloaded = false;
        ctx.end_tick();

        match requested.or(ctx.exit_code()) {
            Some(code) => TickOutcome::Exit(code),
            None => TickOutcome::Continue(ctx.wake_delay),
        }
    }

    /// Ticks until the module asks to exit, waiting on `changes` in between.
    ///
    /// The wait doubles as the sleep between ticks. Returns the exit code.
    pub fn run(&mut self, ctx: &mut Context, changes: &mut impl ChangeSource) -> i32 {
        loop {
            match self.tick(ctx) {
                TickOutcome::Exit(code) => {
                    log::info!(
                        "Module requested exit with code {code} after {} ticks, {} generations",
                        ctx.tick,
                        self.stats.swaps
                    );
                    return code;
                }
                TickOutcome::Continue(delay) => {
                    if changes.wait_for_change(delay) {
                        log::info!("Change detected, rebuilding '{}'", self.config.input.display());
                        self.notify_change();
                    }
                }
            }
        }
    }

    fn reload(&mut self, ctx: &mut Context) {
        match self.bring_up() {
            Ok(active) => {
                if let EntryPoint::Legacy { init, .. } = active.entry {
                    if self.legacy_state.is_none() {
                        // SAFETY: the module contract fixes the signature of `ember_init`.
                        self.legacy_state = Some(unsafe { init() });
                    }
                }
                log::info!(
                    "Loaded generation {} from '{}'",
                    active.generation,
                    active.module.path().display()
                );
                // The superseded module is dropped, its code stays mapped.
                self.state = State::Loaded(active);
                self.stats.swaps += 1;
                ctx.reloaded = true;
            }
            Err(e) => match &self.state {
                State::Loaded(active) => log::error!(
                    "Reload failed, generation {} keeps running: {e}",
                    active.generation
                ),
                State::Unloaded => log::error!("No module running, waiting for a change: {e}"),
            },
        }
    }

    fn bring_up(&mut self) -> Result<ActiveModule, ReloadError> {
        self.stats.builds += 1;
        let artifact = self
            .builder
            .build_module(&self.config.input)
            .inspect_err(|_| self.stats.build_failures += 1)?;

        let loaded = self
            .loader
            .load(&artifact)
            .and_then(|module| EntryPoint::resolve(module.as_ref()).map(|entry| (entry, module)));
        let (entry, module) = loaded.inspect_err(|_| self.stats.load_failures += 1)?;

        Ok(ActiveModule {
            entry,
            generation: self.stats.swaps + 1,
            module,
        })
    }

    fn invoke(&mut self, entry: EntryPoint, ctx: &mut Context) -> Option<i32> {
        self.stats.invocations += 1;
        match entry {
            EntryPoint::Main(main) => {
                // SAFETY: the module contract fixes the signature, and the
                // context outlives the call.
                unsafe { main(ctx) };
                None
            }
            EntryPoint::Legacy { update, .. } => {
                let state = self.legacy_state.unwrap_or(std::ptr::null_mut());
                // SAFETY: `state` came from this module family's `ember_init`.
                legacy_exit_code(unsafe { update(state) })
            }
        }
    }
}

impl<B: ModuleBuilder, L: Loader> std::fmt::Debug for Reloader<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reloader")
            .field("input", &self.config.input)
            .field("generation", &self.generation())
            .field("pending_change", &self.pending_change)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
