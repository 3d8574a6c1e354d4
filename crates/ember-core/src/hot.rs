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

//! The seams the reload loop is assembled from.
//!
//! The host composes a [`ChangeSource`], a [`ModuleBuilder`] and a [`Loader`].
//! Each one has a real implementation in its own crate and a scripted one in
//! tests, so the loop itself can be exercised without a compiler.

use crate::abi::{self, InitFn, MainFn, UpdateFn};
use crate::error::{BuildError, LoadError};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::Duration;

/// Something that reports when the module's sources changed.
pub trait ChangeSource {
    /// Blocks for at most `timeout` and returns `true` if a debounced change
    /// was observed.
    fn wait_for_change(&mut self, timeout: Duration) -> bool;
}

/// Something that turns module sources into a loadable artifact.
pub trait ModuleBuilder {
    /// Builds `input` and returns the path of a fresh artifact.
    ///
    /// Every successful call must return a path that was never returned before.
    fn build_module(&mut self, input: &Path) -> Result<PathBuf, BuildError>;
}

/// Something that maps an artifact into the process.
pub trait Loader {
    /// Loads the artifact at `path`.
    fn load(&mut self, path: &Path) -> Result<Box<dyn Module>, LoadError>;
}

/// A loaded module generation.
pub trait Module {
    /// The artifact this module was loaded from.
    fn path(&self) -> &Path;

    /// Looks up an exported symbol.
    fn resolve(&self, symbol: &str) -> Result<Symbol, LoadError>;
}

/// The non-null address of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol(NonNull<c_void>);

impl Symbol {
    /// Wraps a raw address, rejecting null.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The raw address.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// The address of an in-process entry point.
    pub fn from_main(f: MainFn) -> Self {
        // SAFETY: function pointers are never null.
        Self(unsafe { NonNull::new_unchecked(f as *mut c_void) })
    }

    /// The address of an in-process legacy initializer.
    pub fn from_init(f: InitFn) -> Self {
        // SAFETY: function pointers are never null.
        Self(unsafe { NonNull::new_unchecked(f as *mut c_void) })
    }

    /// The address of an in-process legacy update function.
    pub fn from_update(f: UpdateFn) -> Self {
        // SAFETY: function pointers are never null.
        Self(unsafe { NonNull::new_unchecked(f as *mut c_void) })
    }
}

/// The entry point of a module, in one of the two supported contracts.
#[derive(Debug, Clone, Copy)]
pub enum EntryPoint {
    /// Invoked once per iteration with the shared context.
    Main(MainFn),
    /// Initialized once, then updated once per iteration.
    Legacy {
        /// Returns the module's opaque state.
        init: InitFn,
        /// Advances the module; a non-zero result requests exit.
        update: UpdateFn,
    },
}

impl EntryPoint {
    /// Resolves the entry point of `module`, preferring [`abi::MAIN_SYMBOL`].
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NoEntryPoint`] if the module exports neither
    /// contract completely.
    pub fn resolve(module: &dyn Module) -> Result<Self, LoadError> {
        if let Ok(main) = module.resolve(abi::MAIN_SYMBOL) {
            // SAFETY: the symbol contract fixes the signature of `ember_main`.
            let main = unsafe { std::mem::transmute::<*mut c_void, MainFn>(main.as_ptr()) };
            return Ok(Self::Main(main));
        }

        match (
            module.resolve(abi::LEGACY_INIT_SYMBOL),
            module.resolve(abi::LEGACY_UPDATE_SYMBOL),
        ) {
            (Ok(init), Ok(update)) => {
                // SAFETY: the symbol contract fixes both legacy signatures.
                let (init, update) = unsafe {
                    (
                        std::mem::transmute::<*mut c_void, InitFn>(init.as_ptr()),
                        std::mem::transmute::<*mut c_void, UpdateFn>(update.as_ptr()),
                    )
                };
                Ok(Self::Legacy { init, update })
            }
            _ => Err(LoadError::NoEntryPoint {
                path: module.path().to_path_buf(),
            }),
        }
    }
}
