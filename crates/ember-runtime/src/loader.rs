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

//! [`Loader`] implementations: shared libraries on disk and a static table.

use ember_core::abi::{self, InitFn, MainFn, UpdateFn};
use ember_core::{LoadError, Loader, Module, Symbol};
use libloading::Library;
use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

/// Maps shared libraries with the platform loader.
///
/// Libraries are never unmapped. State created by an old generation may still
/// point at its code or static data, so every generation stays resident until
/// the process exits.
#[derive(Debug, Default)]
pub struct LibraryLoader {
    generations: u64,
}

impl LibraryLoader {
    /// Creates a loader that has mapped nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of libraries mapped so far.
    pub fn generations(&self) -> u64 {
        self.generations
    }
}

struct SharedLibrary {
    path: PathBuf,
    library: &'static Library,
}

impl Loader for LibraryLoader {
    fn load(&mut self, path: &Path) -> Result<Box<dyn Module>, LoadError> {
        // SAFETY: loading runs the library's initializers. Modules are built by
        // this host from trusted sources.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.generations += 1;
        log::debug!(
            "Mapped '{}' ({} generations resident)",
            path.display(),
            self.generations
        );

        Ok(Box::new(SharedLibrary {
            path: path.to_path_buf(),
            library: Box::leak(Box::new(library)),
        }))
    }
}

impl Module for SharedLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str) -> Result<Symbol, LoadError> {
        let missing = |reason: String| LoadError::MissingSymbol {
            symbol: symbol.to_string(),
            reason,
        };
        // SAFETY: the symbol is read as an address only; it is given a type by
        // `EntryPoint::resolve` according to the module contract.
        let address = unsafe { self.library.get::<*mut c_void>(symbol.as_bytes()) }
            .map_err(|e| missing(e.to_string()))?;
        Symbol::new(*address).ok_or_else(|| missing("symbol is null".to_string()))
    }
}

/// A loader over a symbol table registered in-process.
///
/// Lets a host link its module statically and still drive it through the
/// reload loop, and lets tests swap generations without a compiler.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    symbols: HashMap<String, Symbol>,
    loads: u64,
}

impl StaticLoader {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table exporting `main` as the entry point.
    pub fn with_main(main: MainFn) -> Self {
        let mut loader = Self::new();
        loader.set_main(main);
        loader
    }

    /// A table exporting the legacy pair.
    pub fn with_legacy(init: InitFn, update: UpdateFn) -> Self {
        let mut loader = Self::new();
        loader.register(abi::LEGACY_INIT_SYMBOL, Symbol::from_init(init));
        loader.register(abi::LEGACY_UPDATE_SYMBOL, Symbol::from_update(update));
        loader
    }

    /// Replaces the entry point seen by subsequent loads.
    pub fn set_main(&mut self, main: MainFn) {
        self.register(abi::MAIN_SYMBOL, Symbol::from_main(main));
    }

    /// Adds or replaces a symbol.
    pub fn register(&mut self, name: &str, symbol: Symbol) {
        self.symbols.insert(name.to_string(), symbol);
    }

    /// Number of loads served.
    pub fn loads(&self) -> u64 {
        self.loads
    }
}

struct StaticModule {
    path: PathBuf,
    symbols: HashMap<String, Symbol>,
}

impl Loader for StaticLoader {
    fn load(&mut self, path: &Path) -> Result<Box<dyn Module>, LoadError> {
        self.loads += 1;
        Ok(Box::new(StaticModule {
            path: path.to_path_buf(),
            symbols: self.symbols.clone(),
        }))
    }
}

impl Module for StaticModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str) -> Result<Symbol, LoadError> {
        self.symbols
            .get(symbol)
            .copied()
            .ok_or_else(|| LoadError::MissingSymbol {
                symbol: symbol.to_string(),
                reason: "not registered".to_string(),
            })
    }
}
