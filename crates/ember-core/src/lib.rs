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

//! # Ember Core
//!
//! Foundational crate shared by the `ember` host and every hot-reloaded module:
//! the long-lived [`Context`], the chunk arenas that outlive any code
//! generation, the exported-symbol contract, and the traits the reload loop is
//! built from.
//!
//! A module links this crate statically, so it must be built by the same
//! toolchain and from the same source as the host that loads it.

#![warn(missing_docs)]

pub mod abi;
pub mod clock;
pub mod context;
pub mod error;
pub mod hot;
pub mod memory;
pub mod output;

pub use clock::FrameClock;
pub use context::Context;
pub use error::{ArenaError, BuildError, LoadError};
pub use hot::{ChangeSource, EntryPoint, Loader, Module, ModuleBuilder, Symbol};
pub use memory::{Arena, Chunk, ChunkCache, ChunkStats, CHUNK_ALIGN, CHUNK_SIZE};
pub use output::Output;

/// The `log` crate this image was built with.
///
/// Modules log through `ember_core::log::info!` and friends; the records reach
/// the host once [`Context::forward_logging`] has run, which
/// [`export_main!`] does on every load.
pub use log;
