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

//! # Ember Runtime
//!
//! The host side of live reloading: it owns the [`Context`](ember_core::Context),
//! watches the module's sources, rebuilds them into a fresh shared library on
//! every change and swaps the new generation in without restarting.
//!
//! [`Reloader`] is generic over its [`ModuleBuilder`](ember_core::ModuleBuilder)
//! and [`Loader`](ember_core::Loader); the `ember` binary plugs in the real
//! compiler and the platform loader.

#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod loader;
pub mod reloader;

pub use config::EmberConfig;
pub use loader::{LibraryLoader, StaticLoader};
pub use reloader::{ReloadError, ReloadStats, Reloader, ReloaderConfig, TickOutcome};
