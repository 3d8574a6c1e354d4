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

//! # Ember Build
//!
//! Turns a module's source into a loadable artifact by driving an external
//! compiler. The [`BuildDispatcher`] synthesizes the command line for the
//! selected [`Toolchain`], runs it, and names every loadable artifact so that
//! no path is ever handed to the dynamic loader twice.

#![warn(missing_docs)]

mod dispatcher;
mod naming;
mod platform;
mod toolchain;

pub use dispatcher::BuildDispatcher;
pub use naming::ArtifactNamer;
pub use platform::{ParsePlatformError, Platform};
pub use toolchain::{CompileOptions, Toolchain, ToolchainConfig};
