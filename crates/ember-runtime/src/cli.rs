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

//! Command-line surface of the `ember` binary.

use clap::{Args, Parser, Subcommand};
use ember_build::Platform;
use std::path::PathBuf;

/// ember - rebuild and reload a running program on every save.
#[derive(Debug, Parser)]
#[command(name = "ember")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project configuration file
    #[arg(long, global = true, default_value = "Ember.toml")]
    pub config: PathBuf,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// The top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and run a module with hot reloading
    Run {
        /// Seed of the random generator shared with the module
        #[arg(long)]
        seed: Option<u64>,

        /// Source file of the module
        main: PathBuf,

        /// Arguments passed through to the module
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Build an executable or library once
    Build(BuildArgs),

    /// Build, then rebuild on every change
    Watch(BuildArgs),

    /// Format every source file under the watched directories
    Format,
}

/// Options shared by `build` and `watch`.
#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Source input path
    pub input: PathBuf,

    /// Output path
    pub output: PathBuf,

    /// Target platform (native, linux, windows, wasm). Repeat to build several;
    /// non-native outputs then get their platform's extension
    #[arg(long = "platform", default_values_t = [Platform::Native])]
    pub platforms: Vec<Platform>,

    /// Compile in release mode
    #[arg(long)]
    pub release: bool,

    /// Create a dynamically loadable library (a .dll/.so file)
    #[arg(long)]
    pub dynamic: bool,
}
