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

//! `Ember.toml`: optional project configuration.

use anyhow::{Context as _, Result};
use ember_build::ToolchainConfig;
use ember_io::WatchConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmberConfig {
    /// Change detection.
    pub watch: WatchConfig,
    /// Compiler and artifacts.
    pub build: BuildConfig,
    /// Loop parameters.
    pub runtime: RuntimeConfig,
}

/// The `[build]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory receiving loadable artifacts.
    pub out_dir: PathBuf,
    /// File name prefix of loadable artifacts.
    pub artifact_stem: String,
    /// Keep superseded artifacts on disk.
    pub retain_artifacts: bool,
    /// Compiler selection and flags.
    #[serde(flatten)]
    pub toolchain: ToolchainConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            artifact_stem: "hot".to_string(),
            retain_artifacts: false,
            toolchain: ToolchainConfig::default(),
        }
    }
}

/// The `[runtime]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Wake delay applied before every invocation, in milliseconds.
    pub default_wake_ms: u64,
    /// Seed of the context's random generator. Random when absent.
    pub seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_wake_ms: 100,
            seed: None,
        }
    }
}

impl RuntimeConfig {
    /// The default wake delay.
    pub fn default_wake(&self) -> Duration {
        Duration::from_millis(self.default_wake_ms)
    }
}

impl EmberConfig {
    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No '{}' found. Using default configuration.", path.display());
            return Ok(Self::default());
        }

        log::info!("Found '{}'. Loading configuration.", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
    }

    /// The watch configuration for a module whose source is `input`.
    ///
    /// The input's directory is always watched, and the artifact directory
    /// never counts as a change.
    pub fn watch_config_for(&self, input: &Path) -> WatchConfig {
        let mut config = self.watch.clone();
        let dir = match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !config.dirs.iter().any(|d| dir.starts_with(d)) {
            config.dirs.push(dir);
        }
        config.ignore_dirs.push(self.build.out_dir.clone());
        config
    }
}

impl BuildConfig {
    /// Lets modules link against the host's own `ember_core`.
    ///
    /// `exe_dir` is the directory of the running host binary inside a cargo
    /// target directory. Its `deps` folder is added as a library directory and
    /// the newest `libember_core-*.rlib` there becomes the `ember_core` extern,
    /// unless the configuration already names one.
    pub fn link_host_crates(&mut self, exe_dir: &Path) {
        if self.toolchain.externs.contains_key("ember_core") {
            return;
        }
        let deps = exe_dir.join("deps");
        let Some(rlib) = newest_rlib(&deps, "libember_core-") else {
            log::debug!("No ember_core rlib next to the host in '{}'", deps.display());
            return;
        };

        log::debug!("Linking modules against '{}'", rlib.display());
        self.toolchain.externs.insert("ember_core".to_string(), rlib);
        if !self.toolchain.library_dirs.contains(&deps) {
            self.toolchain.library_dirs.push(deps);
        }
    }
}

fn newest_rlib(dir: &Path, prefix: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(prefix) && name.ends_with(".rlib")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.into_path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}
