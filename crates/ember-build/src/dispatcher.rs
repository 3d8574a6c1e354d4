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

use crate::naming::ArtifactNamer;
use crate::toolchain::{CompileOptions, ToolchainConfig};
use ember_core::{BuildError, ModuleBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Runs the external compiler and tracks the artifacts it produced.
#[derive(Debug, Clone)]
pub struct BuildDispatcher {
    config: ToolchainConfig,
    namer: ArtifactNamer,
    retain_artifacts: bool,
    previous: Option<PathBuf>,
}

impl BuildDispatcher {
    /// Creates a dispatcher that names loadable artifacts with `namer`.
    pub fn new(config: ToolchainConfig, namer: ArtifactNamer) -> Self {
        Self {
            config,
            namer,
            retain_artifacts: false,
            previous: None,
        }
    }

    /// Keeps superseded artifacts on disk instead of deleting them.
    pub fn retain_artifacts(mut self, retain: bool) -> Self {
        self.retain_artifacts = retain;
        self
    }

    /// The toolchain configuration.
    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Runs one compiler invocation.
    ///
    /// Compiler output is forwarded to the log. On failure, any file left at
    /// `opts.output` is removed so it cannot be loaded by mistake.
    ///
    /// # Errors
    ///
    /// [`BuildError::Spawn`] if the compiler cannot be started,
    /// [`BuildError::Failed`] if it exits unsuccessfully.
    pub fn compile(&self, opts: &CompileOptions) -> Result<(), BuildError> {
        let toolchain = self.config.toolchain_for(&opts.input)?;
        if let Some(dir) = opts.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| BuildError::OutputDir {
                dir: dir.to_path_buf(),
                source,
            })?;
        }

        let program = toolchain.program(&self.config);
        let args = toolchain.command_line(opts, &self.config);
        log::info!(
            "Compiling '{}' to '{}' ({}{}, {})",
            opts.input.display(),
            opts.output.display(),
            if opts.loadable { "loadable, " } else { "" },
            if opts.release { "release" } else { "debug" },
            opts.platform,
        );
        log::debug!("> {} {}", program, args.join(" "));

        let start_time = Instant::now();
        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|source| BuildError::Spawn {
                program: program.to_string(),
                source,
            })?;
        let duration = start_time.elapsed();

        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
        let diagnostics = diagnostics.trim_end().to_string();

        if output.status.success() {
            if !diagnostics.is_empty() {
                log::debug!("{diagnostics}");
            }
            log::info!("Build completed in {:.2}s", duration.as_secs_f64());
            Ok(())
        } else {
            log::error!(
                "Build failed after {:.2}s:\n{}",
                duration.as_secs_f64(),
                diagnostics
            );
            discard(&opts.output);
            Err(BuildError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                diagnostics,
            })
        }
    }
}

/// Removes a file that must not be mistaken for a valid artifact.
fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed '{}'", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove '{}': {e}", path.display()),
    }
}

impl ModuleBuilder for BuildDispatcher {
    fn build_module(&mut self, input: &Path) -> Result<PathBuf, BuildError> {
        let output = self.namer.next_path();
        self.compile(&CompileOptions::new(input, &output).loadable(true))?;

        if let Some(previous) = self.previous.replace(output.clone()) {
            if !self.retain_artifacts {
                // The old generation stays mapped, only its file goes away.
                if let Err(e) = fs::remove_file(&previous) {
                    log::debug!("Kept '{}': {e}", previous.display());
                }
            }
        }
        Ok(output)
    }
}
