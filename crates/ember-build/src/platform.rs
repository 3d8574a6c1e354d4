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

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// The target a build is produced for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// The host the compiler runs on.
    #[default]
    #[serde(alias = "linux")]
    Native,
    /// Windows, cross-compiled from a non-Windows host.
    Windows,
    /// 32-bit WebAssembly without a standard library.
    Wasm,
}

/// Returned when a platform name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform '{0}' (expected native, linux, windows or wasm)")]
pub struct ParsePlatformError(String);

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "linux" => Ok(Self::Native),
            "windows" => Ok(Self::Windows),
            "wasm" => Ok(Self::Wasm),
            _ => Err(ParsePlatformError(s.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Windows => "windows",
            Self::Wasm => "wasm",
        })
    }
}

impl Platform {
    /// Whether the platform gets a CPU feature level flag.
    pub fn has_cpu_level(self) -> bool {
        !matches!(self, Self::Wasm)
    }

    /// The artifact path for this platform when one command builds several.
    ///
    /// Native keeps `base`. The others swap in their own extension so the
    /// outputs do not overwrite each other.
    pub fn artifact_path(self, base: &Path, loadable: bool) -> PathBuf {
        match (self, loadable) {
            (Self::Native, _) => base.to_path_buf(),
            (Self::Windows, true) => base.with_extension("dll"),
            (Self::Windows, false) => base.with_extension("exe"),
            (Self::Wasm, _) => base.with_extension("wasm"),
        }
    }
}
