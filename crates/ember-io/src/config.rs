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
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a [`FileWatcher`](crate::FileWatcher).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directories watched recursively.
    pub dirs: Vec<PathBuf>,
    /// Upper bound of a [`changed`](crate::FileWatcher::changed) call when nothing happens.
    pub poll_timeout_ms: u64,
    /// Quiet period that closes a burst of notifications.
    pub debounce_ms: u64,
    /// File names that never count as a change, wherever they appear.
    /// Used for files the build itself writes into the source tree.
    pub ignore_names: Vec<String>,
    /// File extensions that never count as a change (editor swap files).
    pub ignore_extensions: Vec<String>,
    /// Directories whose contents never count as a change.
    pub ignore_dirs: Vec<PathBuf>,
    /// Consecutive backend errors after which the watcher reports itself degraded.
    pub max_consecutive_errors: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            poll_timeout_ms: 100,
            debounce_ms: 100,
            ignore_names: vec!["asset.h".to_string(), "generated.rs".to_string()],
            ignore_extensions: vec!["swp".to_string(), "swx".to_string(), "tmp".to_string()],
            ignore_dirs: Vec::new(),
            max_consecutive_errors: 8,
        }
    }
}

impl WatchConfig {
    /// A default configuration watching only `dir`.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dirs: vec![dir.into()],
            ..Self::default()
        }
    }

    /// Upper bound of a [`changed`](crate::FileWatcher::changed) call.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Quiet period that closes a burst.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Returns `true` if a notification about `path` must be dropped.
    ///
    /// `ignore_dirs` are compared as given, so callers resolve them the same
    /// way the backend reports paths.
    pub(crate) fn is_ignored(&self, path: &Path) -> bool {
        let by_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.ignore_names.iter().any(|n| n == name));
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.ignore_extensions.iter().any(|e| e == ext));
        let by_dir = self.ignore_dirs.iter().any(|dir| path.starts_with(dir));

        by_name || by_extension || by_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ignores_generated_header() {
        let config = WatchConfig::default();
        assert!(config.is_ignored(Path::new("/proj/src/asset.h")));
        assert!(!config.is_ignored(Path::new("/proj/src/main.rs")));
    }

    #[test]
    fn test_ignores_swap_files_and_output_dir() {
        let config = WatchConfig {
            ignore_dirs: vec![PathBuf::from("/proj/out")],
            ..WatchConfig::for_dir("/proj")
        };
        assert!(config.is_ignored(Path::new("/proj/src/.main.rs.swp")));
        assert!(config.is_ignored(Path::new("/proj/out/hot-1-1.so")));
        assert!(!config.is_ignored(Path::new("/proj/outside.rs")));
    }

    #[test]
    fn test_durations() {
        let config = WatchConfig {
            poll_timeout_ms: 250,
            debounce_ms: 40,
            ..WatchConfig::default()
        };
        assert_eq!(config.poll_timeout(), Duration::from_millis(250));
        assert_eq!(config.debounce(), Duration::from_millis(40));
    }
}
