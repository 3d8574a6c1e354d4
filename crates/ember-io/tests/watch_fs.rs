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

use ember_io::{FileWatcher, WatchConfig};
use std::fs;
use std::time::Duration;

fn config(dir: &std::path::Path) -> WatchConfig {
    WatchConfig {
        debounce_ms: 50,
        ..WatchConfig::for_dir(dir)
    }
}

#[test]
fn test_detects_a_write_in_a_real_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut watcher = FileWatcher::new(config(dir.path())).unwrap();

    fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    assert!(watcher.changed_within(Duration::from_secs(5)));
}

#[test]
fn test_detects_changes_in_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    let mut watcher = FileWatcher::new(config(dir.path())).unwrap();

    fs::write(dir.path().join("nested").join("util.rs"), "pub fn f() {}").unwrap();
    assert!(watcher.changed_within(Duration::from_secs(5)));
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    assert!(FileWatcher::init(missing).is_err());
}

#[test]
fn test_writes_into_ignored_dir_are_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let mut watcher = FileWatcher::new(WatchConfig {
        ignore_dirs: vec![out.clone()],
        ..config(dir.path())
    })
    .unwrap();

    fs::write(out.join("hot-1-1.so"), b"\x7fELF").unwrap();
    assert!(!watcher.changed_within(Duration::from_millis(300)));
}
