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

use std::env::consts::DLL_EXTENSION;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out artifact paths that are unique for the lifetime of the process.
///
/// The platform loader caches libraries by path, so loading a rebuilt
/// artifact from a path it has seen before would return the stale code.
/// Paths have the form `<dir>/<stem>-<session>-<counter>.<ext>`.
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    dir: PathBuf,
    stem: String,
    session: u64,
    counter: u64,
}

impl ArtifactNamer {
    /// A namer whose session is the current unix time in seconds.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        let session = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::with_session(dir, stem, session)
    }

    /// A namer with an explicit session tag.
    pub fn with_session(dir: impl Into<PathBuf>, stem: impl Into<String>, session: u64) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            session,
            counter: 0,
        }
    }

    /// Returns a path never returned before by this namer.
    pub fn next_path(&mut self) -> PathBuf {
        self.counter += 1;
        self.dir.join(format!(
            "{}-{}-{}.{}",
            self.stem, self.session, self.counter, DLL_EXTENSION
        ))
    }

    /// The directory artifacts are placed in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of paths handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter
    }
}
