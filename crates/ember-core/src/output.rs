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

//! The formatted output sink modules print through.

use std::fmt;
use std::io::{self, Write};

/// A byte sink owned by the [`Context`](crate::Context).
///
/// Modules write here instead of to `std::io::stdout` so that the host decides
/// where their output ends up, and so tests can capture it.
pub struct Output {
    sink: Box<dyn Write>,
}

impl Output {
    /// Wraps an arbitrary writer.
    pub fn new(sink: impl Write + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// An output that forwards to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// An output that discards everything.
    pub fn sink() -> Self {
        Self::new(io::sink())
    }

    /// Writes formatted text. A failing sink is logged, never fatal.
    pub fn print(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = self.sink.write_fmt(args) {
            log::warn!("Failed to write module output: {e}");
        }
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.sink.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output").finish_non_exhaustive()
    }
}
