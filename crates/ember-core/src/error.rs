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

//! Error types shared by the allocator, the build seam, and the loader seam.

use std::path::PathBuf;
use thiserror::Error;

/// An error raised by an [`Arena`](crate::Arena) or the [`ChunkCache`](crate::ChunkCache).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// A single request cannot fit in one chunk. This is a programming error.
    #[error(
        "allocation of {size} bytes (align {align}) exceeds the {capacity}-byte chunk capacity"
    )]
    Oversized {
        /// The requested size in bytes.
        size: usize,
        /// The requested alignment in bytes.
        align: usize,
        /// The capacity of one chunk.
        capacity: usize,
    },
    /// The system allocator refused to hand out another chunk.
    #[error("the system allocator refused a {size}-byte chunk")]
    OutOfMemory {
        /// The chunk size that was requested.
        size: usize,
    },
}

/// An error raised while compiling a loadable artifact.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The compiler process could not be started at all.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The compiler ran and exited unsuccessfully.
    #[error("'{program}' failed ({status})")]
    Failed {
        /// The program that was invoked.
        program: String,
        /// The exit status, rendered for display.
        status: String,
        /// Everything the compiler wrote to stdout and stderr.
        diagnostics: String,
    },
    /// The directory that should receive the artifact could not be created.
    #[error("failed to prepare output directory '{}': {source}", .dir.display())]
    OutputDir {
        /// The output directory.
        dir: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// No configured toolchain knows how to compile this input.
    #[error("no toolchain handles input '{}'", .0.display())]
    UnknownToolchain(PathBuf),
}

/// An error raised while mapping a module or resolving its symbols.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The artifact could not be mapped into the process.
    #[error("failed to load '{}': {reason}", .path.display())]
    Open {
        /// The artifact path.
        path: PathBuf,
        /// The loader's explanation.
        reason: String,
    },
    /// A symbol was requested that the module does not export.
    #[error("symbol '{symbol}' not found: {reason}")]
    MissingSymbol {
        /// The symbol name.
        symbol: String,
        /// The loader's explanation.
        reason: String,
    },
    /// The module exports neither the entry symbol nor the legacy pair.
    #[error("'{}' exports no entry point", .path.display())]
    NoEntryPoint {
        /// The artifact path.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_arena_error_display() {
        let err = ArenaError::Oversized {
            size: 2048,
            align: 8,
            capacity: 1024,
        };
        assert_eq!(
            err.to_string(),
            "allocation of 2048 bytes (align 8) exceeds the 1024-byte chunk capacity"
        );
    }

    #[test]
    fn test_build_error_keeps_io_source() {
        let err = BuildError::Spawn {
            program: "rustc".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to launch 'rustc': not found");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_load_error_display_uses_path() {
        let err = LoadError::NoEntryPoint {
            path: PathBuf::from("out/app-1-0.so"),
        };
        assert_eq!(err.to_string(), "'out/app-1-0.so' exports no entry point");
    }
}
