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

//! Chunk-based memory that survives code reloads.
//!
//! All persistent and per-tick state lives in [`Arena`]s. An arena is a stack of
//! fixed-size [`Chunk`]s served by bump allocation; freeing an arena hands its
//! chunks back to the [`ChunkCache`] stored in the shared
//! [`Context`](crate::Context), where the next arena picks them up again.
//!
//! Chunks are never given back to the system allocator. Resident memory grows
//! to the high-water mark of live chunks and stays there, which bounds the
//! number of system allocations over the lifetime of the process.

mod arena;
mod chunk;

pub use arena::Arena;
pub use chunk::{Chunk, ChunkCache, CHUNK_ALIGN, CHUNK_SIZE};

/// A snapshot of the chunk cache counters, including derived metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChunkStats {
    // --- Counters ---
    /// Number of chunks requested from the system allocator.
    pub system_allocations: u64,
    /// Total bytes requested from the system allocator.
    pub system_bytes: u64,
    /// Number of chunk requests served from the free cache.
    pub cache_hits: u64,
    /// Number of chunks handed back to the free cache.
    pub released: u64,

    // --- Current State ---
    /// Number of chunks currently parked in the free cache.
    pub cached_chunks: usize,

    // --- Calculated Metrics ---
    /// Share of chunk requests served without touching the system allocator.
    pub reuse_ratio: f64,
}

impl ChunkStats {
    /// Populates the derived metrics based on the raw counter values.
    pub fn calculate_derived_metrics(&mut self) {
        let requests = self.cache_hits + self.system_allocations;
        if requests > 0 {
            self.reuse_ratio = self.cache_hits as f64 / requests as f64;
        }
    }

    /// Number of chunks that are currently owned by some arena.
    pub fn chunks_in_use(&self) -> u64 {
        self.system_allocations
            .saturating_sub(self.cached_chunks as u64)
    }
}
