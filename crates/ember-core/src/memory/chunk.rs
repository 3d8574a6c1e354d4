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

//! Fixed-size chunks and the process-wide free-chunk cache.

use super::ChunkStats;
use crate::error::ArenaError;
use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

/// Size of every chunk: exactly 1 MiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Alignment of the first byte of every chunk.
pub const CHUNK_ALIGN: usize = 4096;

const CHUNK_LAYOUT: Layout = match Layout::from_size_align(CHUNK_SIZE, CHUNK_ALIGN) {
    Ok(layout) => layout,
    Err(_) => panic!("chunk size and alignment must form a valid layout"),
};

/// An owning handle to one [`CHUNK_SIZE`] block of raw memory.
///
/// Every chunk is the same and can be reused anywhere. A chunk is either owned
/// by exactly one [`Arena`](super::Arena) or parked in a [`ChunkCache`]; the
/// handle is deliberately neither `Clone` nor `Copy`.
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk {
    base: NonNull<u8>,
}

impl Chunk {
    /// Requests a fresh, zeroed chunk from the system allocator.
    fn from_system() -> Result<Self, ArenaError> {
        // SAFETY: CHUNK_LAYOUT has a non-zero size.
        let ptr = unsafe { System.alloc_zeroed(CHUNK_LAYOUT) };
        NonNull::new(ptr)
            .map(|base| Self { base })
            .ok_or(ArenaError::OutOfMemory { size: CHUNK_SIZE })
    }

    /// Returns the address of the first byte of the chunk.
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Returns `true` if `ptr` points inside this chunk.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr < start + CHUNK_SIZE
    }
}

/// The free-chunk cache: a LIFO stack of chunks no arena currently owns.
///
/// Popping and pushing never talk to the system allocator; only
/// [`acquire`](ChunkCache::acquire) on an empty cache does.
#[derive(Debug, Default)]
pub struct ChunkCache {
    free: Vec<Chunk>,
    stats: ChunkStats,
}

impl ChunkCache {
    /// Creates an empty cache.
    pub const fn new() -> Self {
        Self {
            free: Vec::new(),
            stats: ChunkStats {
                system_allocations: 0,
                system_bytes: 0,
                cache_hits: 0,
                released: 0,
                cached_chunks: 0,
                reuse_ratio: 0.0,
            },
        }
    }

    /// Pops a previously released chunk, if there is one.
    pub fn get_cached_chunk(&mut self) -> Option<Chunk> {
        let chunk = self.free.pop()?;
        self.stats.cache_hits += 1;
        Some(chunk)
    }

    /// Returns a chunk from the cache, or a new one from the system allocator
    /// when the cache is empty.
    pub fn acquire(&mut self) -> Result<Chunk, ArenaError> {
        if let Some(chunk) = self.get_cached_chunk() {
            return Ok(chunk);
        }

        let chunk = Chunk::from_system()?;
        self.stats.system_allocations += 1;
        self.stats.system_bytes += CHUNK_SIZE as u64;
        log::trace!(
            "Requested chunk #{} from the system allocator",
            self.stats.system_allocations
        );
        Ok(chunk)
    }

    /// Pushes a single chunk onto the cache.
    pub fn release_chunk(&mut self, chunk: Chunk) {
        self.free.push(chunk);
        self.stats.released += 1;
    }

    /// Moves every chunk of `chunks` onto the cache, leaving `chunks` empty.
    pub fn release_all(&mut self, chunks: &mut Vec<Chunk>) {
        self.stats.released += chunks.len() as u64;
        self.free.append(chunks);
    }

    /// Number of chunks currently in the cache.
    pub fn cached(&self) -> usize {
        self.free.len()
    }

    /// Takes a snapshot of the cache counters.
    pub fn stats(&self) -> ChunkStats {
        let mut stats = ChunkStats {
            cached_chunks: self.free.len(),
            ..self.stats
        };
        stats.calculate_derived_metrics();
        stats
    }
}
