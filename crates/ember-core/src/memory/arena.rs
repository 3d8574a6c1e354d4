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

use super::chunk::{Chunk, ChunkCache, CHUNK_ALIGN, CHUNK_SIZE};
use crate::error::ArenaError;
use std::alloc::Layout;
use std::ptr::{self, NonNull};

/// A bump allocator backed by a stack of chunks.
///
/// Allocations are carved from the head chunk in address order. When the head
/// cannot satisfy a request, a new chunk is taken from the [`ChunkCache`] and
/// becomes the head; the tail of the old head is wasted. There is no
/// per-allocation free: [`Arena::free`] returns every chunk at once.
///
/// Values placed in an arena are never dropped.
#[derive(Debug, Default)]
pub struct Arena {
    /// Owned chunks, the last one is the head.
    chunks: Vec<Chunk>,
    /// Offset of the next free byte in the head chunk.
    cursor: usize,
}

const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

impl Arena {
    /// Creates an arena that owns no chunks yet.
    pub const fn new() -> Self {
        Self {
            chunks: Vec::new(),
            cursor: 0,
        }
    }

    /// Returns the offset in the head chunk where `layout` would start, if it fits.
    fn fit(&self, layout: Layout) -> Option<usize> {
        let start = align_up(self.cursor, layout.align());
        (start + layout.size() <= CHUNK_SIZE).then_some(start)
    }

    /// Reserves zeroed memory for `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Oversized`] when the request can never fit in a
    /// single chunk, and [`ArenaError::OutOfMemory`] when a fresh chunk is
    /// needed and the system allocator refuses it.
    pub fn try_allocate(
        &mut self,
        cache: &mut ChunkCache,
        layout: Layout,
    ) -> Result<NonNull<u8>, ArenaError> {
        if layout.size() > CHUNK_SIZE || layout.align() > CHUNK_ALIGN {
            return Err(ArenaError::Oversized {
                size: layout.size(),
                align: layout.align(),
                capacity: CHUNK_SIZE,
            });
        }

        let (base, offset) = match (self.chunks.last(), self.fit(layout)) {
            (Some(head), Some(offset)) => (head.as_ptr(), offset),
            _ => {
                let chunk = cache.acquire()?;
                let base = chunk.as_ptr();
                self.chunks.push(chunk);
                (base, 0)
            }
        };

        self.cursor = offset + layout.size();
        // SAFETY: `offset + size <= CHUNK_SIZE`, so the range lies inside the head chunk,
        // which this arena owns exclusively.
        unsafe {
            let ptr = base.add(offset);
            ptr::write_bytes(ptr, 0, layout.size());
            Ok(NonNull::new_unchecked(ptr))
        }
    }

    /// Reserves zeroed memory for `layout`.
    ///
    /// # Panics
    ///
    /// Panics if `layout` is larger than a chunk or the system is out of memory.
    /// Both are unrecoverable for the callers of this method.
    pub fn allocate(&mut self, cache: &mut ChunkCache, layout: Layout) -> NonNull<u8> {
        match self.try_allocate(cache, layout) {
            Ok(ptr) => ptr,
            Err(err) => panic!("arena allocation failed: {err}"),
        }
    }

    /// Moves `value` into the arena and returns a pointer to it.
    ///
    /// The value stays valid until the arena is freed and is never dropped.
    pub fn alloc_value<T>(&mut self, cache: &mut ChunkCache, value: T) -> NonNull<T> {
        let ptr = self.allocate(cache, Layout::new::<T>()).cast::<T>();
        // SAFETY: freshly reserved, properly aligned for `T`.
        unsafe { ptr.as_ptr().write(value) };
        ptr
    }

    /// Copies `items` into the arena.
    pub fn alloc_slice_copy<T: Copy>(&mut self, cache: &mut ChunkCache, items: &[T]) -> NonNull<[T]> {
        let ptr = self.allocate(cache, Layout::for_value(items)).cast::<T>();
        // SAFETY: the destination was reserved with the layout of `items` and
        // cannot overlap the source, which lives outside this arena's free space.
        unsafe { ptr::copy_nonoverlapping(items.as_ptr(), ptr.as_ptr(), items.len()) };
        NonNull::slice_from_raw_parts(ptr, items.len())
    }

    /// Copies `text` into the arena.
    pub fn alloc_str(&mut self, cache: &mut ChunkCache, text: &str) -> NonNull<str> {
        let bytes = self.alloc_slice_copy(cache, text.as_bytes());
        // SAFETY: the bytes were copied verbatim from a `str`.
        unsafe { NonNull::new_unchecked(bytes.as_ptr() as *mut str) }
    }

    /// Returns every chunk to `cache` and resets the arena.
    ///
    /// The arena stays usable afterwards. Every pointer it handed out is
    /// invalidated.
    pub fn free(&mut self, cache: &mut ChunkCache) {
        cache.release_all(&mut self.chunks);
        self.cursor = 0;
    }

    /// Number of chunks this arena owns.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Offset of the next free byte in the head chunk.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns `true` if `ptr` lies in one of this arena's chunks.
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.chunks.iter().any(|chunk| chunk.contains(ptr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn layout(size: usize, align: usize) -> Layout {
        Layout::from_size_align(size, align).unwrap()
    }

    #[test]
    fn test_first_allocation_takes_a_chunk() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        assert_eq!(arena.chunk_count(), 0);

        let ptr = arena.allocate(&mut cache, layout(16, 8));
        assert_eq!(arena.chunk_count(), 1);
        assert_eq!(arena.cursor(), 16);
        assert!(arena.owns(ptr.as_ptr()));
        arena.free(&mut cache);
    }

    #[test]
    fn test_cursor_advances_by_size_plus_padding() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        arena.allocate(&mut cache, layout(3, 1));
        arena.allocate(&mut cache, layout(8, 8));
        assert_eq!(arena.cursor(), 16);
        arena.free(&mut cache);
    }

    #[test]
    fn test_request_that_does_not_fit_starts_a_new_head() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        let first = arena.allocate(&mut cache, layout(CHUNK_SIZE - 8, 8));
        let second = arena.allocate(&mut cache, layout(16, 8));

        assert_eq!(arena.chunk_count(), 2);
        assert_eq!(arena.cursor(), 16);
        assert_ne!(first.as_ptr(), second.as_ptr());
        assert_eq!(second.as_ptr() as usize % CHUNK_ALIGN, 0);
        arena.free(&mut cache);
    }

    #[test]
    fn test_full_chunk_exactly_fits() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        arena.allocate(&mut cache, layout(CHUNK_SIZE, 1));
        assert_eq!(arena.chunk_count(), 1);
        assert_eq!(arena.cursor(), CHUNK_SIZE);
        arena.free(&mut cache);
    }

    #[test]
    fn test_oversized_request_is_an_error() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        let err = arena
            .try_allocate(&mut cache, layout(CHUNK_SIZE + 1, 1))
            .unwrap_err();
        assert!(matches!(err, ArenaError::Oversized { .. }));
        assert_eq!(arena.chunk_count(), 0);
        assert_eq!(cache.stats().system_allocations, 0);
    }

    #[test]
    #[should_panic(expected = "arena allocation failed")]
    fn test_allocate_panics_on_oversized() {
        let mut cache = ChunkCache::new();
        Arena::new().allocate(&mut cache, layout(2 * CHUNK_SIZE, 8));
    }

    #[test]
    fn test_free_then_reallocate_reuses_chunks() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        for _ in 0..3 {
            arena.allocate(&mut cache, layout(CHUNK_SIZE, 1));
        }
        arena.free(&mut cache);
        assert_eq!(arena.chunk_count(), 0);
        assert_eq!(arena.cursor(), 0);
        assert_eq!(cache.cached(), 3);

        let before = cache.stats().system_allocations;
        for _ in 0..3 {
            arena.allocate(&mut cache, layout(CHUNK_SIZE, 1));
        }
        assert_eq!(cache.stats().system_allocations, before);
        assert_eq!(cache.stats().cache_hits, 3);
        arena.free(&mut cache);
    }

    #[test]
    fn test_reused_memory_is_zeroed() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();
        let ptr = arena.alloc_value(&mut cache, [0xAAu8; 64]);
        arena.free(&mut cache);

        let again = arena.alloc_value(&mut cache, 0u8);
        assert_eq!(again.cast::<u8>(), ptr.cast::<u8>());
        let bytes = arena.allocate(&mut cache, layout(63, 1));
        // SAFETY: 63 bytes were just reserved.
        let view = unsafe { std::slice::from_raw_parts(bytes.as_ptr(), 63) };
        assert!(view.iter().all(|&b| b == 0));
        arena.free(&mut cache);
    }

    #[test]
    fn test_alloc_helpers() {
        let mut cache = ChunkCache::new();
        let mut arena = Arena::new();

        let value = arena.alloc_value(&mut cache, 42u64);
        let slice = arena.alloc_slice_copy(&mut cache, &[1u32, 2, 3]);
        let text = arena.alloc_str(&mut cache, "ember");

        // SAFETY: all three pointers are live until `free`.
        unsafe {
            assert_eq!(*value.as_ref(), 42);
            assert_eq!(slice.as_ref(), &[1, 2, 3]);
            assert_eq!(text.as_ref(), "ember");
        }
        arena.free(&mut cache);
    }

    proptest! {
        #[test]
        fn test_allocations_never_overlap(
            requests in prop::collection::vec((1usize..4096, 0u32..7), 1..200)
        ) {
            let mut cache = ChunkCache::new();
            let mut arena = Arena::new();
            let mut ranges: Vec<(usize, usize)> = Vec::new();

            for (size, align_pow) in requests {
                let layout = layout(size, 1 << align_pow);
                let ptr = arena.allocate(&mut cache, layout).as_ptr() as usize;
                prop_assert_eq!(ptr % layout.align(), 0);
                ranges.push((ptr, ptr + size));
            }

            ranges.sort_unstable();
            for pair in ranges.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0);
            }
            arena.free(&mut cache);
        }

        #[test]
        fn test_cursor_matches_size_and_padding(
            size in 1usize..1024,
            align_pow in 0u32..7,
            prefix in 0usize..64,
        ) {
            let mut cache = ChunkCache::new();
            let mut arena = Arena::new();
            arena.allocate(&mut cache, layout(prefix.max(1), 1));
            let before = arena.cursor();

            let align = 1usize << align_pow;
            arena.allocate(&mut cache, layout(size, align));
            let padding = align_up(before, align) - before;
            prop_assert_eq!(arena.cursor(), before + padding + size);
            arena.free(&mut cache);
        }
    }
}
