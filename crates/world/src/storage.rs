use std::collections::BTreeMap;

use lru::LruCache;

use crate::chunk::Chunk;
use crate::hex::ChunkPos;

/// Resident chunk arena with least-recently-used ranking.
///
/// Chunks live in a `BTreeMap` for deterministic iteration. Every access
/// stamps the chunk with a logical clock and promotes it in the LRU, so
/// popping from the LRU matches ranking by last access.
pub struct ChunkStorage {
    chunks: BTreeMap<ChunkPos, Chunk>,
    lru: LruCache<ChunkPos, ()>,
    clock: u64,
}

impl Default for ChunkStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStorage {
    /// Create an empty storage. Capacity is enforced by [`ChunkStorage::evict_to`].
    pub fn new() -> Self {
        Self {
            chunks: BTreeMap::new(),
            lru: LruCache::unbounded(),
            clock: 0,
        }
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true when no chunks are currently stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether `pos` is resident.
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Fetch a resident chunk without recording an access.
    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Fetch a resident chunk mutably, recording an access.
    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        if !self.chunks.contains_key(&pos) {
            return None;
        }
        let stamp = self.tick(pos);
        let chunk = self.chunks.get_mut(&pos)?;
        chunk.touch(stamp);
        Some(chunk)
    }

    /// Fetch `pos`, inserting the chunk built by `make` when it is absent.
    pub fn get_or_insert_with(&mut self, pos: ChunkPos, make: impl FnOnce() -> Chunk) -> &mut Chunk {
        let stamp = self.tick(pos);
        let chunk = self.chunks.entry(pos).or_insert_with(make);
        chunk.touch(stamp);
        chunk
    }

    /// Evict least-recently-used chunks until at most `max_resident` remain.
    /// Evicted chunks are returned oldest first.
    pub fn evict_to(&mut self, max_resident: usize) -> Vec<Chunk> {
        let mut evicted = Vec::new();
        while self.chunks.len() > max_resident {
            let Some((oldest, _)) = self.lru.pop_lru() else {
                break;
            };
            if let Some(chunk) = self.chunks.remove(&oldest) {
                evicted.push(chunk);
            }
        }
        evicted
    }

    /// Iterate over currently resident chunk positions.
    pub fn iter_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    /// Iterate over resident chunks.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    fn tick(&mut self, pos: ChunkPos) -> u64 {
        self.clock += 1;
        self.lru.put(pos, ());
        self.clock
    }
}
