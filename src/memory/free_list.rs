//! Coalesced set of free blocks below the high-water mark.
//!
//! The same blocks are indexed twice:
//!
//! - `by_size`: ordered `(size, address)` pairs. A range query starting at
//!   `(need, 0)` yields the best fit: the smallest block that is large
//!   enough, lowest address first among equal sizes.
//! - `by_start` / `by_end`: hash maps from a block's first byte and from its
//!   one-past-the-end byte. A block being freed finds its predecessor in
//!   `by_end` and its successor in `by_start` in O(1).
//!
//! Only [`FreeList::insert`] and [`FreeList::remove`] touch the indexes, and
//! each updates all three, so the indexes cannot drift apart.
//!
//! Invariants between calls:
//! - no two free blocks overlap;
//! - no two free blocks are adjacent (they would have been merged).

use std::collections::{BTreeSet, HashMap};

use crate::error::PlanResult;
use crate::internal_error;
use crate::memory::block::Block;

#[derive(Debug, Default, Clone)]
pub struct FreeList {
    /// Best-fit index: (size, address)
    by_size: BTreeSet<(usize, usize)>,
    /// Adjacency index: start address -> size
    by_start: HashMap<usize, usize>,
    /// Adjacency index: end address -> start address
    by_end: HashMap<usize, usize>,
    /// Sum of all free block sizes
    total_bytes: usize,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block to every index.
    ///
    /// The caller guarantees the block neither overlaps nor touches an
    /// existing free block; [`FreeList::release`] is the merging entry point.
    pub(crate) fn insert(&mut self, block: Block) {
        debug_assert!(block.size > 0, "free blocks are never empty");
        self.by_size.insert((block.size, block.address));
        self.by_start.insert(block.address, block.size);
        self.by_end.insert(block.end(), block.address);
        self.total_bytes += block.size;
    }

    /// Drop a block from every index.
    fn remove(&mut self, block: Block) {
        let in_size = self.by_size.remove(&(block.size, block.address));
        let in_start = self.by_start.remove(&block.address);
        let in_end = self.by_end.remove(&block.end());
        debug_assert!(
            in_size && in_start == Some(block.size) && in_end == Some(block.address),
            "free list indexes out of sync for {:?}",
            block
        );
        self.total_bytes -= block.size;
    }

    /// Remove and return the smallest block of at least `need` bytes.
    ///
    /// Ties between equally sized blocks go to the lowest address.
    pub fn take_best_fit(&mut self, need: usize) -> Option<Block> {
        let &(size, address) = self.by_size.range((need, 0)..).next()?;
        let block = Block::new(address, size);
        self.remove(block);
        Some(block)
    }

    /// Remove and return the block that ends exactly at `address`.
    pub fn take_ending_at(&mut self, address: usize) -> Option<Block> {
        let start = *self.by_end.get(&address)?;
        let size = *self.by_start.get(&start)?;
        let block = Block::new(start, size);
        self.remove(block);
        Some(block)
    }

    /// Remove and return the block that starts exactly at `address`.
    pub fn take_starting_at(&mut self, address: usize) -> Option<Block> {
        let size = *self.by_start.get(&address)?;
        let block = Block::new(address, size);
        self.remove(block);
        Some(block)
    }

    /// Return `block` to the free set, merging it with the free blocks
    /// directly before and after it. Returns the merged block.
    pub fn release(&mut self, block: Block) -> Block {
        let mut merged = block;

        if let Some(prev) = self.take_ending_at(merged.address) {
            merged = Block::new(prev.address, prev.size + merged.size);
        }

        if let Some(next) = self.take_starting_at(merged.end()) {
            merged.size += next.size;
        }

        self.insert(merged);
        merged
    }

    /// All free blocks, sorted by address
    pub fn blocks(&self) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .by_start
            .iter()
            .map(|(&address, &size)| Block::new(address, size))
            .collect();
        blocks.sort_by_key(|b| b.address);
        blocks
    }

    pub fn len(&self) -> usize {
        self.by_size.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_size.is_empty()
    }

    /// Sum of all free block sizes
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Largest free block, if any
    pub fn largest(&self) -> Option<Block> {
        self.by_size
            .iter()
            .next_back()
            .map(|&(size, address)| Block::new(address, size))
    }

    /// Fragmentation ratio (0.0 = a single free block or none, towards 1.0 = scattered)
    pub fn fragmentation(&self) -> f32 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let largest = self.largest().map(|b| b.size).unwrap_or(0);
        1.0 - (largest as f32 / self.total_bytes as f32)
    }

    /// Verify index agreement, non-overlap and maximal coalescing.
    pub fn check_invariants(&self) -> PlanResult<()> {
        if self.by_size.len() != self.by_start.len() || self.by_start.len() != self.by_end.len() {
            return Err(internal_error!(
                "index sizes differ: by_size={} by_start={} by_end={}",
                self.by_size.len(),
                self.by_start.len(),
                self.by_end.len()
            ));
        }

        for &(size, address) in &self.by_size {
            if size == 0 {
                return Err(internal_error!("empty free block at {}", address));
            }
            if self.by_start.get(&address) != Some(&size) {
                return Err(internal_error!("block [{}, +{}) missing from start index", address, size));
            }
            if self.by_end.get(&(address + size)) != Some(&address) {
                return Err(internal_error!("block [{}, +{}) missing from end index", address, size));
            }
        }

        let blocks = self.blocks();
        let total: usize = blocks.iter().map(|b| b.size).sum();
        if total != self.total_bytes {
            return Err(internal_error!(
                "free byte count {} disagrees with blocks {}",
                self.total_bytes,
                total
            ));
        }

        for pair in blocks.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                return Err(internal_error!("free blocks overlap: {:?} {:?}", pair[0], pair[1]));
            }
            if pair[0].is_adjacent_to(&pair[1]) {
                return Err(internal_error!("free blocks not coalesced: {:?} {:?}", pair[0], pair[1]));
            }
        }

        Ok(())
    }
}
