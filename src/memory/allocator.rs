//! Offset allocator for planning a tensor graph's memory.
//!
//! Inspired by ggml's graph allocator: tensors are assigned byte offsets
//! into a buffer that does not exist yet. Only after the whole graph has been
//! walked is one buffer of exactly the peak size requested from the runtime.
//!
//! # Strategy
//!
//! - Round every request up to the configured alignment
//! - Best-fit over the free list; split off and keep any remainder
//! - Otherwise bump-allocate at the high-water mark
//! - On free, merge with the free neighbours on both sides
//!
//! # Phases
//!
//! [`OffsetAllocator`] is the planning phase and is the only type with
//! `alloc`/`free`. [`OffsetAllocator::materialize`] consumes it and returns
//! a [`MaterializedAllocator`], which owns the real buffer and releases it
//! back to the runtime on drop.

use std::collections::HashMap;
use std::fmt;

use crate::config::PlannerConfig;
use crate::error::{PlanError, PlanResult};
use crate::memory::block::Block;
use crate::memory::free_list::FreeList;
use crate::runtime::Runtime;

/// Lifetime operation counters
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    alloc_count: usize,
    free_count: usize,
    /// Allocations served from the free list instead of the bump pointer
    reuse_count: usize,
    /// Highest `used` observed
    max_used: usize,
}

/// Planning-phase allocator.
///
/// Hands out aligned offsets below a growing high-water mark (`peak`) and
/// recycles freed ranges best-fit. No real memory is touched until
/// [`OffsetAllocator::materialize`].
///
/// # Example
///
/// ```rust
/// use memplan::{DummyRuntime, OffsetAllocator};
///
/// let mut planner = OffsetAllocator::new(DummyRuntime::new());
/// let a = planner.alloc(10)?; // rounded up to 16
/// planner.free(a, 10)?;
/// let b = planner.alloc(8)?; // reuses the freed range
/// assert_eq!(a, b);
/// assert_eq!(planner.peak(), 16);
///
/// let materialized = planner.materialize()?;
/// assert_eq!(materialized.buffer().size, 16);
/// # Ok::<(), memplan::PlanError>(())
/// ```
#[derive(Debug)]
pub struct OffsetAllocator<R: Runtime> {
    runtime: R,
    config: PlannerConfig,
    /// Sum of aligned sizes of live allocations
    used: usize,
    /// One past the highest byte ever handed out
    peak: usize,
    free_list: FreeList,
    /// Live allocations: offset -> aligned size
    live: HashMap<usize, usize>,
    counters: Counters,
}

impl<R: Runtime> OffsetAllocator<R> {
    /// Create an allocator with the default configuration
    pub fn new(runtime: R) -> Self {
        Self::from_parts(runtime, PlannerConfig::default())
    }

    /// Create an allocator with a custom configuration
    ///
    /// # Errors
    /// - If the configuration is invalid (zero alignment)
    pub fn with_config(runtime: R, config: PlannerConfig) -> PlanResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(runtime, config))
    }

    fn from_parts(runtime: R, config: PlannerConfig) -> Self {
        Self {
            runtime,
            config,
            used: 0,
            peak: 0,
            free_list: FreeList::new(),
            live: HashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Plan an allocation of `size` bytes.
    ///
    /// # Returns
    /// Aligned offset into the future buffer, disjoint from every other live
    /// allocation
    ///
    /// # Errors
    /// - If `size` is zero
    /// - If the aligned size or the new peak overflows `usize`
    pub fn alloc(&mut self, size: usize) -> PlanResult<usize> {
        if size == 0 {
            return Err(PlanError::ZeroSizeAllocation);
        }
        let need = self.aligned(size)?;

        let offset = match self.free_list.take_best_fit(need) {
            Some(block) => {
                if block.size > need {
                    // The remainder cannot touch another free block: the
                    // block it came from did not
                    self.free_list
                        .insert(Block::new(block.address + need, block.size - need));
                }
                self.counters.reuse_count += 1;
                block.address
            }
            None => {
                let offset = self.peak;
                self.peak = offset
                    .checked_add(need)
                    .ok_or(PlanError::AllocationTooLarge { size })?;
                offset
            }
        };

        self.used += need;
        self.counters.alloc_count += 1;
        self.counters.max_used = self.counters.max_used.max(self.used);
        self.live.insert(offset, need);

        if self.config.trace_operations {
            tracing::trace!(
                offset,
                size,
                need,
                used = self.used,
                peak = self.peak,
                "planned allocation"
            );
        }

        Ok(offset)
    }

    /// Return a planned allocation to the free list.
    ///
    /// `offset` and `size` must match an earlier [`OffsetAllocator::alloc`]
    /// that has not been freed yet (`size` is compared after alignment).
    ///
    /// # Errors
    /// - If `size` is zero
    /// - If nothing is live at `offset` (double free or bogus offset)
    /// - If the aligned size differs from the allocated size
    pub fn free(&mut self, offset: usize, size: usize) -> PlanResult<()> {
        if size == 0 {
            return Err(PlanError::ZeroSizeAllocation);
        }
        let need = self.aligned(size)?;

        match self.live.get(&offset) {
            None => return Err(PlanError::InvalidFree { offset, size }),
            Some(&expected) if expected != need => {
                return Err(PlanError::SizeMismatch {
                    offset,
                    expected,
                    actual: need,
                })
            }
            Some(_) => {}
        }
        self.live.remove(&offset);

        let merged = self.free_list.release(Block::new(offset, need));
        self.used -= need;
        self.counters.free_count += 1;

        if self.config.trace_operations {
            tracing::trace!(
                offset,
                size,
                merged_address = merged.address,
                merged_size = merged.size,
                used = self.used,
                "planned free"
            );
        }

        Ok(())
    }

    /// Acquire the real buffer and freeze the plan.
    ///
    /// Requests exactly `peak` bytes from the runtime, once.
    ///
    /// # Errors
    /// - If the runtime cannot provide the buffer
    pub fn materialize(self) -> PlanResult<MaterializedAllocator<R>> {
        let stats = self.stats();
        let mut runtime = self.runtime;

        let buffer = runtime.alloc(self.peak)?;
        tracing::debug!(
            "Allocator materialized {} bytes (max used {}, {} live)",
            self.peak,
            stats.max_used,
            stats.live_allocations
        );

        Ok(MaterializedAllocator {
            runtime,
            buffer: Some(buffer),
            size: self.peak,
            stats,
        })
    }

    fn aligned(&self, size: usize) -> PlanResult<usize> {
        self.config
            .align(size)
            .ok_or(PlanError::AllocationTooLarge { size })
    }

    /// Log current used and peak bytes
    pub fn info(&self) {
        tracing::info!("Used memory: {}, peak memory: {}", self.used, self.peak);
    }

    pub fn alignment(&self) -> usize {
        self.config.alignment
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// High-water mark in bytes
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Bytes currently allocated
    pub fn used(&self) -> usize {
        self.used
    }

    /// Highest `used` seen so far
    pub fn max_used(&self) -> usize {
        self.counters.max_used
    }

    /// Number of live allocations
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, offset: usize) -> bool {
        self.live.contains_key(&offset)
    }

    /// Live allocations as aligned blocks, sorted by address
    pub fn live_blocks(&self) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .live
            .iter()
            .map(|(&address, &size)| Block::new(address, size))
            .collect();
        blocks.sort_by_key(|b| b.address);
        blocks
    }

    /// Free blocks, sorted by address
    pub fn free_blocks(&self) -> Vec<Block> {
        self.free_list.blocks()
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Get statistics about the plan so far
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            used: self.used,
            peak: self.peak,
            max_used: self.counters.max_used,
            live_allocations: self.live.len(),
            free_blocks: self.free_list.len(),
            free_bytes: self.free_list.total_bytes(),
            largest_free_block: self.free_list.largest().map(|b| b.size).unwrap_or(0),
            alloc_count: self.counters.alloc_count,
            free_count: self.counters.free_count,
            reuse_count: self.counters.reuse_count,
            fragmentation: self.free_list.fragmentation(),
        }
    }
}

/// Frozen allocator owning the real buffer.
///
/// Offsets handed out during planning index into [`MaterializedAllocator::buffer`].
/// The buffer goes back to the runtime exactly once, when this is dropped.
pub struct MaterializedAllocator<R: Runtime> {
    runtime: R,
    /// Always `Some` until `drop` hands it back to the runtime
    buffer: Option<R::Buffer>,
    size: usize,
    stats: AllocatorStats,
}

impl<R: Runtime> MaterializedAllocator<R> {
    /// The backing buffer. Same handle on every call.
    pub fn buffer(&self) -> &R::Buffer {
        match &self.buffer {
            Some(buffer) => buffer,
            None => unreachable!("buffer is only taken in drop"),
        }
    }

    pub fn buffer_mut(&mut self) -> &mut R::Buffer {
        match &mut self.buffer {
            Some(buffer) => buffer,
            None => unreachable!("buffer is only taken in drop"),
        }
    }

    /// Size of the backing buffer in bytes (the final peak)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn peak(&self) -> usize {
        self.size
    }

    /// Statistics frozen at materialization
    pub fn stats(&self) -> &AllocatorStats {
        &self.stats
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}

impl<R: Runtime> fmt::Debug for MaterializedAllocator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializedAllocator")
            .field("size", &self.size)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<R: Runtime> Drop for MaterializedAllocator<R> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.runtime.dealloc(buffer);
            tracing::debug!("Allocator released {} bytes", self.size);
        }
    }
}

/// Statistics about a memory plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocatorStats {
    /// Bytes currently allocated
    pub used: usize,
    /// High-water mark (final buffer size)
    pub peak: usize,
    /// Highest `used` observed
    pub max_used: usize,
    /// Number of live allocations
    pub live_allocations: usize,
    /// Number of free blocks below the peak
    pub free_blocks: usize,
    /// Total bytes in free blocks
    pub free_bytes: usize,
    /// Size of the largest free block
    pub largest_free_block: usize,
    /// Number of alloc() calls
    pub alloc_count: usize,
    /// Number of free() calls
    pub free_count: usize,
    /// Allocations served from the free list
    pub reuse_count: usize,
    /// 1 - largest_free_block / free_bytes
    pub fragmentation: f32,
}

impl AllocatorStats {
    /// Percentage of allocations served by reuse
    pub fn reuse_rate_percent(&self) -> f64 {
        if self.alloc_count == 0 {
            return 0.0;
        }
        self.reuse_count as f64 / self.alloc_count as f64 * 100.0
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AllocatorStats: used={}B, peak={}B ({}KB), max_used={}B, live={}, free={} blocks ({}B), reused={}/{} ({}%)",
            self.used,
            self.peak,
            self.peak / 1024,
            self.max_used,
            self.live_allocations,
            self.free_blocks,
            self.free_bytes,
            self.reuse_count,
            self.alloc_count,
            self.reuse_rate_percent() as u32
        )
    }
}
