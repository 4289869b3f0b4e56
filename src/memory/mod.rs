//! Offset planning for a single future buffer
//!
//! Tensor storage is planned as byte offsets before any memory exists, so
//! the real allocation can be sized to the plan's actual peak instead of a
//! worst-case bound.
//!
//! # Pattern
//!
//! This follows the llama.cpp ggml_gallocr pattern:
//! 1. Walk the graph, allocating and freeing offsets as tensors live and die
//! 2. Reuse freed ranges best-fit, splitting and coalescing free blocks
//! 3. Allocate one buffer of the high-water mark
//! 4. Bind every tensor to its slice of that buffer

pub mod allocator;
pub mod block;
pub mod free_list;

pub use allocator::{AllocatorStats, MaterializedAllocator, OffsetAllocator};
pub use block::Block;
pub use free_list::FreeList;
