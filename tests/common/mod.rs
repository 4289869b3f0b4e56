//! Common test utilities for planner tests
//!
//! - A once-per-binary logging fixture
//! - Random alloc/free programs for property tests
//! - Layout checks shared by the allocator and graph suites
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{apply_program, assert_layout_valid, program_strategy};
//! ```

#![allow(dead_code)]

pub mod fixtures;

use memplan::{Block, OffsetAllocator, PlanResult, Runtime};
use once_cell::sync::Lazy;
use proptest::prelude::*;
pub use serial_test::serial;

/// Installs the env-configured subscriber once per test binary.
///
/// Run with `MEMPLAN_LOG_LEVEL=trace` to see planner events.
pub static LOGGING: Lazy<()> = Lazy::new(memplan::init_logging_default);

pub fn init_logging() {
    Lazy::force(&LOGGING);
}

/// One step of a random alloc/free program
#[derive(Debug, Clone, Copy)]
pub enum Op {
    /// Allocate this many bytes
    Alloc(usize),
    /// Free the live allocation at this index (modulo the live count)
    Free(usize),
}

pub fn op_strategy(max_size: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1..=max_size).prop_map(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Free),
    ]
}

pub fn program_strategy(max_ops: usize, max_size: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(max_size), 0..max_ops)
}

/// A live allocation as the caller sees it: offset and requested size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Live {
    pub offset: usize,
    pub size: usize,
}

/// Run one op. `Free` with nothing live turns into a no-op.
pub fn apply_op<R: Runtime>(
    alloc: &mut OffsetAllocator<R>,
    live: &mut Vec<Live>,
    op: Op,
) -> PlanResult<()> {
    match op {
        Op::Alloc(size) => {
            let offset = alloc.alloc(size)?;
            live.push(Live { offset, size });
        }
        Op::Free(pick) => {
            if !live.is_empty() {
                let victim = live.swap_remove(pick % live.len());
                alloc.free(victim.offset, victim.size)?;
            }
        }
    }
    Ok(())
}

/// Run a whole program, checking the layout after every step
pub fn apply_program<R: Runtime>(
    alloc: &mut OffsetAllocator<R>,
    program: &[Op],
) -> PlanResult<Vec<Live>> {
    let mut live = Vec::new();
    for &op in program {
        apply_op(alloc, &mut live, op)?;
        assert_layout_valid(alloc);
    }
    Ok(live)
}

/// Panic unless `blocks` (sorted by address) are pairwise disjoint
pub fn assert_disjoint(blocks: &[Block]) {
    for pair in blocks.windows(2) {
        assert!(
            pair[0].end() <= pair[1].address,
            "blocks overlap: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// Structural checks on an allocator at rest.
///
/// Live and free blocks together tile `[0, peak)` exactly, the free list is
/// fully coalesced, and every live offset is aligned.
pub fn assert_layout_valid<R: Runtime>(alloc: &OffsetAllocator<R>) {
    alloc
        .free_list()
        .check_invariants()
        .unwrap_or_else(|e| panic!("free list corrupted: {}", e));

    let live = alloc.live_blocks();
    let used: usize = live.iter().map(|b| b.size).sum();
    assert_eq!(alloc.used(), used, "used disagrees with live blocks");

    for block in &live {
        assert_eq!(block.address % alloc.alignment(), 0, "unaligned {:?}", block);
        assert_eq!(block.size % alloc.alignment(), 0, "unaligned size {:?}", block);
    }

    let mut all = live;
    all.extend(alloc.free_blocks());
    all.sort_by_key(|b| b.address);
    assert_disjoint(&all);

    let covered: usize = all.iter().map(|b| b.size).sum();
    assert_eq!(covered, alloc.peak(), "live + free must cover [0, peak)");
    if let Some(last) = all.last() {
        assert_eq!(last.end(), alloc.peak());
    }
}
