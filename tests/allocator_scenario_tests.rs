//! Scenario and edge case tests for the offset allocator

mod common;

use anyhow::Context;
use common::assert_layout_valid;
use memplan::{
    Block, DummyRuntime, ErrorCategory, HostRuntime, OffsetAllocator, PlanError, PlannerConfig,
};

// ============================================================================
// Basic scenarios
// ============================================================================

#[test]
fn test_request_rounded_to_alignment() -> anyhow::Result<()> {
    common::init_logging();
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());

    assert_eq!(alloc.alloc(10)?, 0);
    assert_eq!(alloc.peak(), 16);
    Ok(())
}

#[test]
fn test_exact_reuse_keeps_peak() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());

    assert_eq!(alloc.alloc(16)?, 0);
    alloc.free(0, 16)?;
    assert_eq!(alloc.alloc(8)?, 0);
    assert_eq!(alloc.peak(), 16);
    assert_layout_valid(&alloc);
    Ok(())
}

#[test]
fn test_neighbours_merge_into_one_block() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());

    assert_eq!(alloc.alloc(8)?, 0);
    assert_eq!(alloc.alloc(8)?, 8);
    alloc.free(0, 8)?;
    alloc.free(8, 8)?;

    assert_eq!(alloc.free_blocks(), vec![Block::new(0, 16)]);
    assert_eq!(alloc.stats().free_blocks, 1);
    Ok(())
}

#[test]
fn test_split_remainder_reinserted() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());

    assert_eq!(alloc.alloc(8)?, 0);
    assert_eq!(alloc.alloc(16)?, 8);
    alloc.free(8, 16)?;
    assert_eq!(alloc.alloc(8)?, 8);

    assert_eq!(alloc.free_blocks(), vec![Block::new(16, 8)]);
    assert_eq!(alloc.peak(), 24);
    assert_layout_valid(&alloc);
    Ok(())
}

#[test]
fn test_materialized_buffer_is_stable() -> anyhow::Result<()> {
    let mut runtime = DummyRuntime::new();
    {
        let mut alloc = OffsetAllocator::new(&mut runtime);
        alloc.alloc(40)?;
        alloc.alloc(8)?;
        let peak = alloc.peak();

        let materialized = alloc.materialize().context("materialize failed")?;
        let first = materialized.buffer().clone();
        let second = materialized.buffer().clone();
        assert_eq!(first, second);
        assert_eq!(first.size, peak);
        assert_eq!(materialized.runtime().stats().alloc_count, 1);
    }
    assert_eq!(runtime.stats().alloc_count, 1);
    assert_eq!(runtime.stats().dealloc_count, 1);
    Ok(())
}

// ============================================================================
// Coalescing
// ============================================================================

#[test]
fn test_middle_free_merges_both_sides() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());
    let a = alloc.alloc(8)?;
    let b = alloc.alloc(8)?;
    let c = alloc.alloc(8)?;
    let _guard = alloc.alloc(8)?;

    alloc.free(a, 8)?;
    alloc.free(c, 8)?;
    assert_eq!(alloc.free_blocks().len(), 2);

    alloc.free(b, 8)?;
    assert_eq!(alloc.free_blocks(), vec![Block::new(0, 24)]);
    assert_layout_valid(&alloc);
    Ok(())
}

#[test]
fn test_merged_block_serves_larger_request() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());
    let offsets: Vec<usize> = (0..4).map(|_| alloc.alloc(16)).collect::<Result<Vec<_>, _>>()?;
    for &offset in &offsets {
        alloc.free(offset, 16)?;
    }

    assert_eq!(alloc.alloc(64)?, 0);
    assert_eq!(alloc.peak(), 64);
    assert_eq!(alloc.stats().reuse_count, 1);
    Ok(())
}

#[test]
fn test_free_block_touching_peak_is_plain_candidate() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());
    alloc.alloc(16)?; // [0, 16)
    let tail = alloc.alloc(16)?; // [16, 32)
    alloc.free(tail, 16)?;

    // Does not fit the 16-byte tail block: peak grows by the full request
    let big = alloc.alloc(40)?;
    assert_eq!(big, 32);
    assert_eq!(alloc.peak(), 72);
    assert_eq!(alloc.free_blocks(), vec![Block::new(16, 16)]);
    assert_layout_valid(&alloc);
    Ok(())
}

// ============================================================================
// Contract violations
// ============================================================================

#[test]
fn test_contract_violations_are_internal_errors() -> anyhow::Result<()> {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());
    let a = alloc.alloc(32)?;

    let bogus = alloc.free(a + 8, 8).unwrap_err();
    assert_eq!(bogus.category(), ErrorCategory::Internal);

    let mismatch = alloc.free(a, 64).unwrap_err();
    assert!(matches!(mismatch, PlanError::SizeMismatch { expected: 32, actual: 64, .. }));

    alloc.free(a, 32)?;
    let double = alloc.free(a, 32).unwrap_err();
    assert!(matches!(double, PlanError::InvalidFree { .. }));
    assert!(double.to_string().contains("no live allocation"));

    // Rejected frees leave the plan untouched
    assert_eq!(alloc.used(), 0);
    assert_eq!(alloc.free_blocks(), vec![Block::new(0, 32)]);
    Ok(())
}

#[test]
fn test_zero_size_is_user_error() {
    let mut alloc = OffsetAllocator::new(DummyRuntime::new());
    let err = alloc.alloc(0).unwrap_err();
    assert!(err.is_user_error());
    assert_eq!(alloc.stats().alloc_count, 0);
}

#[test]
fn test_runtime_failure_surfaces_from_materialize() {
    let mut alloc = OffsetAllocator::new(HostRuntime::new().with_limit(1024));
    alloc.alloc(2048).unwrap();

    let err = alloc.materialize().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Runtime);
}

// ============================================================================
// Host buffer binding
// ============================================================================

#[test]
fn test_offsets_index_host_buffer() -> anyhow::Result<()> {
    let config = PlannerConfig::new().with_alignment(16);
    let mut alloc = OffsetAllocator::with_config(HostRuntime::new(), config)?;

    let a = alloc.alloc(20)?;
    let b = alloc.alloc(20)?;
    alloc.free(a, 20)?;
    let c = alloc.alloc(10)?;
    assert_eq!(c, a);

    let mut materialized = alloc.materialize()?;
    assert_eq!(materialized.size(), 64);
    assert_eq!(materialized.buffer().as_ptr() as usize % 8, 0);

    materialized.buffer_mut().slice_mut(b, 20)?.fill(0xEE);
    materialized.buffer_mut().slice_mut(c, 10)?.fill(0x11);
    assert!(materialized.buffer().slice(b, 20)?.iter().all(|&x| x == 0xEE));
    assert!(materialized.buffer().slice(c, 10)?.iter().all(|&x| x == 0x11));

    let oob = materialized.buffer().slice(60, 8).unwrap_err();
    assert!(matches!(oob, PlanError::OutOfBounds { size: 64, .. }));
    Ok(())
}
