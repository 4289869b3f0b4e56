//! Dummy runtime for unit testing.
//!
//! Hands out fake buffer handles instead of memory, the same trick
//! llama.cpp's test-alloc dummy backend uses: a plan can be materialized and
//! dropped while the test only checks how the runtime was called.

use crate::error::PlanResult;
use crate::runtime::Runtime;

/// Fake base address; handles are `FAKE_BASE + base`
const FAKE_BASE: usize = 16;

/// Fake buffer handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyBuffer {
    /// Fake offset in the runtime's address space
    pub base: usize,
    /// Size in bytes
    pub size: usize,
}

impl DummyBuffer {
    pub fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// Fake memory pointer for identity checks
    pub fn as_fake_ptr(&self) -> usize {
        FAKE_BASE + self.base
    }
}

/// Call counters for [`DummyRuntime`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DummyRuntimeStats {
    /// Number of alloc() calls
    pub alloc_count: usize,
    /// Number of dealloc() calls
    pub dealloc_count: usize,
    /// Sum of all requested sizes
    pub total_requested_bytes: usize,
    /// Size of the most recent request
    pub last_request: Option<usize>,
}

/// Runtime that allocates nothing
#[derive(Debug, Default)]
pub struct DummyRuntime {
    next_base: usize,
    stats: DummyRuntimeStats,
}

impl DummyRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &DummyRuntimeStats {
        &self.stats
    }

    /// Buffers handed out and not yet returned
    pub fn outstanding(&self) -> usize {
        self.stats.alloc_count - self.stats.dealloc_count
    }
}

impl Runtime for DummyRuntime {
    type Buffer = DummyBuffer;

    fn alloc(&mut self, bytes: usize) -> PlanResult<DummyBuffer> {
        let buffer = DummyBuffer::new(self.next_base, bytes);
        // Keep successive handles distinct even for zero-byte requests
        self.next_base += bytes.max(1);

        self.stats.alloc_count += 1;
        self.stats.total_requested_bytes += bytes;
        self.stats.last_request = Some(bytes);
        Ok(buffer)
    }

    fn dealloc(&mut self, _buffer: DummyBuffer) {
        self.stats.dealloc_count += 1;
    }
}
