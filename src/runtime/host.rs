//! Host-memory runtime.

use crate::error::{PlanError, PlanResult};
use crate::runtime::Runtime;

/// Storage word; fixes the buffer's base alignment at 8 bytes
type Word = u64;

const WORD_SIZE: usize = std::mem::size_of::<Word>();

/// Zero-initialized host buffer whose base address is 8-byte aligned.
#[derive(Debug)]
pub struct HostBuffer {
    words: Vec<Word>,
    len: usize,
}

impl HostBuffer {
    fn zeroed(len: usize) -> PlanResult<Self> {
        let word_count = len.div_ceil(WORD_SIZE);
        let mut words = Vec::new();
        words.try_reserve_exact(word_count).map_err(|e| {
            PlanError::RuntimeAllocationFailed(format!("{} bytes: {}", len, e))
        })?;
        words.resize(word_count, 0);
        Ok(Self { words, len })
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    pub fn as_slice(&self) -> &[u8] {
        &bytemuck::cast_slice::<Word, u8>(&self.words)[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Word, u8>(&mut self.words)[..self.len]
    }

    /// Borrow `[offset, offset + len)`
    pub fn slice(&self, offset: usize, len: usize) -> PlanResult<&[u8]> {
        let end = self.checked_end(offset, len)?;
        Ok(&self.as_slice()[offset..end])
    }

    /// Mutably borrow `[offset, offset + len)`
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> PlanResult<&mut [u8]> {
        let end = self.checked_end(offset, len)?;
        Ok(&mut self.as_mut_slice()[offset..end])
    }

    fn checked_end(&self, offset: usize, len: usize) -> PlanResult<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(end),
            _ => Err(PlanError::OutOfBounds {
                offset,
                len,
                size: self.len,
            }),
        }
    }
}

/// Counters for [`HostRuntime`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostRuntimeStats {
    pub alloc_count: usize,
    pub dealloc_count: usize,
    /// Bytes held by buffers not yet returned
    pub bytes_in_use: usize,
}

/// Runtime backed by the process heap
#[derive(Debug, Default)]
pub struct HostRuntime {
    limit: Option<usize>,
    stats: HostRuntimeStats,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse any request that would push `bytes_in_use` past `limit`
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn stats(&self) -> &HostRuntimeStats {
        &self.stats
    }
}

impl Runtime for HostRuntime {
    type Buffer = HostBuffer;

    fn alloc(&mut self, bytes: usize) -> PlanResult<HostBuffer> {
        if let Some(limit) = self.limit {
            if self.stats.bytes_in_use.saturating_add(bytes) > limit {
                return Err(PlanError::RuntimeAllocationFailed(format!(
                    "requested {} bytes with {} of {} already in use",
                    bytes, self.stats.bytes_in_use, limit
                )));
            }
        }

        let buffer = HostBuffer::zeroed(bytes)?;
        self.stats.alloc_count += 1;
        self.stats.bytes_in_use += bytes;

        tracing::debug!("HostRuntime allocated {} bytes at {:p}", bytes, buffer.as_ptr());
        Ok(buffer)
    }

    fn dealloc(&mut self, buffer: HostBuffer) {
        self.stats.dealloc_count += 1;
        if buffer.len() > self.stats.bytes_in_use {
            tracing::warn!(
                "HostRuntime released {} bytes but only {} are in use; buffer came from another runtime",
                buffer.len(),
                self.stats.bytes_in_use
            );
            self.stats.bytes_in_use = 0;
            return;
        }
        self.stats.bytes_in_use -= buffer.len();
        tracing::debug!("HostRuntime released {} bytes", buffer.len());
    }
}
