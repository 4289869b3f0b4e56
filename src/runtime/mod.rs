//! Runtime collaborators that own real memory.
//!
//! The planner never touches memory while it computes offsets. Once the plan
//! is final it asks a [`Runtime`] for one buffer of exactly `peak` bytes, and
//! hands that buffer back when the materialized allocator is dropped.

pub mod dummy;
pub mod host;

pub use dummy::{DummyBuffer, DummyRuntime, DummyRuntimeStats};
pub use host::{HostBuffer, HostRuntime, HostRuntimeStats};

use crate::error::PlanResult;

/// Source of the single real buffer backing a plan.
pub trait Runtime {
    type Buffer;

    /// Acquire `bytes` bytes. Called at most once per allocator.
    fn alloc(&mut self, bytes: usize) -> PlanResult<Self::Buffer>;

    /// Release a buffer previously returned by [`Runtime::alloc`].
    fn dealloc(&mut self, buffer: Self::Buffer);
}

/// Lets callers lend a runtime and inspect it after the allocator is gone.
impl<R: Runtime + ?Sized> Runtime for &mut R {
    type Buffer = R::Buffer;

    fn alloc(&mut self, bytes: usize) -> PlanResult<Self::Buffer> {
        (**self).alloc(bytes)
    }

    fn dealloc(&mut self, buffer: Self::Buffer) {
        (**self).dealloc(buffer)
    }
}
