//! memplan - offset-based memory planning for tensor graphs
//!
//! Allocation requests are answered with byte offsets into a buffer that does
//! not exist yet. Freed ranges are recycled best-fit and merged with their
//! neighbours. Once planning is done, exactly one buffer of the peak size is
//! requested from a [`Runtime`].
//!
//! ```rust
//! use memplan::{HostRuntime, OffsetAllocator};
//!
//! let mut planner = OffsetAllocator::new(HostRuntime::new());
//! let a = planner.alloc(100)?;
//! let b = planner.alloc(50)?;
//! planner.free(a, 100)?;
//! let c = planner.alloc(30)?; // lands inside a's old range
//! assert_eq!(c, a);
//!
//! let mut plan = planner.materialize()?;
//! plan.buffer_mut().slice_mut(b, 50)?.fill(7);
//! # Ok::<(), memplan::PlanError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod memory;
pub mod runtime;

pub use config::PlannerConfig;
pub use error::{ErrorCategory, PlanError, PlanResult};
pub use graph::{DType, Graph, GraphPlan, GraphPlanner, Node, TensorDesc, TensorId, TensorKind};
pub use logging::{init_logging_default, init_with_config, LogFormat, LogLevel, LoggingConfig};
pub use memory::{AllocatorStats, Block, FreeList, MaterializedAllocator, OffsetAllocator};
pub use runtime::{DummyBuffer, DummyRuntime, HostBuffer, HostRuntime, Runtime};
