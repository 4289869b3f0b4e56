//! Unified error handling for memplan
//!
//! Every fallible operation in the crate returns [`PlanResult`]. Errors are
//! grouped into categories so a graph compiler can tell its own bugs
//! (mismatched frees, out-of-range bindings) apart from bad input and from
//! failures of the runtime that owns real memory.

use std::fmt;

/// Unified error type for memplan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    // ========== Allocation contract ==========
    /// Zero-byte allocations and frees are rejected
    #[error("Allocation size must be greater than zero")]
    ZeroSizeAllocation,

    /// Aligned size or resulting peak does not fit in usize
    #[error("Allocation of {size} bytes overflows the address space")]
    AllocationTooLarge { size: usize },

    /// Freed offset does not name a live allocation (double free or never allocated)
    #[error("Invalid free: no live allocation at offset {offset} (size {size})")]
    InvalidFree { offset: usize, size: usize },

    /// Freed size does not match the size the block was allocated with
    #[error("Size mismatch freeing offset {offset}: allocated {expected} bytes, freed {actual} bytes")]
    SizeMismatch {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// Requested byte range lies outside the materialized buffer
    #[error("Range [{offset}, {offset}+{len}) is out of bounds for buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    // ========== Configuration / graph input ==========
    /// Invalid planner configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed tensor graph
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Tensor id not present in the graph or plan
    #[error("Unknown tensor: {0}")]
    UnknownTensor(usize),

    // ========== Runtime ==========
    /// The runtime could not provide the backing buffer
    #[error("Runtime allocation failed: {0}")]
    RuntimeAllocationFailed(String),

    // ========== Internal ==========
    /// Internal error (indicates a bug in the planner itself)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PlanError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanError::ZeroSizeAllocation
            | PlanError::AllocationTooLarge { .. }
            | PlanError::InvalidConfiguration(_)
            | PlanError::InvalidGraph(_)
            | PlanError::UnknownTensor(_) => ErrorCategory::User,

            PlanError::RuntimeAllocationFailed(_) => ErrorCategory::Runtime,

            PlanError::InvalidFree { .. }
            | PlanError::SizeMismatch { .. }
            | PlanError::OutOfBounds { .. }
            | PlanError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this is a user-facing error (bad input or configuration)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this is an internal error
    ///
    /// Internal errors are contract violations by the caller driving the
    /// allocator. They abort the planning pass.
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
///
/// - User: fix the graph or configuration
/// - Internal: a bug in the code driving the planner
/// - Runtime: the collaborator that owns real memory failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User error - invalid input or configuration
    User,
    /// Internal error - indicates a bug
    Internal,
    /// Runtime error - real buffer acquisition failed
    Runtime,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Internal => write!(f, "Internal"),
            ErrorCategory::Runtime => write!(f, "Runtime"),
        }
    }
}

/// Helper type alias for Results using PlanError
pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// Create an internal error with context
///
/// # Examples
/// ```ignore
/// return Err(internal_error!("free list indexes disagree at {}", addr));
/// ```
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::PlanError::InternalError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PlanError::InternalError(format!($fmt, $($arg)*))
    };
}

/// Create a graph validation error with context
#[macro_export]
macro_rules! graph_error {
    ($msg:expr) => {
        $crate::error::PlanError::InvalidGraph($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::PlanError::InvalidGraph(format!($fmt, $($arg)*))
    };
}
