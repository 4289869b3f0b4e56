//! Configuration for the memory planner
//!
//! [`PlannerConfig`] controls the rounding granularity of every request and
//! whether individual alloc/free operations are traced.

use crate::error::{PlanError, PlanResult};

/// Environment variable overriding the allocation alignment
pub const ALIGNMENT_ENV: &str = "MEMPLAN_ALIGNMENT";

/// Environment variable enabling per-operation tracing
pub const TRACE_OPS_ENV: &str = "MEMPLAN_TRACE_OPS";

/// Configuration for the offset allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Every requested size is rounded up to a multiple of this
    pub alignment: usize,

    /// Emit a trace event for every alloc/free
    pub trace_operations: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            // Widest scalar a tensor element can have
            alignment: Self::DEFAULT_ALIGNMENT,
            trace_operations: false,
        }
    }
}

impl PlannerConfig {
    /// Default alignment in bytes
    pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<u64>();

    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set alignment
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Enable or disable per-operation tracing
    pub fn with_trace_operations(mut self, trace_operations: bool) -> Self {
        self.trace_operations = trace_operations;
        self
    }

    /// Build a config from defaults plus `MEMPLAN_*` environment overrides
    pub fn from_env() -> PlanResult<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ALIGNMENT_ENV) {
            let alignment = raw.trim().parse::<usize>().map_err(|e| {
                PlanError::InvalidConfiguration(format!("{}={:?}: {}", ALIGNMENT_ENV, raw, e))
            })?;
            config = config.with_alignment(alignment);
        }

        if let Ok(raw) = std::env::var(TRACE_OPS_ENV) {
            let enabled = parse_flag(&raw).ok_or_else(|| {
                PlanError::InvalidConfiguration(format!(
                    "{}={:?}: expected true/false",
                    TRACE_OPS_ENV, raw
                ))
            })?;
            config = config.with_trace_operations(enabled);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the config can drive an allocator
    pub fn validate(&self) -> PlanResult<()> {
        if self.alignment == 0 {
            return Err(PlanError::InvalidConfiguration(
                "alignment must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Round `size` up to the next multiple of the alignment.
    ///
    /// Returns `None` when the rounded size does not fit in `usize`.
    pub fn align(&self, size: usize) -> Option<usize> {
        size.div_ceil(self.alignment).checked_mul(self.alignment)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.alignment, 8);
        assert!(!config.trace_operations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_planner_config_builder() {
        let config = PlannerConfig::new()
            .with_alignment(64)
            .with_trace_operations(true);

        assert_eq!(config.alignment, 64);
        assert!(config.trace_operations);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        let err = PlannerConfig::new().with_alignment(0).validate().unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration(_)));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_align() {
        let config = PlannerConfig::default();
        assert_eq!(config.align(1), Some(8));
        assert_eq!(config.align(8), Some(8));
        assert_eq!(config.align(10), Some(16));
        assert_eq!(config.align(17), Some(24));
        assert_eq!(config.align(usize::MAX), None);
    }

    #[test]
    fn test_align_non_power_of_two() {
        let config = PlannerConfig::new().with_alignment(12);
        assert_eq!(config.align(1), Some(12));
        assert_eq!(config.align(12), Some(12));
        assert_eq!(config.align(13), Some(24));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" ON "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
