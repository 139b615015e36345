//! Configuration types for the expression engine.

use crate::error::{EngineError, EngineResult};

/// Default number of top-level children above which sum-of-products switches
/// to divide-and-conquer.
pub const DEFAULT_THRESHOLD: usize = 500;

/// Configuration for the expression engine.
///
/// # Example
///
/// ```rust
/// use query_expr_engine::EngineConfig;
///
/// let config = EngineConfig::builder().with_threshold(64).build();
/// assert_eq!(config.threshold, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Maximum children processed by the stack machine in one piece.
    pub threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Checks that the threshold is at least 1.
    pub fn validate(&self) -> EngineResult<()> {
        if self.threshold == 0 {
            return Err(EngineError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    threshold: Option<usize>,
}

impl EngineConfigBuilder {
    /// Sets the divide-and-conquer threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Builds the EngineConfig.
    pub fn build(self) -> EngineConfig {
        EngineConfig {
            threshold: self.threshold.unwrap_or(DEFAULT_THRESHOLD),
        }
    }
}
