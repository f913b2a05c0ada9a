//! Configuration for the pass pipeline.
//!
//! This module provides [`PipelineConfig`], which controls iteration limits, pass
//! selection and parallelism of the [`PassScheduler`](crate::compiler::PassScheduler).

/// Configuration for the pass pipeline.
///
/// # Default Configuration
///
/// | Setting | Default Value |
/// |---------|---------------|
/// | `max_iterations` | 4 |
/// | `parallel` | true |
/// | `verify` | true |
/// | `eliminate_dead_blocks` | true |
///
/// # Example
///
/// ```rust
/// use tailfold::compiler::PipelineConfig;
///
/// let config = PipelineConfig::new()
///     .with_max_iterations(1)
///     .with_parallel(false);
/// assert!(config.verify);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum pipeline repetitions per function before giving up on a fixpoint.
    pub max_iterations: usize,

    /// Process the functions of a module in parallel.
    pub parallel: bool,

    /// Verify a function after every pass that changed it.
    pub verify: bool,

    /// Run the dead block eliminator after the accumulator rewrite.
    pub eliminate_dead_blocks: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            parallel: true,
            verify: true,
            eliminate_dead_blocks: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    ///
    /// # Arguments
    ///
    /// * `max` - The maximum number of pipeline repetitions per function.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enables or disables parallel processing of functions.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enables or disables verification after changing passes.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Enables or disables the dead block eliminator.
    #[must_use]
    pub fn with_dead_block_elimination(mut self, enabled: bool) -> Self {
        self.eliminate_dead_blocks = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_iterations, 4);
        assert!(config.parallel);
        assert!(config.verify);
        assert!(config.eliminate_dead_blocks);
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new()
            .with_max_iterations(9)
            .with_parallel(false)
            .with_verify(false)
            .with_dead_block_elimination(false);
        assert_eq!(config.max_iterations, 9);
        assert!(!config.parallel);
        assert!(!config.verify);
        assert!(!config.eliminate_dead_blocks);
    }
}
