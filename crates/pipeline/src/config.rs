//! Process-level configuration.
//!
//! There is no pipeline-graph configuration format: pipelines are built in
//! code via `Pipeline::new`/`map`/`reduce`/`merge`. What this module
//! configures is the *process* running them: log verbosity and whether the
//! visualizer is enabled.

use crate::error::PipelineError;

/// Runtime-wide knobs that aren't part of any one stage's declaration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bounded capacity used for a stage's input queue when none is given
    /// explicitly.
    pub default_queue_capacity: usize,
    /// Enables the alternate-screen visualizer.
    pub with_visualizer: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_queue_capacity: crate::queue::DEFAULT_QUEUE_CAPACITY,
            with_visualizer: false,
        }
    }
}

impl RuntimeConfig {
    /// Validates the config, falling back to defaults (and logging a
    /// warning) for any field that doesn't make sense, rather than
    /// failing silently.
    pub fn validated(mut self) -> Result<Self, PipelineError> {
        if self.default_queue_capacity == 0 {
            tracing::warn!("default_queue_capacity of 0 is invalid, falling back to default");
            self.default_queue_capacity = crate::queue::DEFAULT_QUEUE_CAPACITY;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let cfg = RuntimeConfig {
            default_queue_capacity: 0,
            with_visualizer: false,
        }
        .validated()
        .unwrap();
        assert_eq!(cfg.default_queue_capacity, crate::queue::DEFAULT_QUEUE_CAPACITY);
    }
}
