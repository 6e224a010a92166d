//! Runtime configuration settings

use serde::{Deserialize, Serialize};

/// Default number of frame-progress reports per batch
pub const DEFAULT_PROGRESS_STEPS: u64 = 100;

/// Runtime settings shared by the analysis and encoding pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Upper bound on files encoded concurrently
    pub max_parallelism: usize,
    /// Frame-progress reports per batch; granularity is total frames / steps
    pub progress_steps: u64,
}

impl PipelineSettings {
    /// Worker count actually used, never below one
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallelism.max(1)
    }

    /// Frames to accumulate between progress reports
    ///
    /// Short inputs where the division rounds to zero report on every block.
    pub fn progress_granularity(&self, total_frames: u64) -> u64 {
        (total_frames / self.progress_steps.max(1)).max(1)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get().max(1),
            progress_steps: DEFAULT_PROGRESS_STEPS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parallelism_positive() {
        assert!(PipelineSettings::default().effective_parallelism() >= 1);
    }

    #[test]
    fn test_zero_parallelism_clamped() {
        let settings = PipelineSettings {
            max_parallelism: 0,
            ..Default::default()
        };
        assert_eq!(settings.effective_parallelism(), 1);
    }

    #[test]
    fn test_granularity_never_zero() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.progress_granularity(44_100), 441);
        assert_eq!(settings.progress_granularity(50), 1);
        assert_eq!(settings.progress_granularity(0), 1);
    }
}
