use std::path::PathBuf;

use crate::error::PipelineError;
use crate::layout::ForceAtlas2Settings;

pub const DEFAULT_ITERATIONS: u64 = 1000;
pub const DEFAULT_BATCH_SIZE: u64 = 100;
pub const DEFAULT_PREVIEW_SIZE: u32 = 512;
pub const DEFAULT_FINAL_SIZE: u32 = 8192;
pub const DEFAULT_RESOLUTION: f64 = 0.05;

/// Parameters of one run. Built once at start-up and never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Edge list, or a checkpoint written by an earlier run.
    pub input: PathBuf,
    /// Iterations to add in this invocation.
    pub iterations: u64,
    pub batch_size: u64,
    pub preview_size: u32,
    pub final_size: u32,
    pub seed: u64,
    pub detect_communities: bool,
    pub resolution: f64,
    pub layout: ForceAtlas2Settings,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            iterations: DEFAULT_ITERATIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            preview_size: DEFAULT_PREVIEW_SIZE,
            final_size: DEFAULT_FINAL_SIZE,
            seed: 0,
            detect_communities: true,
            resolution: DEFAULT_RESOLUTION,
            layout: ForceAtlas2Settings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        // Checkpoints find their edge list again as `<root>.csv`.
        if !self.input.to_string_lossy().ends_with(".csv") {
            return Err(PipelineError::Config(format!(
                "input must be a `.csv` edge list or checkpoint, got {}",
                self.input.display()
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch size must be at least 1".into()));
        }
        if self.preview_size == 0 || self.final_size == 0 {
            return Err(PipelineError::Config(
                "snapshot sizes must be at least 1 pixel".into(),
            ));
        }
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(PipelineError::Config(format!(
                "community resolution must be positive, got {}",
                self.resolution
            )));
        }
        let layout = &self.layout;
        if !layout.gravity.is_finite() || layout.gravity < 0.0 {
            return Err(PipelineError::Config(format!(
                "gravity must be non-negative, got {}",
                layout.gravity
            )));
        }
        if !layout.scaling_ratio.is_finite() || layout.scaling_ratio <= 0.0 {
            return Err(PipelineError::Config(format!(
                "scaling ratio must be positive, got {}",
                layout.scaling_ratio
            )));
        }
        if !layout.slow_down.is_finite() || layout.slow_down <= 0.0 {
            return Err(PipelineError::Config(format!(
                "slow down must be positive, got {}",
                layout.slow_down
            )));
        }
        Ok(())
    }
}
