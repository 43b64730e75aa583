//! Decimator configuration
//!
//! Session-wide decimation settings, loadable from YAML:
//!
//! ```yaml
//! strategy: maxValue        # maxValue | minMaxValue | avgValue | sampleValue
//! multi_reader: true
//! num_readers: 2
//! block_size_frames: 524288
//! use_vectorized_ops: true
//! reduction_threads: 0      # 0 = one per core
//! normalise_output: false
//! ```
//!
//! ```ignore
//! use wavestrip_core::config::{load_config, default_decimator_config_path, DecimatorConfig};
//!
//! let config: DecimatorConfig = load_config(&default_decimator_config_path());
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config, try_load_config};
pub use paths::{default_config_dir, default_config_path, default_decimator_config_path};

use serde::{Deserialize, Serialize};

use crate::decimator::ReductionStrategy;
use crate::types::{DEFAULT_BLOCK_SIZE, DEFAULT_NUM_READERS};

/// Settings shared by every request a decimator serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimatorConfig {
    /// How a window of input frames collapses into one output value
    pub strategy: ReductionStrategy,

    /// Split initial (whole-file) renders across concurrent readers
    /// Default: true
    pub multi_reader: bool,

    /// Number of concurrent readers in multi-reader mode
    /// Default: 2
    pub num_readers: usize,

    /// Frames per reader block, ideally a power of two
    /// Default: 524288 (2^19)
    pub block_size_frames: usize,

    /// Use the lane-chunked reduction kernels instead of the scalar loops
    /// Default: true
    pub use_vectorized_ops: bool,

    /// Threads in the reduction pool (0 = rayon's default, one per core)
    pub reduction_threads: usize,

    /// Scale finished buffers by 1/peak before building points
    /// Default: false
    pub normalise_output: bool,
}

impl Default for DecimatorConfig {
    fn default() -> Self {
        Self {
            strategy: ReductionStrategy::default(),
            multi_reader: true,
            num_readers: DEFAULT_NUM_READERS,
            block_size_frames: DEFAULT_BLOCK_SIZE,
            use_vectorized_ops: true,
            reduction_threads: 0,
            normalise_output: false,
        }
    }
}

impl DecimatorConfig {
    /// Replace values that would stall the pipeline with usable ones
    ///
    /// Zero readers or a zero block size are configuration mistakes; they are
    /// logged and replaced rather than rejected.
    pub fn sanitized(mut self) -> Self {
        if self.num_readers == 0 {
            log::warn!("DecimatorConfig: num_readers = 0, using 1");
            self.num_readers = 1;
        }
        if self.block_size_frames == 0 {
            log::warn!(
                "DecimatorConfig: block_size_frames = 0, using {}",
                DEFAULT_BLOCK_SIZE
            );
            self.block_size_frames = DEFAULT_BLOCK_SIZE;
        }
        self
    }
}
