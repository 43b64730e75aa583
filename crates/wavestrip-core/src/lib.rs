//! Wavestrip Core - Parallel waveform decimation for track overviews

pub mod asset;
pub mod audio_file;
pub mod config;
pub mod decimator;
pub mod dsp;
pub mod error;
pub mod sample_buffer;
pub mod types;

pub use asset::{Asset, ProcessingFormat};
pub use decimator::{Decimator, RenderTarget, ReductionStrategy, SampleRequest};
pub use error::{DecimateError, DecimateResult};
pub use sample_buffer::SampleBuffer;
pub use types::*;
