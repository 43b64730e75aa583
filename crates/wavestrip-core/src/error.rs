//! Decimation error types

use thiserror::Error;

use crate::audio_file::AudioFileError;

/// Errors delivered to callers of the decimator
#[derive(Error, Debug, Clone)]
pub enum DecimateError {
    /// A request arrived before any asset was successfully set
    #[error("No audio asset has been set")]
    NoAsset,

    /// Invalid num_out_frames / ds_factor combination
    #[error("Invalid request (num_out_frames={num_out_frames}, ds_factor={ds_factor:?}): {reason}")]
    InvalidRequest {
        num_out_frames: usize,
        ds_factor: Option<usize>,
        reason: &'static str,
    },

    /// Opening, reading or parsing the asset failed
    #[error("Audio file error: {0}")]
    AudioFile(#[from] AudioFileError),

    /// A sample or frame buffer could not be allocated
    #[error("Failed to allocate buffer for {frames} frames")]
    Allocation { frames: usize },

    /// The asset changed while the request was queued or running
    #[error("Request superseded (generation {requested}, current {current})")]
    Superseded { requested: u64, current: u64 },

    /// The reduction thread pool could not be built
    #[error("Failed to build reduction pool: {0}")]
    Pool(String),

    /// A named worker thread could not be spawned
    #[error("Failed to spawn {name} thread: {reason}")]
    Spawn { name: String, reason: String },

    /// The decimator's request thread is gone
    #[error("Decimator request thread disconnected")]
    Disconnected,
}

/// Result type for decimation operations
pub type DecimateResult<T> = Result<T, DecimateError>;
