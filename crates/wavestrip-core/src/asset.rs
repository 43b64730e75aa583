//! The audio asset a decimator reads from

use std::path::{Path, PathBuf};

use crate::types::{DEFAULT_SAMPLE_RATE, PROCESSING_CHANNELS};

/// Sample rate and channel layout of an asset or of the processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl ProcessingFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }
}

impl Default for ProcessingFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: PROCESSING_CHANNELS,
        }
    }
}

/// A file reference plus the format the caller wants to process it in
///
/// `length` is the frame count reported by the opened source, filled in once
/// the decimator has successfully opened the asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub format: ProcessingFormat,
    pub length: u64,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, format: ProcessingFormat, length: u64) -> Self {
        Self {
            path: path.into(),
            format,
            length,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duration in seconds at the processing sample rate
    pub fn duration_seconds(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.length as f64 / self.format.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_stereo_44k() {
        let format = ProcessingFormat::default();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 2);
    }

    #[test]
    fn test_duration() {
        let asset = Asset::new("/tmp/a.wav", ProcessingFormat::new(48000, 2), 96000);
        assert_eq!(asset.duration_seconds(), 2.0);
        let broken = Asset::new("/tmp/a.wav", ProcessingFormat::new(0, 2), 96000);
        assert_eq!(broken.duration_seconds(), 0.0);
    }
}
