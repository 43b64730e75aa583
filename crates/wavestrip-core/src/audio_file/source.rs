//! Frame sources the decimator reads from
//!
//! Every reader thread opens its own [`FrameSource`] through an
//! [`AssetOpener`], so sources never need to be shared between threads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::{AudioFileError, AudioFileReader, PcmBuffer};
use crate::asset::ProcessingFormat;
use crate::types::StereoBuffer;

/// A seekable source of stereo frames
pub trait FrameSource: Send {
    /// Total number of frames
    fn frame_count(&self) -> u64;

    /// Native sample rate and channel count
    fn format(&self) -> ProcessingFormat;

    /// Move to a frame position (clamped to `frame_count`)
    fn seek(&mut self, frame: u64) -> Result<(), AudioFileError>;

    /// Read up to `count` frames into `buffer`, returning how many were read
    ///
    /// Sets `buffer`'s frame length to the returned count. Returns fewer
    /// frames than requested only at the end of the source or when `buffer`
    /// is smaller than `count`.
    fn read_frames(&mut self, buffer: &mut PcmBuffer, count: usize) -> Result<usize, AudioFileError>;
}

/// Opens independent read handles for an asset path
pub trait AssetOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, AudioFileError>;
}

// ────────────────────────────────────────────────────────────────────────────
// WAV / RF64 files
// ────────────────────────────────────────────────────────────────────────────

impl FrameSource for AudioFileReader {
    fn frame_count(&self) -> u64 {
        AudioFileReader::frame_count(self)
    }

    fn format(&self) -> ProcessingFormat {
        let format = AudioFileReader::format(self);
        ProcessingFormat::new(format.sample_rate, format.channels)
    }

    fn seek(&mut self, frame: u64) -> Result<(), AudioFileError> {
        AudioFileReader::seek(self, frame)
    }

    fn read_frames(&mut self, buffer: &mut PcmBuffer, count: usize) -> Result<usize, AudioFileError> {
        AudioFileReader::read_frames(self, buffer, count)
    }
}

/// Opens WAV and RF64 files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct WavOpener;

impl AssetOpener for WavOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, AudioFileError> {
        Ok(Box::new(AudioFileReader::open(path)?))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory audio
// ────────────────────────────────────────────────────────────────────────────

/// Serves already decoded audio registered under a path
///
/// Useful for hosts that decode compressed formats themselves, and for tests.
#[derive(Debug, Default)]
pub struct MemoryOpener {
    assets: RwLock<HashMap<PathBuf, (Arc<StereoBuffer>, u32)>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) decoded audio under `path`
    pub fn insert(&self, path: impl Into<PathBuf>, buffer: StereoBuffer, sample_rate: u32) {
        let mut assets = match self.assets.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        assets.insert(path.into(), (Arc::new(buffer), sample_rate));
    }
}

impl AssetOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, AudioFileError> {
        let assets = match self.assets.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (buffer, sample_rate) = assets
            .get(path)
            .cloned()
            .ok_or_else(|| AudioFileError::NotFound(path.display().to_string()))?;
        Ok(Box::new(MemorySource {
            buffer,
            sample_rate,
            position: 0,
        }))
    }
}

struct MemorySource {
    buffer: Arc<StereoBuffer>,
    sample_rate: u32,
    position: usize,
}

impl FrameSource for MemorySource {
    fn frame_count(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn format(&self) -> ProcessingFormat {
        ProcessingFormat::new(self.sample_rate, 2)
    }

    fn seek(&mut self, frame: u64) -> Result<(), AudioFileError> {
        self.position = (frame.min(self.buffer.len() as u64)) as usize;
        Ok(())
    }

    fn read_frames(&mut self, buffer: &mut PcmBuffer, count: usize) -> Result<usize, AudioFileError> {
        let count = count.min(buffer.capacity());
        let (left, right) = buffer.channels_mut();
        let read = self
            .buffer
            .copy_to_channels(self.position, &mut left[..count], &mut right[..count]);
        buffer.set_frame_length(read);
        self.position += read;
        Ok(read)
    }
}
