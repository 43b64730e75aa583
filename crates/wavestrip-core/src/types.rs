//! Common types for wavestrip
//!
//! Fundamental sample, buffer and geometry types shared by the file readers,
//! the decimator and the rendering side.

/// Processing sample rate assumed when a caller does not supply one
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Channel count of the processing format (mono sources are read as degenerate stereo)
pub const PROCESSING_CHANNELS: u16 = 2;

/// Frames per reader block in multi-reader mode (2^19)
///
/// Should be an integer multiple of the usual downsample factors; both are
/// ideally powers of two.
pub const DEFAULT_BLOCK_SIZE: usize = 524_288;

/// Concurrent file readers used for whole-file overviews
pub const DEFAULT_NUM_READERS: usize = 2;

/// Downsample factor of the slider (whole-track) overview
pub const DS_FACTOR_SLIDER: usize = 4096;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// One stereo frame
///
/// `#[repr(C)]` gives the layout [left, right], so interleaved `&[f32]` can be
/// viewed as `&[StereoFrame]` through bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoFrame {
    pub left: Sample,
    pub right: Sample,
}

impl StereoFrame {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }
}

/// Fully decoded stereo audio held in memory, stored per channel
///
/// Served to the decimator through
/// [`MemoryOpener`](crate::audio_file::MemoryOpener).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    left: Vec<Sample>,
    right: Vec<Sample>,
}

impl StereoBuffer {
    /// Deinterleave [L, R, L, R, ...]
    ///
    /// Panics if the slice has an odd length.
    pub fn from_interleaved(interleaved: &[Sample]) -> Self {
        let frames: &[StereoFrame] = bytemuck::cast_slice(interleaved);
        Self::from_frames(frames)
    }

    pub fn from_frames(frames: &[StereoFrame]) -> Self {
        Self {
            left: frames.iter().map(|f| f.left).collect(),
            right: frames.iter().map(|f| f.right).collect(),
        }
    }

    /// Build from separate channels of equal length
    pub fn from_channels(left: &[Sample], right: &[Sample]) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        Self {
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }

    /// Degenerate stereo: the mono channel on both sides
    pub fn from_mono(mono: &[Sample]) -> Self {
        Self {
            left: mono.to_vec(),
            right: mono.to_vec(),
        }
    }

    /// Number of stereo frames
    #[inline]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    #[inline]
    pub fn left(&self) -> &[Sample] {
        &self.left
    }

    #[inline]
    pub fn right(&self) -> &[Sample] {
        &self.right
    }

    pub fn frame(&self, index: usize) -> Option<StereoFrame> {
        Some(StereoFrame::new(*self.left.get(index)?, *self.right.get(index)?))
    }

    /// Copy frames starting at `start` into separate channel buffers
    ///
    /// Copies `min(left.len(), right.len(), len - start)` frames and returns
    /// how many were copied.
    pub fn copy_to_channels(&self, start: usize, left: &mut [Sample], right: &mut [Sample]) -> usize {
        let available = self.len().saturating_sub(start);
        let count = available.min(left.len()).min(right.len());
        if count == 0 {
            return 0;
        }
        left[..count].copy_from_slice(&self.left[start..start + count]);
        right[..count].copy_from_slice(&self.right[start..start + count]);
        count
    }

    /// Largest magnitude in either channel
    pub fn peak(&self) -> Sample {
        crate::dsp::max_magnitude(&self.left).max(crate::dsp::max_magnitude(&self.right))
    }
}

/// One vertex of a waveform outline
///
/// `x` is the output frame index, `y` the (unscaled) amplitude. `#[repr(C)]`
/// and `Pod` so a point sequence can be uploaded to a vertex buffer as-is.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
