//! Reduction strategies
//!
//! A strategy folds each window of `ds_factor` input frames into one output
//! frame. Reduction runs in place on the [`PcmBuffer`] that holds the raw
//! block: output frame `i` overwrites input frame `i`, which is never read
//! again once window `i` has been reduced.

use serde::{Deserialize, Serialize};

use crate::audio_file::PcmBuffer;
use crate::dsp;
use crate::types::Sample;

/// How a window of input frames collapses into one output value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReductionStrategy {
    /// Largest magnitude per channel
    #[default]
    MaxValue,
    /// Signed maximum (left) and minimum (right) across both channels
    MinMaxValue,
    /// Mean magnitude per channel
    AvgValue,
    /// Magnitude of the window's first frame per channel
    SampleValue,
}

impl ReductionStrategy {
    /// Whether reduced channels are merged into a symmetric envelope
    ///
    /// `MinMaxValue` already produces an asymmetric upper/lower envelope.
    pub fn merges_channels(self) -> bool {
        !matches!(self, ReductionStrategy::MinMaxValue)
    }

    /// Reduce the buffer's windows in place and merge channels
    ///
    /// Returns the number of output frames, `frame_length / ds_factor`; a
    /// trailing partial window is dropped. The buffer's frame length is set
    /// to the output count.
    pub fn decimate(self, buffer: &mut PcmBuffer, ds_factor: usize, vectorized: bool) -> usize {
        let frames = self.reduce(buffer, ds_factor, vectorized);
        if self.merges_channels() {
            let (left, right) = buffer.channels_mut();
            merge(&mut left[..frames], &mut right[..frames], vectorized);
        }
        frames
    }

    /// Reduce without merging (see [`decimate`](Self::decimate))
    pub fn reduce(self, buffer: &mut PcmBuffer, ds_factor: usize, vectorized: bool) -> usize {
        if ds_factor == 0 {
            buffer.set_frame_length(0);
            return 0;
        }
        let frames = buffer.frame_length() / ds_factor;
        let (left, right) = buffer.channels_mut();

        match (self, vectorized) {
            (ReductionStrategy::MinMaxValue, true) => {
                reduce_min_max(left, right, frames, ds_factor, dsp::max, dsp::min)
            }
            (ReductionStrategy::MinMaxValue, false) => {
                reduce_min_max(left, right, frames, ds_factor, scalar_max, scalar_min)
            }
            (ReductionStrategy::MaxValue, true) => reduce_each(left, right, frames, ds_factor, dsp::max_magnitude),
            (ReductionStrategy::MaxValue, false) => reduce_each(left, right, frames, ds_factor, scalar_max_magnitude),
            (ReductionStrategy::AvgValue, true) => reduce_each(left, right, frames, ds_factor, dsp::mean_magnitude),
            (ReductionStrategy::AvgValue, false) => reduce_each(left, right, frames, ds_factor, scalar_mean_magnitude),
            // One element per window, nothing to vectorise
            (ReductionStrategy::SampleValue, _) => reduce_each(left, right, frames, ds_factor, |w| w[0].abs()),
        }

        buffer.set_frame_length(frames);
        frames
    }
}

/// Apply a per-channel window reduction
fn reduce_each(
    left: &mut [Sample],
    right: &mut [Sample],
    frames: usize,
    ds_factor: usize,
    window_fn: impl Fn(&[Sample]) -> Sample,
) {
    for channel in [left, right] {
        for i in 0..frames {
            let start = i * ds_factor;
            let value = window_fn(&channel[start..start + ds_factor]);
            channel[i] = value;
        }
    }
}

/// Signed extrema across both channels of each window
fn reduce_min_max(
    left: &mut [Sample],
    right: &mut [Sample],
    frames: usize,
    ds_factor: usize,
    max_fn: impl Fn(&[Sample]) -> Sample,
    min_fn: impl Fn(&[Sample]) -> Sample,
) {
    for i in 0..frames {
        let window = i * ds_factor..(i + 1) * ds_factor;
        let (l, r) = (&left[window.clone()], &right[window]);
        let hi = max_fn(l).max(max_fn(r));
        let lo = min_fn(l).min(min_fn(r));
        left[i] = hi;
        right[i] = lo;
    }
}

/// `left = (left + right) / 2`, `right = -left`
pub fn merge(left: &mut [Sample], right: &mut [Sample], vectorized: bool) {
    if vectorized {
        dsp::add_and_scale(left, right, 0.5);
        dsp::negate(left, right);
    } else {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l = (*l + *r) * 0.5;
            *r = -*l;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scalar kernels
// ────────────────────────────────────────────────────────────────────────────

fn scalar_max(w: &[Sample]) -> Sample {
    let mut m = Sample::NEG_INFINITY;
    for &v in w {
        if v > m {
            m = v;
        }
    }
    m
}

fn scalar_min(w: &[Sample]) -> Sample {
    let mut m = Sample::INFINITY;
    for &v in w {
        if v < m {
            m = v;
        }
    }
    m
}

fn scalar_max_magnitude(w: &[Sample]) -> Sample {
    let mut m: Sample = 0.0;
    for &v in w {
        if v.abs() > m {
            m = v.abs();
        }
    }
    m
}

fn scalar_mean_magnitude(w: &[Sample]) -> Sample {
    let mut sum: Sample = 0.0;
    for &v in w {
        sum += v.abs();
    }
    sum / w.len() as Sample
}
