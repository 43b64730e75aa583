//! Decimated sample storage
//!
//! A [`SampleBuffer`] holds up to `capacity` decimated frames in two channels
//! plus the presentation state derived from them: the signal peak and the
//! closed outline of points a renderer draws.
//!
//! While a multi-reader render runs, reduction tasks write disjoint blocks of
//! the channels concurrently through [`BlockSlot`]s and account for their
//! output with an atomic add on the shared length. Peak and points are only
//! computed after every writer has joined.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::decimator::RenderTarget;
use crate::dsp;
use crate::types::{Point, Sample};

/// Decimated two-channel samples ready for display
#[derive(Debug)]
pub struct SampleBuffer {
    left: Vec<Sample>,
    right: Vec<Sample>,
    /// Frames written so far (never above capacity)
    length: AtomicUsize,
    peak: Sample,
    points: Vec<Point>,
    generation: u64,
    target: RenderTarget,
}

impl SampleBuffer {
    /// Allocate storage for `capacity` frames
    ///
    /// Returns `None` for a zero capacity or when the allocation fails.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let mut left = Vec::new();
        let mut right = Vec::new();
        left.try_reserve_exact(capacity).ok()?;
        right.try_reserve_exact(capacity).ok()?;
        left.resize(capacity, 0.0);
        right.resize(capacity, 0.0);

        Some(Self {
            left,
            right,
            length: AtomicUsize::new(0),
            peak: 1.0,
            points: Vec::new(),
            generation: 0,
            target: RenderTarget::default(),
        })
    }

    pub(crate) fn tag(&mut self, generation: u64, target: RenderTarget) {
        self.generation = generation;
        self.target = target;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    /// Frames written so far
    #[inline]
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically add `frames` to the written length, clamped to capacity
    ///
    /// Returns the new length. Safe to call from concurrent writers.
    pub fn increment_length(&self, frames: usize) -> usize {
        add_clamped(&self.length, frames, self.capacity())
    }

    /// Set the written length (clamped to capacity)
    pub fn set_length(&self, frames: usize) {
        self.length.store(frames.min(self.capacity()), Ordering::Release);
    }

    /// Upper channel (left, or merged after post-processing)
    #[inline]
    pub fn left(&self) -> &[Sample] {
        &self.left[..self.len()]
    }

    /// Lower channel (right, or mirrored after post-processing)
    #[inline]
    pub fn right(&self) -> &[Sample] {
        &self.right[..self.len()]
    }

    /// Maximum absolute value of the written data (1.0 when silent)
    #[inline]
    pub fn peak(&self) -> Sample {
        self.peak
    }

    /// Closed outline: upper envelope left to right, then lower envelope back
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Generation of the decimator that produced this buffer
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn target(&self) -> RenderTarget {
        self.target
    }

    /// Both channels over the full capacity, for single-writer fills
    pub(crate) fn channels_mut(&mut self) -> (&mut [Sample], &mut [Sample]) {
        (&mut self.left, &mut self.right)
    }

    /// Split the channels into `blocks` disjoint write slots of `frames_per_block`
    ///
    /// Slot `b` covers frames `[b * frames_per_block, (b + 1) * frames_per_block)`
    /// truncated to capacity; slots past the end are empty.
    pub(crate) fn block_slots(&mut self, frames_per_block: usize, blocks: usize) -> Vec<BlockSlot<'_>> {
        let capacity = self.capacity();
        let chunk = frames_per_block.max(1);
        let mut lefts = self.left.chunks_mut(chunk);
        let mut rights = self.right.chunks_mut(chunk);
        let length = &self.length;

        (0..blocks)
            .map(|_| BlockSlot {
                left: lefts.next().unwrap_or_default(),
                right: rights.next().unwrap_or_default(),
                length,
                capacity,
            })
            .collect()
    }

    /// Compute and store the peak over `[0, len)` of both channels
    pub(crate) fn compute_peak(&mut self, vectorized: bool) -> Sample {
        let (left, right) = (self.left(), self.right());
        let peak = if vectorized {
            dsp::max_magnitude(left).max(dsp::max_magnitude(right))
        } else {
            left.iter().chain(right).fold(0.0, |m: Sample, v| m.max(v.abs()))
        };
        self.peak = if peak > 0.0 { peak } else { 1.0 };
        self.peak
    }

    /// Scale both channels by `1 / peak` so the written data lies in `[-1, 1]`
    ///
    /// `peak` keeps its value so views can recover the absolute scale.
    pub fn normalise(&mut self) {
        if self.peak <= 0.0 || self.peak == 1.0 {
            return;
        }
        let len = self.len();
        let factor = 1.0 / self.peak;
        dsp::scale(&mut self.left[..len], factor);
        dsp::scale(&mut self.right[..len], factor);
    }

    /// Build the outline from the final channel data
    pub(crate) fn build_points(&mut self) {
        let len = self.len();
        let mut xs = vec![0.0; len];
        dsp::ramp(0.0, 1.0, &mut xs);

        let mut points = vec![Point::default(); 2 * len];
        for (i, &x) in xs.iter().enumerate() {
            points[i] = Point::new(x, self.left[i]);
            points[2 * len - 1 - i] = Point::new(x, self.right[i]);
        }
        self.points = points;
    }
}

fn add_clamped(length: &AtomicUsize, frames: usize, capacity: usize) -> usize {
    let previous = length
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            Some(current.saturating_add(frames).min(capacity))
        })
        .unwrap_or_else(|current| current);
    previous.saturating_add(frames).min(capacity)
}

/// Exclusive write access to one block of a [`SampleBuffer`]
#[derive(Debug)]
pub(crate) struct BlockSlot<'a> {
    left: &'a mut [Sample],
    right: &'a mut [Sample],
    length: &'a AtomicUsize,
    capacity: usize,
}

impl BlockSlot<'_> {
    /// Copy reduced frames into the slot and account for them in the length
    ///
    /// Frames beyond the slot's size are dropped. Returns the frames written.
    pub fn write(&mut self, left: &[Sample], right: &[Sample]) -> usize {
        let frames = left.len().min(right.len()).min(self.left.len());
        self.left[..frames].copy_from_slice(&left[..frames]);
        self.right[..frames].copy_from_slice(&right[..frames]);
        add_clamped(self.length, frames, self.capacity);
        frames
    }
}
