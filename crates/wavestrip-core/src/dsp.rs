//! Vectorised numeric primitives for decimation
//!
//! Each kernel walks its input in fixed-width lanes with independent
//! accumulators so the compiler can keep them in SIMD registers, then folds
//! the lanes and the remainder. Results match the sequential loops exactly
//! for max/min and within float tolerance for sums.

use crate::types::Sample;

/// Accumulator width; 8 x f32 fills one AVX register
const LANES: usize = 8;

#[inline(always)]
fn fold_lanes(x: &[Sample], init: Sample, map: impl Fn(Sample) -> Sample, op: impl Fn(Sample, Sample) -> Sample) -> Sample {
    let mut acc = [init; LANES];
    let chunks = x.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        for lane in 0..LANES {
            acc[lane] = op(acc[lane], map(chunk[lane]));
        }
    }

    let folded = acc.iter().copied().fold(init, &op);
    remainder.iter().fold(folded, |a, &v| op(a, map(v)))
}

/// Maximum signed value (`-inf` for an empty slice)
#[inline]
pub fn max(x: &[Sample]) -> Sample {
    fold_lanes(x, Sample::NEG_INFINITY, |v| v, Sample::max)
}

/// Minimum signed value (`+inf` for an empty slice)
#[inline]
pub fn min(x: &[Sample]) -> Sample {
    fold_lanes(x, Sample::INFINITY, |v| v, Sample::min)
}

/// Maximum absolute value (0 for an empty slice)
#[inline]
pub fn max_magnitude(x: &[Sample]) -> Sample {
    fold_lanes(x, 0.0, Sample::abs, Sample::max)
}

/// Mean absolute value (0 for an empty slice)
#[inline]
pub fn mean_magnitude(x: &[Sample]) -> Sample {
    if x.is_empty() {
        return 0.0;
    }
    fold_lanes(x, 0.0, Sample::abs, |a, b| a + b) / x.len() as Sample
}

/// `x[i] *= factor`
#[inline]
pub fn scale(x: &mut [Sample], factor: Sample) {
    let mut chunks = x.chunks_exact_mut(LANES);
    for chunk in &mut chunks {
        for v in chunk.iter_mut() {
            *v *= factor;
        }
    }
    for v in chunks.into_remainder() {
        *v *= factor;
    }
}

/// `acc[i] = (acc[i] + other[i]) * factor` over the common length
#[inline]
pub fn add_and_scale(acc: &mut [Sample], other: &[Sample], factor: Sample) {
    let n = acc.len().min(other.len());
    let (acc, other) = (&mut acc[..n], &other[..n]);

    let mut acc_chunks = acc.chunks_exact_mut(LANES);
    let mut other_chunks = other.chunks_exact(LANES);
    for (a, b) in (&mut acc_chunks).zip(&mut other_chunks) {
        for lane in 0..LANES {
            a[lane] = (a[lane] + b[lane]) * factor;
        }
    }
    for (a, &b) in acc_chunks.into_remainder().iter_mut().zip(other_chunks.remainder()) {
        *a = (*a + b) * factor;
    }
}

/// `dst[i] = -src[i]` over the common length
#[inline]
pub fn negate(src: &[Sample], dst: &mut [Sample]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = -s;
    }
}

/// `out[i] = start + i * step`
#[inline]
pub fn ramp(start: Sample, step: Sample, out: &mut [Sample]) {
    for (i, v) in out.iter_mut().enumerate() {
        *v = start + i as Sample * step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize) -> Vec<Sample> {
        // Deterministic pseudo-random values in [-1, 1)
        let mut state = 0x1234_5678u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as Sample / (1u32 << 23) as Sample - 1.0
            })
            .collect()
    }

    #[test]
    fn test_extrema_match_sequential() {
        for len in [1, 7, 8, 9, 63, 1000] {
            let x = noise(len);
            let seq_max = x.iter().copied().fold(Sample::NEG_INFINITY, Sample::max);
            let seq_min = x.iter().copied().fold(Sample::INFINITY, Sample::min);
            let seq_mag = x.iter().map(|v| v.abs()).fold(0.0, Sample::max);
            assert_eq!(max(&x), seq_max, "len {}", len);
            assert_eq!(min(&x), seq_min, "len {}", len);
            assert_eq!(max_magnitude(&x), seq_mag, "len {}", len);
        }
    }

    #[test]
    fn test_mean_magnitude() {
        assert_eq!(mean_magnitude(&[]), 0.0);
        assert_eq!(mean_magnitude(&[-1.0, 1.0, -0.5, 0.5]), 0.75);

        let x = noise(4097);
        let seq = x.iter().map(|v| v.abs()).sum::<Sample>() / x.len() as Sample;
        assert!((mean_magnitude(&x) - seq).abs() < 1e-5);
    }

    #[test]
    fn test_scale_and_merge() {
        let mut a: Vec<Sample> = (0..11).map(|i| i as Sample).collect();
        let b: Vec<Sample> = (0..11).map(|i| -(i as Sample) * 3.0).collect();
        add_and_scale(&mut a, &b, 0.5);
        for (i, v) in a.iter().enumerate() {
            assert_eq!(*v, -(i as Sample));
        }

        scale(&mut a, -2.0);
        assert_eq!(a[10], 20.0);

        let mut mirrored = vec![0.0; 11];
        negate(&a, &mut mirrored);
        assert_eq!(mirrored[10], -20.0);
    }

    #[test]
    fn test_ramp() {
        let mut out = [0.0; 5];
        ramp(2.0, 0.5, &mut out);
        assert_eq!(out, [2.0, 2.5, 3.0, 3.5, 4.0]);
    }
}
