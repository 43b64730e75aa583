//! Sample requests and parameter resolution

use crate::error::{DecimateError, DecimateResult};

/// The view a request renders for
///
/// Carried from the request to the finished [`SampleBuffer`](crate::SampleBuffer)
/// so one completion handler can serve several views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// Whole-track overview
    #[default]
    Slider,
    /// Zoomed, scrollable strip
    Scroller,
}

/// A request for decimated samples
///
/// Initial renders cover the whole asset from frame 0 and may leave either
/// `num_out_frames` (set to 0) or `ds_factor` (set to `None`) for the
/// decimator to derive from the asset length. Segment requests must specify
/// both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    pub initial_render: bool,
    pub start_frame: i64,
    pub num_out_frames: usize,
    pub ds_factor: Option<usize>,
    pub target: RenderTarget,
}

impl SampleRequest {
    /// Whole-asset overview that is `width` samples wide
    pub fn overview(width: usize, target: RenderTarget) -> Self {
        Self {
            initial_render: true,
            start_frame: 0,
            num_out_frames: width,
            ds_factor: None,
            target,
        }
    }

    /// Whole-asset overview at a fixed downsample factor
    pub fn overview_at(ds_factor: usize, target: RenderTarget) -> Self {
        Self {
            initial_render: true,
            start_frame: 0,
            num_out_frames: 0,
            ds_factor: Some(ds_factor),
            target,
        }
    }

    /// `num_out_frames` samples starting at `start_frame`
    pub fn segment(start_frame: i64, num_out_frames: usize, ds_factor: usize, target: RenderTarget) -> Self {
        Self {
            initial_render: false,
            start_frame,
            num_out_frames,
            ds_factor: Some(ds_factor),
            target,
        }
    }

    fn invalid(&self, reason: &'static str) -> DecimateError {
        DecimateError::InvalidRequest {
            num_out_frames: self.num_out_frames,
            ds_factor: self.ds_factor,
            reason,
        }
    }

    /// Fill in derived parameters against an asset of `asset_len` frames
    pub fn resolve(&self, asset_len: u64) -> DecimateResult<ResolvedRequest> {
        if !self.initial_render {
            return match self.ds_factor {
                Some(ds) if ds > 0 && self.num_out_frames > 0 => Ok(ResolvedRequest {
                    start_frame: self.start_frame.max(0) as u64,
                    num_out_frames: self.num_out_frames,
                    ds_factor: ds,
                }),
                _ => Err(self.invalid("segment requests need a positive ds_factor and num_out_frames")),
            };
        }

        let (num_out_frames, ds_factor) = match (self.ds_factor, self.num_out_frames) {
            (None, n) if n > 0 => {
                let ds = (asset_len / n as u64) as usize;
                if ds == 0 {
                    return Err(self.invalid("asset has fewer frames than requested outputs"));
                }
                (n, ds)
            }
            (Some(ds), 0) if ds > 0 => {
                let n = (asset_len / ds as u64) as usize;
                if n == 0 {
                    return Err(self.invalid("asset is shorter than one window"));
                }
                (n, ds)
            }
            (None, _) => return Err(self.invalid("neither ds_factor nor num_out_frames given")),
            (Some(0), _) => return Err(self.invalid("ds_factor must be positive")),
            (Some(_), _) => return Err(self.invalid("give either ds_factor or num_out_frames, not both")),
        };

        Ok(ResolvedRequest {
            start_frame: 0,
            num_out_frames,
            ds_factor,
        })
    }
}

/// Request parameters after resolution; all values are usable as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub start_frame: u64,
    pub num_out_frames: usize,
    pub ds_factor: usize,
}

impl ResolvedRequest {
    /// Input frames covered by the request
    pub fn input_frames(&self) -> usize {
        self.num_out_frames.saturating_mul(self.ds_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DS_FACTOR_SLIDER;

    const LEN: u64 = 1_048_576;

    #[test]
    fn test_derive_ds_factor_from_width() {
        let resolved = SampleRequest::overview(256, RenderTarget::Slider).resolve(LEN).unwrap();
        assert_eq!(resolved.ds_factor, 4096);
        assert_eq!(resolved.num_out_frames, 256);
        assert_eq!(resolved.start_frame, 0);
    }

    #[test]
    fn test_derive_width_from_ds_factor() {
        let resolved = SampleRequest::overview_at(DS_FACTOR_SLIDER, RenderTarget::Slider)
            .resolve(LEN)
            .unwrap();
        assert_eq!(resolved.num_out_frames, 256);
        assert_eq!(resolved.ds_factor, 4096);
    }

    #[test]
    fn test_derivation_floors() {
        let resolved = SampleRequest::overview(3, RenderTarget::Slider).resolve(10).unwrap();
        assert_eq!(resolved.ds_factor, 3);
        let resolved = SampleRequest::overview_at(4, RenderTarget::Slider).resolve(10).unwrap();
        assert_eq!(resolved.num_out_frames, 2);
    }

    #[test]
    fn test_invalid_combinations() {
        let both = SampleRequest {
            ds_factor: Some(64),
            ..SampleRequest::overview(100, RenderTarget::Slider)
        };
        let neither = SampleRequest::overview(0, RenderTarget::Slider);
        let zero_ds = SampleRequest::overview_at(0, RenderTarget::Slider);
        let too_wide = SampleRequest::overview(100, RenderTarget::Slider);
        let too_coarse = SampleRequest::overview_at(1000, RenderTarget::Slider);

        for (request, len) in [(both, LEN), (neither, LEN), (zero_ds, LEN), (too_wide, 50), (too_coarse, 999)] {
            assert!(
                matches!(request.resolve(len), Err(DecimateError::InvalidRequest { .. })),
                "{:?}",
                request
            );
        }
    }

    #[test]
    fn test_segment_requests() {
        let resolved = SampleRequest::segment(-500, 128, 64, RenderTarget::Scroller)
            .resolve(LEN)
            .unwrap();
        assert_eq!(resolved.start_frame, 0);
        assert_eq!(resolved.input_frames(), 128 * 64);

        let no_ds = SampleRequest {
            ds_factor: None,
            ..SampleRequest::segment(0, 128, 64, RenderTarget::Scroller)
        };
        assert!(no_ds.resolve(LEN).is_err());
        assert!(SampleRequest::segment(0, 0, 64, RenderTarget::Scroller).resolve(LEN).is_err());
    }
}
