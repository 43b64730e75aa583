//! Read/reduce execution
//!
//! Two ways to turn a resolved request into a finished [`SampleBuffer`]:
//!
//! - [`decimate_sync`]: one read of `num_out_frames * ds_factor` frames from
//!   the decimator's own handle, one in-place reduction.
//! - [`decimate_multi`]: the asset is partitioned across scoped reader
//!   threads, each with its own handle. Readers hand raw blocks to the
//!   coordinator over a bounded channel; the coordinator spawns one reduction
//!   task per block on the rayon pool, writing into that block's disjoint
//!   slot of the output.
//!
//! Both finish the same way: peak, optional normalisation, points. Nothing is
//! finished until every reader and reduction task has joined.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use crossbeam::channel::{bounded, Sender};

use super::partition::{self, BlockDescriptor};
use super::request::{RenderTarget, ResolvedRequest};
use crate::audio_file::{AssetOpener, FrameSource, PcmBuffer};
use crate::config::DecimatorConfig;
use crate::error::{DecimateError, DecimateResult};
use crate::sample_buffer::{BlockSlot, SampleBuffer};

/// Compares a job's generation against the decimator's current one
#[derive(Debug, Clone, Copy)]
pub(crate) struct GenerationCheck<'a> {
    current: &'a AtomicU64,
    expected: u64,
}

impl<'a> GenerationCheck<'a> {
    pub fn new(current: &'a AtomicU64, expected: u64) -> Self {
        Self { current, expected }
    }

    #[inline]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.expected
    }

    pub fn ensure_current(&self) -> DecimateResult<()> {
        let current = self.current.load(Ordering::SeqCst);
        if current == self.expected {
            Ok(())
        } else {
            Err(DecimateError::Superseded {
                requested: self.expected,
                current,
            })
        }
    }
}

/// Everything a render needs besides the data source
pub(crate) struct RenderJob<'a> {
    pub resolved: ResolvedRequest,
    pub target: RenderTarget,
    pub config: &'a DecimatorConfig,
    pub check: GenerationCheck<'a>,
}

impl RenderJob<'_> {
    fn allocate_output(&self) -> DecimateResult<SampleBuffer> {
        let frames = self.resolved.num_out_frames;
        let mut buffer = SampleBuffer::new(frames).ok_or(DecimateError::Allocation { frames })?;
        buffer.tag(self.check.expected, self.target);
        Ok(buffer)
    }
}

/// Peak, optional normalisation and points, once all writers are done
fn finish(buffer: &mut SampleBuffer, config: &DecimatorConfig) {
    buffer.compute_peak(config.use_vectorized_ops);
    if config.normalise_output {
        buffer.normalise();
    }
    buffer.build_points();
}

// ────────────────────────────────────────────────────────────────────────────
// Synchronous single reader
// ────────────────────────────────────────────────────────────────────────────

/// Read and reduce the request's frame range in one pass
pub(crate) fn decimate_sync(source: &mut dyn FrameSource, job: &RenderJob) -> DecimateResult<SampleBuffer> {
    let started = Instant::now();
    let ResolvedRequest {
        start_frame,
        num_out_frames,
        ds_factor,
    } = job.resolved;
    let frames = job.resolved.input_frames();

    let mut buffer = job.allocate_output()?;
    let mut pcm = PcmBuffer::with_capacity(frames).ok_or(DecimateError::Allocation { frames })?;

    job.check.ensure_current()?;
    source.seek(start_frame)?;
    let read = source.read_frames(&mut pcm, frames)?;
    if read < frames {
        log::debug!(
            "decimate_sync: short read at frame {} ({} of {} frames)",
            start_frame,
            read,
            frames
        );
    }
    job.check.ensure_current()?;

    let out = job
        .config
        .strategy
        .decimate(&mut pcm, ds_factor, job.config.use_vectorized_ops)
        .min(num_out_frames);
    {
        let (src_left, src_right) = pcm.channels();
        let (left, right) = buffer.channels_mut();
        left[..out].copy_from_slice(&src_left[..out]);
        right[..out].copy_from_slice(&src_right[..out]);
    }
    buffer.set_length(out);
    finish(&mut buffer, job.config);

    log::debug!(
        "decimate_sync: {} frames -> {} samples (ds {}) in {:?}",
        read,
        out,
        ds_factor,
        started.elapsed()
    );
    Ok(buffer)
}

// ────────────────────────────────────────────────────────────────────────────
// Asynchronous multi-reader
// ────────────────────────────────────────────────────────────────────────────

fn record_failure(failure: &Mutex<Option<DecimateError>>, abort: &AtomicBool, err: DecimateError) {
    abort.store(true, Ordering::SeqCst);
    let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(err);
    }
}

/// Body of one reader thread: read this reader's blocks in order
fn read_partition(
    opener: &dyn AssetOpener,
    path: &Path,
    descriptor: BlockDescriptor,
    tx: Sender<(usize, PcmBuffer)>,
    abort: &AtomicBool,
    check: &GenerationCheck,
) -> DecimateResult<()> {
    let block_frames = descriptor.block_size_frames;
    let mut source = opener.open(path)?;
    source.seek(descriptor.start_frame())?;

    for block_id in descriptor.start_block..descriptor.start_block + descriptor.num_blocks {
        if abort.load(Ordering::SeqCst) || !check.is_current() {
            break;
        }
        let mut pcm = PcmBuffer::with_capacity(block_frames).ok_or(DecimateError::Allocation { frames: block_frames })?;
        if source.read_frames(&mut pcm, block_frames)? == 0 {
            log::warn!("read_partition: unexpected end of asset at block {}", block_id);
            break;
        }
        if tx.send((block_id, pcm)).is_err() {
            break;
        }
    }
    Ok(())
}

/// Decimate the whole asset with concurrent readers and pooled reductions
pub(crate) fn decimate_multi(
    opener: &dyn AssetOpener,
    path: &Path,
    asset_len: u64,
    job: &RenderJob,
    pool: &rayon::ThreadPool,
) -> DecimateResult<SampleBuffer> {
    let started = Instant::now();
    let config = job.config;
    let ds_factor = job.resolved.ds_factor;
    let total_frames = asset_len.min(job.resolved.input_frames() as u64);
    let plan = partition::plan(total_frames, ds_factor, config.block_size_frames, config.num_readers);

    let mut buffer = job.allocate_output()?;
    let abort = AtomicBool::new(false);
    let failure: Mutex<Option<DecimateError>> = Mutex::new(None);
    let check = job.check;
    let strategy = config.strategy;
    let vectorized = config.use_vectorized_ops;

    {
        let mut slots: Vec<Option<BlockSlot>> = buffer
            .block_slots(plan.nominal_outputs_per_block, plan.total_blocks)
            .into_iter()
            .map(Some)
            .collect();
        let (tx, rx) = bounded::<(usize, PcmBuffer)>(plan.readers.len().max(1) * 2);

        thread::scope(|scope| {
            for (reader_idx, descriptor) in plan.readers.iter().copied().enumerate() {
                let tx = tx.clone();
                let (abort, failure, check) = (&abort, &failure, &check);
                let name = format!("decimator-reader-{}", reader_idx);

                let spawned = thread::Builder::new().name(name.clone()).spawn_scoped(scope, move || {
                    if let Err(e) = read_partition(opener, path, descriptor, tx, abort, check) {
                        log::error!("decimator-reader-{}: {}", reader_idx, e);
                        record_failure(failure, abort, e);
                    }
                });
                if let Err(e) = spawned {
                    record_failure(
                        failure,
                        abort,
                        DecimateError::Spawn {
                            name,
                            reason: e.to_string(),
                        },
                    );
                }
            }
            drop(tx);

            pool.in_place_scope(|reductions| {
                for (block_id, mut pcm) in rx.iter() {
                    let Some(mut slot) = slots.get_mut(block_id).and_then(Option::take) else {
                        log::warn!("decimate_multi: block {} has no output slot", block_id);
                        continue;
                    };
                    let (abort, check) = (&abort, &check);
                    reductions.spawn(move |_| {
                        if abort.load(Ordering::SeqCst) || !check.is_current() {
                            return;
                        }
                        strategy.decimate(&mut pcm, ds_factor, vectorized);
                        let (left, right) = pcm.channels();
                        slot.write(left, right);
                    });
                }
            });
        });
    }

    if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(err);
    }
    check.ensure_current()?;

    finish(&mut buffer, config);
    log::debug!(
        "decimate_multi: {} frames -> {} samples (ds {}, {} blocks, {} readers) in {:?}",
        total_frames,
        buffer.len(),
        ds_factor,
        plan.total_blocks,
        plan.readers.len(),
        started.elapsed()
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::MemoryOpener;
    use crate::decimator::ReductionStrategy;
    use crate::types::StereoBuffer;

    fn test_signal(len: usize) -> StereoBuffer {
        let left: Vec<f32> = (0..len).map(|i| ((i as f32) * 0.013).sin() * 0.8).collect();
        let right: Vec<f32> = (0..len).map(|i| ((i as f32) * 0.007).cos() * 0.5).collect();
        StereoBuffer::from_channels(&left, &right)
    }

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap()
    }

    #[test]
    fn test_multi_reader_matches_single_reader() {
        let opener = MemoryOpener::new();
        let len = 100_003;
        opener.insert("/mem/track", test_signal(len), 44100);
        let path = Path::new("/mem/track");
        let generation = AtomicU64::new(1);
        let pool = pool();
        let resolved = ResolvedRequest {
            start_frame: 0,
            num_out_frames: len / 64,
            ds_factor: 64,
        };

        for strategy in [
            ReductionStrategy::MaxValue,
            ReductionStrategy::MinMaxValue,
            ReductionStrategy::AvgValue,
            ReductionStrategy::SampleValue,
        ] {
            let single_config = DecimatorConfig {
                strategy,
                multi_reader: false,
                ..Default::default()
            };
            let single_job = RenderJob {
                resolved,
                target: RenderTarget::Slider,
                config: &single_config,
                check: GenerationCheck::new(&generation, 1),
            };
            let mut source = opener.open(path).unwrap();
            let expected = decimate_sync(source.as_mut(), &single_job).unwrap();
            assert_eq!(expected.len(), len / 64);

            for readers in 1..=3 {
                let config = DecimatorConfig {
                    strategy,
                    num_readers: readers,
                    block_size_frames: 1000,
                    ..Default::default()
                };
                let job = RenderJob {
                    resolved,
                    target: RenderTarget::Slider,
                    config: &config,
                    check: GenerationCheck::new(&generation, 1),
                };
                let multi = decimate_multi(&opener, path, len as u64, &job, &pool).unwrap();
                assert_eq!(multi.len(), expected.len(), "{:?} readers={}", strategy, readers);
                assert_eq!(multi.left(), expected.left(), "{:?} readers={}", strategy, readers);
                assert_eq!(multi.right(), expected.right(), "{:?} readers={}", strategy, readers);
                assert_eq!(multi.peak(), expected.peak());
                assert_eq!(multi.points(), expected.points());
            }
        }
    }

    #[test]
    fn test_stale_generation_is_superseded() {
        let opener = MemoryOpener::new();
        opener.insert("/mem/track", test_signal(10_000), 44100);
        let generation = AtomicU64::new(2);
        let config = DecimatorConfig::default();
        let job = RenderJob {
            resolved: ResolvedRequest {
                start_frame: 0,
                num_out_frames: 100,
                ds_factor: 100,
            },
            target: RenderTarget::Slider,
            config: &config,
            check: GenerationCheck::new(&generation, 1),
        };

        let result = decimate_multi(&opener, Path::new("/mem/track"), 10_000, &job, &pool());
        assert!(matches!(
            result,
            Err(DecimateError::Superseded { requested: 1, current: 2 })
        ));

        let mut source = opener.open(Path::new("/mem/track")).unwrap();
        assert!(matches!(
            decimate_sync(source.as_mut(), &job),
            Err(DecimateError::Superseded { .. })
        ));
    }

    #[test]
    fn test_reader_error_fails_the_request() {
        let opener = MemoryOpener::new();
        let generation = AtomicU64::new(1);
        let config = DecimatorConfig::default();
        let job = RenderJob {
            resolved: ResolvedRequest {
                start_frame: 0,
                num_out_frames: 10,
                ds_factor: 10,
            },
            target: RenderTarget::Slider,
            config: &config,
            check: GenerationCheck::new(&generation, 1),
        };

        let result = decimate_multi(&opener, Path::new("/mem/missing"), 100, &job, &pool());
        assert!(matches!(result, Err(DecimateError::AudioFile(_))));
    }

    #[test]
    fn test_short_read_shrinks_length() {
        let opener = MemoryOpener::new();
        opener.insert("/mem/track", test_signal(1000), 44100);
        let generation = AtomicU64::new(1);
        let config = DecimatorConfig::default();
        let job = RenderJob {
            resolved: ResolvedRequest {
                start_frame: 900,
                num_out_frames: 10,
                ds_factor: 20,
            },
            target: RenderTarget::Scroller,
            config: &config,
            check: GenerationCheck::new(&generation, 1),
        };

        let mut source = opener.open(Path::new("/mem/track")).unwrap();
        let buffer = decimate_sync(source.as_mut(), &job).unwrap();
        assert_eq!(buffer.capacity(), 10);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.points().len(), 10);
        assert_eq!(buffer.target(), RenderTarget::Scroller);
        assert_eq!(buffer.generation(), 1);
    }
}
