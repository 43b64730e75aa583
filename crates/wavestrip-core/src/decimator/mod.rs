//! Waveform decimator
//!
//! Turns an audio asset into a few hundred or thousand amplitude samples for
//! the slider overview and the scroller strip.
//!
//! # Threads
//!
//! - **Request thread** (`decimator-requests`): runs queued requests one at a
//!   time, so [`Decimator::get_samples`] never blocks the caller.
//! - **Reader threads** (`decimator-reader-N`): scoped to one multi-reader
//!   render, each reading its share of the asset through its own handle.
//! - **Reduction pool** (`decimator-reduce-N`): rayon pool reducing raw blocks.
//! - **Completion context**: where callbacks run (see [`CompletionContext`]).
//!
//! # Cancellation
//!
//! Every [`Decimator::set_asset`] bumps the generation. Requests remember the
//! generation they were submitted under; queued requests are rejected, and
//! running ones stop at the next block, once it changes. Either way the
//! callback receives [`DecimateError::Superseded`], never a partial buffer.
//!
//! # Example
//!
//! ```ignore
//! let decimator = Decimator::new(DecimatorConfig::default())?;
//! decimator.set_asset("track.wav", ProcessingFormat::default())?;
//! decimator.get_samples(SampleRequest::overview(800, RenderTarget::Slider), |result| {
//!     if let Ok(buffer) = result {
//!         draw(buffer.points());
//!     }
//! });
//! ```

mod completion;
mod partition;
mod pipeline;
mod request;
mod strategy;

pub use completion::{Completion, CompletionContext, CompletionThread, InlineCompletion};
pub use request::{RenderTarget, ResolvedRequest, SampleRequest};
pub use strategy::{merge, ReductionStrategy};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{bounded, Receiver};

use crate::asset::{Asset, ProcessingFormat};
use crate::audio_file::{AssetOpener, AudioFileError, FrameSource, WavOpener};
use crate::config::DecimatorConfig;
use crate::error::{DecimateError, DecimateResult};
use crate::sample_buffer::SampleBuffer;
use pipeline::{GenerationCheck, RenderJob};

/// Callback receiving a finished request
pub type SampleCallback = Box<dyn FnOnce(DecimateResult<SampleBuffer>) + Send + 'static>;

/// A queued request
struct Job {
    request: SampleRequest,
    generation: u64,
    respond: SampleCallback,
}

/// The decimator's own read handle
///
/// Shared with the request thread so a render holds this lock, never the
/// asset slot.
type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// An opened asset, tagged with the generation it was opened for
struct LoadedAsset {
    generation: u64,
    asset: Asset,
    source: SharedSource,
}

/// State shared between the public handle and the request thread
struct Shared {
    config: DecimatorConfig,
    opener: Arc<dyn AssetOpener>,
    completion: Arc<dyn CompletionContext>,
    pool: rayon::ThreadPool,
    generation: AtomicU64,
    /// Session peak as f32 bits, updated by initial renders only
    peak: AtomicU32,
    /// Asset and read handle, installed and cleared together
    loaded: Mutex<Option<LoadedAsset>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn process(&self, job: Job) {
        let Job {
            request,
            generation,
            respond,
        } = job;

        let result = self.render(&request, generation);
        match &result {
            Ok(buffer) => log::debug!(
                "Decimator: {:?} request done, {} samples, peak {:.4}",
                request.target,
                buffer.len(),
                buffer.peak()
            ),
            Err(DecimateError::Superseded { requested, current }) => log::debug!(
                "Decimator: {:?} request superseded ({} -> {})",
                request.target,
                requested,
                current
            ),
            Err(e) => log::error!("Decimator: {:?} request failed: {}", request.target, e),
        }

        self.completion.deliver(Box::new(move || respond(result)));
    }

    fn render(&self, request: &SampleRequest, generation: u64) -> DecimateResult<SampleBuffer> {
        let check = GenerationCheck::new(&self.generation, generation);
        check.ensure_current()?;

        let (asset, source) = match &*lock(&self.loaded) {
            Some(loaded) if loaded.generation == generation => (loaded.asset.clone(), Arc::clone(&loaded.source)),
            _ => return Err(DecimateError::NoAsset),
        };
        let resolved = request.resolve(asset.length)?;
        let job = RenderJob {
            resolved,
            target: request.target,
            config: &self.config,
            check,
        };

        let buffer = if request.initial_render && self.config.multi_reader {
            pipeline::decimate_multi(self.opener.as_ref(), asset.path(), asset.length, &job, &self.pool)?
        } else {
            let mut handle = lock(&source);
            pipeline::decimate_sync(handle.as_mut(), &job)?
        };

        if request.initial_render {
            self.peak.store(buffer.peak().to_bits(), Ordering::SeqCst);
        }
        Ok(buffer)
    }
}

/// Handle to a decimator and its request thread
///
/// Dropping the handle supersedes queued requests and lets the request
/// thread exit once the queue is drained.
pub struct Decimator {
    shared: Arc<Shared>,
    tx: Sender<Job>,
    /// Thread handle; the thread exits once `tx` is dropped
    _handle: JoinHandle<()>,
}

impl Decimator {
    pub const REQUEST_THREAD_NAME: &'static str = "decimator-requests";

    /// Create a decimator reading WAV/RF64 files, delivering on a completion thread
    pub fn new(config: DecimatorConfig) -> DecimateResult<Self> {
        let completion = Arc::new(CompletionThread::spawn()?);
        Self::with_opener(config, Arc::new(WavOpener), completion)
    }

    /// Create a decimator with a custom asset opener and completion context
    pub fn with_opener(
        config: DecimatorConfig,
        opener: Arc<dyn AssetOpener>,
        completion: Arc<dyn CompletionContext>,
    ) -> DecimateResult<Self> {
        let config = config.sanitized();

        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("decimator-reduce-{}", i));
        if config.reduction_threads > 0 {
            builder = builder.num_threads(config.reduction_threads);
        }
        let pool = builder.build().map_err(|e| DecimateError::Pool(e.to_string()))?;
        log::info!(
            "Decimator: reduction pool with {} threads, strategy {:?}, multi_reader={} ({} readers)",
            pool.current_num_threads(),
            config.strategy,
            config.multi_reader,
            config.num_readers
        );

        let shared = Arc::new(Shared {
            config,
            opener,
            completion,
            pool,
            generation: AtomicU64::new(0),
            peak: AtomicU32::new(1.0f32.to_bits()),
            loaded: Mutex::new(None),
        });

        let (tx, rx) = channel::<Job>();
        let shared_for_thread = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(Self::REQUEST_THREAD_NAME.to_string())
            .spawn(move || {
                for job in rx {
                    shared_for_thread.process(job);
                }
                log::debug!("Decimator: request queue closed, exiting");
            })
            .map_err(|e| DecimateError::Spawn {
                name: Self::REQUEST_THREAD_NAME.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            shared,
            tx,
            _handle: handle,
        })
    }

    /// Open a new asset, superseding all work for the previous one
    ///
    /// On failure the decimator is left without an asset. Does not wait for
    /// a render of the previous asset to finish.
    pub fn set_asset(&self, path: impl AsRef<Path>, format: ProcessingFormat) -> DecimateResult<()> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut loaded = lock(&self.shared.loaded);
            if loaded.as_ref().is_some_and(|l| l.generation < generation) {
                *loaded = None;
            }
        }

        let started = Instant::now();
        let source = self.shared.opener.open(&path)?;
        let native = source.format();
        if native.channels != 1 && native.channels != 2 {
            return Err(AudioFileError::UnsupportedChannelCount(native.channels).into());
        }
        if native.sample_rate != format.sample_rate {
            log::warn!(
                "set_asset: {:?} is {} Hz, processing format is {} Hz; waveform is not resampled",
                path,
                native.sample_rate,
                format.sample_rate
            );
        }

        let length = source.frame_count();
        let asset = Asset::new(path, format, length);

        let mut loaded = lock(&self.shared.loaded);
        let current = self.shared.generation.load(Ordering::SeqCst);
        if current != generation {
            return Err(DecimateError::Superseded {
                requested: generation,
                current,
            });
        }
        log::info!(
            "set_asset: {:?} ({} frames, {:.1}s, {} ch) generation {} opened in {:?}",
            asset.path,
            length,
            asset.duration_seconds(),
            native.channels,
            generation,
            started.elapsed()
        );
        *loaded = Some(LoadedAsset {
            generation,
            asset,
            source: Arc::new(Mutex::new(source)),
        });
        Ok(())
    }

    /// Queue a request; `completion` runs on the completion context
    ///
    /// Never blocks. Errors (including a stopped request thread) are delivered
    /// through `completion` as well.
    pub fn get_samples<F>(&self, request: SampleRequest, completion: F)
    where
        F: FnOnce(DecimateResult<SampleBuffer>) + Send + 'static,
    {
        let job = Job {
            request,
            generation: self.shared.generation.load(Ordering::SeqCst),
            respond: Box::new(completion),
        };
        if let Err(err) = self.tx.send(job) {
            let respond = err.0.respond;
            self.shared
                .completion
                .deliver(Box::new(move || respond(Err(DecimateError::Disconnected))));
        }
    }

    /// Queue a request and receive the result over a channel
    pub fn fetch_samples(&self, request: SampleRequest) -> Receiver<DecimateResult<SampleBuffer>> {
        let (tx, rx) = bounded(1);
        self.get_samples(request, move |result| {
            let _ = tx.send(result);
        });
        rx
    }

    /// Peak of the most recent initial render (1.0 before any)
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.shared.peak.load(Ordering::SeqCst))
    }

    /// Current generation; bumped by every `set_asset`
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// The asset requests currently read from
    pub fn asset(&self) -> Option<Asset> {
        lock(&self.shared.loaded).as_ref().map(|loaded| loaded.asset.clone())
    }

    pub fn asset_length(&self) -> Option<u64> {
        lock(&self.shared.loaded).as_ref().map(|loaded| loaded.asset.length)
    }

    pub fn config(&self) -> &DecimatorConfig {
        &self.shared.config
    }
}

impl Drop for Decimator {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }
}
