use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZero;
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

use image::DynamicImage;
use tracing::debug;

use crate::transform::{decode_oriented, encode, fit_to_box};
use crate::{EncodedImage, Result, Semaphore, TransformRequest};

/// Configuration of one [`Engine`] instance.
///
/// This is explicit per-instance state rather than process-wide knobs: every
/// engine owns its configuration for its whole lifetime, so two engines in
/// the same process cannot interfere with each other's tunables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EngineOptions {
    /// Number of worker threads executing transforms.
    pub worker_threads: NonZero<usize>,

    /// Maximum number of transforms processing simultaneously. Admission
    /// beyond this count blocks inside the engine, even when idle worker
    /// threads remain.
    pub concurrency_limit: NonZero<usize>,

    /// Whether decoded source images are cached by source identity.
    /// Disable for measurements that must pay the decode cost every time.
    pub cache: bool,
}

/// Executes transforms on a fixed pool of worker threads.
///
/// Callers submit work with [`transform()`](Engine::transform) from any
/// thread; the call blocks until the transform has been executed by the
/// pool. See the crate-level documentation for a usage example.
///
/// # Lifecycle
///
/// Dropping the engine waits for all in-flight transforms to finish.
pub struct Engine {
    options: EngineOptions,
    job_tx: Option<mpsc::Sender<Job>>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Creates an engine with the given options, spawning its worker
    /// threads immediately.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();

        let job_rx = Arc::new(Mutex::new(job_rx));
        let shared = Arc::new(EngineShared {
            admission: Semaphore::new(options.concurrency_limit),
            decoded: options.cache.then(|| Mutex::new(HashMap::new())),
        });

        let worker_handles = (0..options.worker_threads.get())
            .map(|worker_index| {
                let job_rx = Arc::clone(&job_rx);
                let shared = Arc::clone(&shared);

                thread::Builder::new()
                    .name(format!("pixelpipe-{worker_index}"))
                    .spawn(move || {
                        debug!(worker_index, "transform worker started");
                        worker_entrypoint(&job_rx, &shared);
                        debug!(worker_index, "transform worker exiting");
                    })
                    .expect("spawning a worker thread failed - nothing sensible can run here")
            })
            .collect();

        Self {
            options,
            job_tx: Some(job_tx),
            worker_handles,
        }
    }

    /// The options this engine was created with.
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Executes one transform on the engine's worker pool, blocking until
    /// it completes.
    ///
    /// # Errors
    ///
    /// Returns the transform's own failure, if any. The engine applies no
    /// retry or recovery policy of its own.
    pub fn transform(&self, request: &TransformRequest) -> Result<EncodedImage> {
        let (result_tx, result_rx) = oneshot::channel();

        self.job_tx
            .as_ref()
            .expect("job channel exists for the engine's whole lifetime - it is only taken in drop")
            .send(Job {
                request: request.clone(),
                result_tx,
            })
            .expect("worker threads outlive the engine - the channel cannot be closed yet");

        result_rx
            .recv()
            .expect("worker threads always report a result - did a worker panic?")
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("options", &self.options)
            .field("worker_count", &self.worker_handles.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Engine {
    // Impractical to test that a shutdown makes things stop happening.
    #[cfg_attr(test, mutants::skip)]
    fn drop(&mut self) {
        if thread::panicking() {
            // Joining while unwinding could replace the original panic with
            // a less useful one, so leave the workers alone.
            return;
        }

        // Closing the channel is the shutdown signal.
        drop(self.job_tx.take());

        for handle in self.worker_handles.drain(..) {
            handle
                .join()
                .expect("transform workers never panic - all failures travel as results");
        }
    }
}

/// State shared between an engine's worker threads.
struct EngineShared {
    admission: Semaphore,
    decoded: Option<Mutex<HashMap<u64, Arc<DynamicImage>>>>,
}

struct Job {
    request: TransformRequest,
    result_tx: oneshot::Sender<Result<EncodedImage>>,
}

fn worker_entrypoint(job_rx: &Mutex<mpsc::Receiver<Job>>, shared: &EngineShared) {
    loop {
        let job = {
            let job_rx = job_rx
                .lock()
                .expect("dequeue never panics, so the mutex cannot be poisoned");

            match job_rx.recv() {
                Ok(job) => job,
                // Channel closed - the engine is shutting down.
                Err(mpsc::RecvError) => break,
            }
        };

        let _permit = shared.admission.acquire();

        let result = execute(&job.request, shared);

        // The caller may have given up waiting; that is its own business.
        _ = job.result_tx.send(result);
    }
}

fn execute(request: &TransformRequest, shared: &EngineShared) -> Result<EncodedImage> {
    let base = decoded_source(request, shared)?;
    let fitted = fit_to_box(&base, request.target_width, request.target_height, request.fit);
    encode(&fitted, request.options)
}

fn decoded_source(request: &TransformRequest, shared: &EngineShared) -> Result<Arc<DynamicImage>> {
    let Some(cache) = &shared.decoded else {
        return Ok(Arc::new(decode_oriented(&request.source, request.max_pixels)?));
    };

    let key = request.source.cache_key();

    if let Some(hit) = cache
        .lock()
        .expect("cache access never panics, so the mutex cannot be poisoned")
        .get(&key)
    {
        return Ok(Arc::clone(hit));
    }

    // Deliberately not holding the lock while decoding - two threads may
    // race to decode the same source, in which case the second insert wins
    // and both results are identical anyway.
    let image = Arc::new(decode_oriented(&request.source, request.max_pixels)?);

    cache
        .lock()
        .expect("cache access never panics, so the mutex cannot be poisoned")
        .insert(key, Arc::clone(&image));

    Ok(image)
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use crate::{OutputFormat, ResizeFit, SourceImage, TransformError};

    use super::*;

    fn small_engine(cache: bool) -> Engine {
        Engine::new(EngineOptions {
            worker_threads: nz!(2),
            concurrency_limit: nz!(2),
            cache,
        })
    }

    fn small_request(source: &SourceImage) -> TransformRequest {
        TransformRequest {
            source: source.clone(),
            target_width: 24,
            target_height: 16,
            fit: ResizeFit::Cover,
            options: OutputFormat::Jpeg.sweep_options(),
            max_pixels: 1_000_000,
        }
    }

    #[test]
    fn transform_produces_an_artifact() {
        let engine = small_engine(true);
        let source = SourceImage::synthetic(48, 32).unwrap();

        let artifact = engine.transform(&small_request(&source)).unwrap();

        assert_eq!(artifact.format(), OutputFormat::Jpeg);
        assert!(!artifact.is_empty());
    }

    #[test]
    fn failures_travel_back_to_the_caller() {
        let engine = small_engine(false);
        let source = SourceImage::from_encoded(vec![1, 2, 3]);

        let error = engine.transform(&small_request(&source)).unwrap_err();
        assert!(matches!(error, TransformError::Decode { .. }));
    }

    #[test]
    fn concurrent_callers_all_complete() {
        let engine = small_engine(true);
        let source = SourceImage::synthetic(48, 32).unwrap();

        thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| engine.transform(&small_request(&source)).map(drop))
                })
                .collect::<Vec<_>>();

            for handle in handles {
                handle.join().unwrap().unwrap();
            }
        });
    }

    #[test]
    fn cache_setting_does_not_change_output() {
        let source = SourceImage::synthetic(48, 32).unwrap();

        let cached = small_engine(true)
            .transform(&small_request(&source))
            .unwrap();
        let uncached = small_engine(false)
            .transform(&small_request(&source))
            .unwrap();

        assert_eq!(cached.bytes(), uncached.bytes());
    }

    #[test]
    fn drop_waits_for_workers() {
        let engine = small_engine(true);
        drop(engine);
    }
}
