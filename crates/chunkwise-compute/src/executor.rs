//! Executors run per-chunk jobs and hand results back in input order.
//!
//! Every chunk-local stage and every per-chunk partial goes through an
//! executor, so swapping `SerialExecutor` for `RayonExecutor` parallelizes
//! the whole pipeline without changing results.

use chunkwise_core::error::{Error, Result};

/// A unit of work borrowed for the duration of one `run` call.
pub type Job<'a> = Box<dyn FnOnce() + Send + 'a>;

pub trait ChunkExecutor: Send + Sync {
    /// Stable name for logs.
    fn name(&self) -> &'static str;

    /// How many jobs are worth submitting at once.
    fn parallelism(&self) -> usize;

    /// Run every job to completion before returning.
    fn run(&self, jobs: Vec<Job<'_>>);
}

/// Runs jobs inline, one after another.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialExecutor;

impl ChunkExecutor for SerialExecutor {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn parallelism(&self) -> usize {
        1
    }

    fn run(&self, jobs: Vec<Job<'_>>) {
        for job in jobs {
            job();
        }
    }
}

#[cfg(feature = "rayon")]
pub use self::pool::RayonExecutor;

#[cfg(feature = "rayon")]
mod pool {
    use std::fmt;
    use std::sync::Arc;

    use chunkwise_core::error::{Error, Result};
    use rayon::{ThreadPool, ThreadPoolBuilder};

    use super::{ChunkExecutor, Job};

    /// Runs jobs on a dedicated rayon pool.
    #[derive(Clone)]
    pub struct RayonExecutor {
        pool: Arc<ThreadPool>,
    }

    impl fmt::Debug for RayonExecutor {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RayonExecutor")
                .field("num_threads", &self.pool.current_num_threads())
                .finish_non_exhaustive()
        }
    }

    impl RayonExecutor {
        /// A pool with `num_threads` workers, or rayon's default when `None`.
        pub fn try_new(num_threads: Option<usize>) -> Result<Self> {
            let mut builder =
                ThreadPoolBuilder::new().thread_name(|idx| format!("chunkwise-worker-{idx}"));
            if let Some(n) = num_threads {
                builder = builder.num_threads(n);
            }
            let pool = builder
                .build()
                .map_err(|e| Error::Config(format!("failed to build thread pool: {e}")))?;
            Ok(Self {
                pool: Arc::new(pool),
            })
        }
    }

    impl ChunkExecutor for RayonExecutor {
        fn name(&self) -> &'static str {
            "rayon"
        }

        fn parallelism(&self) -> usize {
            self.pool.current_num_threads().max(1)
        }

        fn run(&self, jobs: Vec<Job<'_>>) {
            self.pool.scope(|scope| {
                for job in jobs {
                    scope.spawn(move |_| job());
                }
            });
        }
    }
}

/// Apply `f` to every input through `exec`, keeping input order.
pub fn map_ordered<T, P>(
    exec: &dyn ChunkExecutor,
    inputs: Vec<T>,
    f: &(dyn Fn(T) -> Result<P> + Sync),
) -> Vec<Result<P>>
where
    T: Send,
    P: Send,
{
    let mut slots: Vec<Option<Result<P>>> = (0..inputs.len()).map(|_| None).collect();
    let jobs: Vec<Job<'_>> = inputs
        .into_iter()
        .zip(slots.iter_mut())
        .map(|(input, slot)| {
            Box::new(move || {
                *slot = Some(f(input));
            }) as Job<'_>
        })
        .collect();
    exec.run(jobs);

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(Error::Invariant(
                    "executor returned without running every job".into(),
                ))
            })
        })
        .collect()
}
