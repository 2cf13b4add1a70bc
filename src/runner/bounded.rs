//! Bounded Job Runner Module
//!
//! Admits up to a configured number of concurrently outstanding invocations of
//! one async operation factory and rejects anything beyond that.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::JobHandle;

/// Default number of concurrently outstanding invocations.
pub const DEFAULT_MAX_JOBS: usize = 1;

type Factory<T> = Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync>;

// == Slots ==
/// Outstanding invocations, one token each.
#[derive(Debug)]
struct Slots {
    max_jobs: usize,
    active: HashSet<u64>,
    next_id: u64,
}

impl Slots {
    fn admit(&mut self) -> Option<u64> {
        if self.active.len() >= self.max_jobs {
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.active.insert(id);
        Some(id)
    }
}

/// Releases its slot when the invocation settles, whatever the outcome.
struct SlotGuard {
    slots: Arc<Mutex<Slots>>,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.lock().active.remove(&self.id);
        trace!("Job slot {} released", self.id);
    }
}

// == Job Runner ==
/// Concurrency-limited runner around a zero-argument async factory.
///
/// Clones share the same slots and limit.
pub struct JobRunner<T> {
    factory: Factory<T>,
    slots: Arc<Mutex<Slots>>,
}

impl<T: Send + 'static> JobRunner<T> {
    // == Constructor ==
    /// Creates a runner with a limit of [`DEFAULT_MAX_JOBS`].
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            factory: Arc::new(move || factory().boxed()),
            slots: Arc::new(Mutex::new(Slots {
                max_jobs: DEFAULT_MAX_JOBS,
                active: HashSet::new(),
                next_id: 0,
            })),
        }
    }

    /// Builder form of [`JobRunner::set_max_jobs`].
    pub fn with_max_jobs(self, max_jobs: usize) -> Self {
        self.set_max_jobs(max_jobs);
        self
    }

    // == Limit ==
    /// Sets the maximum number of outstanding invocations to `max(1, n)`.
    ///
    /// Lowering the limit never cancels running jobs; it only restricts
    /// future admissions.
    pub fn set_max_jobs(&self, max_jobs: usize) -> &Self {
        let max_jobs = max_jobs.max(1);
        self.slots.lock().max_jobs = max_jobs;
        debug!("Job runner limit set to {}", max_jobs);
        self
    }

    /// Returns the current maximum.
    pub fn max_jobs(&self) -> usize {
        self.slots.lock().max_jobs
    }

    /// Returns the number of admitted invocations that have not settled.
    pub fn active_job_count(&self) -> usize {
        self.slots.lock().active.len()
    }

    // == Run ==
    /// Invokes the factory once and spawns the resulting operation, unless
    /// the runner is at capacity, in which case nothing happens and `None` is
    /// returned.
    ///
    /// The slot is taken before this returns and released when the operation
    /// settles.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn run(&self) -> Option<JobHandle<T>> {
        let admitted = self.slots.lock().admit();
        let Some(id) = admitted else {
            debug!(
                "Job runner at capacity ({} active), run not admitted",
                self.active_job_count()
            );
            return None;
        };

        let slot = SlotGuard {
            slots: Arc::clone(&self.slots),
            id,
        };
        trace!("Job slot {} admitted", id);

        let job = (self.factory)();
        Some(JobHandle::spawn(async move {
            let _slot = slot;
            job.await
        }))
    }
}

impl<T> Clone for JobRunner<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> fmt::Debug for JobRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("JobRunner")
            .field("max_jobs", &slots.max_jobs)
            .field("active", &slots.active.len())
            .finish()
    }
}
