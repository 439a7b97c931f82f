//! Bounded worker pool running the tasks attached to awaiting results.
//!
//! Intake is an unbounded queue; submission never fails or blocks. Threads
//! start on demand up to `max_pool_size`, and threads above
//! `core_pool_size` exit after sitting idle for `keep_alive`.
//!
//! Each job runs with its correlation id bound to the worker thread, so
//! task code can answer through [`post_result`] without carrying the id.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use livetab_parse::{PendingTask, Token};

use super::pending::CorrelationId;
use super::EvalConfig;

/// Receiver of posted results. Implemented by the table engine.
pub trait ResultPoster: Send + Sync {
    /// Deliver `value` for `id`. Returns `false` when the id is unknown or
    /// no longer live.
    fn post_result(&self, id: CorrelationId, value: Token) -> bool;
}

struct Binding {
    poster: Weak<dyn ResultPoster>,
    id: CorrelationId,
}

thread_local! {
    static CURRENT: RefCell<Option<Binding>> = const { RefCell::new(None) };
}

/// Post `value` for the job running on this thread.
///
/// Returns `false` outside a pool job, or when the job's state was
/// cancelled in the meantime.
pub fn post_result(value: Token) -> bool {
    let bound = CURRENT.with(|c| {
        c.borrow()
            .as_ref()
            .map(|b| (b.poster.clone(), b.id))
    });
    match bound {
        Some((poster, id)) => poster.upgrade().is_some_and(|p| p.post_result(id, value)),
        None => {
            #[cfg(feature = "tracing")]
            tracing::warn!("post_result called outside a pool job");
            false
        }
    }
}

/// Correlation id bound to the current thread, if it is running a job.
pub fn current_correlation() -> Option<CorrelationId> {
    CURRENT.with(|c| c.borrow().as_ref().map(|b| b.id))
}

struct Job {
    id: CorrelationId,
    task: PendingTask,
    poster: Weak<dyn ResultPoster>,
}

#[derive(Default)]
struct PoolState {
    jobs: VecDeque<Job>,
    workers: usize,
    idle_workers: usize,
    running: usize,
    shutdown: bool,
}

impl PoolState {
    fn quiet(&self) -> bool {
        self.jobs.is_empty() && self.running == 0
    }
}

struct Shared {
    state: Mutex<PoolState>,
    /// Signalled when a job is queued or the pool shuts down.
    available: Condvar,
    /// Signalled when the pool runs out of work.
    idle: Condvar,
    core: usize,
    max: usize,
    keep_alive: Duration,
    prefix: String,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(config: &EvalConfig) -> Self {
        let max = config.max_pool_size.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                idle: Condvar::new(),
                core: config.core_pool_size.min(max),
                max,
                keep_alive: config.keep_alive,
                prefix: config.thread_name_prefix.clone(),
            }),
        }
    }

    pub fn submit(&self, id: CorrelationId, task: PendingTask, poster: Weak<dyn ResultPoster>) {
        let spawn_index = {
            let mut st = self.shared.state.lock();
            st.jobs.push_back(Job { id, task, poster });
            #[cfg(feature = "tracing")]
            tracing::trace!(%id, queued = st.jobs.len(), workers = st.workers, "pool intake");
            if st.jobs.len() > st.idle_workers && st.workers < self.shared.max {
                st.workers += 1;
                Some(st.workers)
            } else {
                None
            }
        };
        self.shared.available.notify_one();

        if let Some(n) = spawn_index {
            let shared = self.shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{n}", self.shared.prefix))
                .spawn(move || worker_loop(shared));
            if let Err(_e) = spawned {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "failed to spawn pool worker");
                let no_workers = {
                    let mut st = self.shared.state.lock();
                    st.workers -= 1;
                    st.workers == 0
                };
                // nobody left to drain the queue
                if no_workers {
                    self.drain_inline();
                }
            }
        }
    }

    fn drain_inline(&self) {
        loop {
            let job = {
                let mut st = self.shared.state.lock();
                let job = st.jobs.pop_front();
                if job.is_some() {
                    st.running += 1;
                }
                job
            };
            let Some(job) = job else { break };
            run_job(job);
            finish_job(&self.shared);
        }
    }

    /// Remove a queued job. A job already running is not interrupted.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        let mut st = self.shared.state.lock();
        let before = st.jobs.len();
        st.jobs.retain(|j| j.id != id);
        let removed = st.jobs.len() != before;
        if removed && st.quiet() {
            self.shared.idle.notify_all();
        }
        removed
    }

    /// Block until no job is queued or running. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut st = self.shared.state.lock();
        while !st.quiet() {
            if self.shared.idle.wait_until(&mut st, deadline).timed_out() {
                return st.quiet();
            }
        }
        true
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let mut st = self.shared.state.lock();
        st.shutdown = true;
        st.jobs.clear();
        drop(st);
        self.shared.available.notify_all();
        self.shared.idle.notify_all();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut st = shared.state.lock();
            loop {
                if st.shutdown {
                    st.workers -= 1;
                    return;
                }
                if let Some(job) = st.jobs.pop_front() {
                    st.running += 1;
                    break job;
                }
                st.idle_workers += 1;
                let timed_out = shared
                    .available
                    .wait_for(&mut st, shared.keep_alive)
                    .timed_out();
                st.idle_workers -= 1;
                if timed_out && st.jobs.is_empty() && st.workers > shared.core {
                    st.workers -= 1;
                    return;
                }
            }
        };
        run_job(job);
        finish_job(&shared);
    }
}

fn finish_job(shared: &Shared) {
    let mut st = shared.state.lock();
    st.running -= 1;
    if st.quiet() {
        shared.idle.notify_all();
    }
}

fn run_job(job: Job) {
    let Job { id, task, poster } = job;
    CURRENT.with(|c| {
        *c.borrow_mut() = Some(Binding {
            poster: poster.clone(),
            id,
        })
    });
    let outcome = panic::catch_unwind(AssertUnwindSafe(task));
    CURRENT.with(|c| c.borrow_mut().take());

    match outcome {
        Ok(Some(value)) => {
            if let Some(p) = poster.upgrade() {
                p.post_result(id, value);
            }
        }
        Ok(None) => {}
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(%id, "pending task panicked; cell stays pending");
        }
    }
}
