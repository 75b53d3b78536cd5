use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::error::{Result, TaskError};

type Work<T> = Box<dyn FnOnce() -> T + Send>;
type Callback = Box<dyn FnOnce(TaskDone) + Send>;

/// A finished task: its value (or why there is none) and its timing.
#[derive(Debug)]
pub struct CompletedTask<T> {
    pub index: usize,
    pub result: Result<T>,
    /// Time spent waiting for a free slot.
    pub queued_for: Duration,
    /// Time spent running.
    pub elapsed: Duration,
}

/// What a completion callback is told about its task.
///
/// By the time the callback runs the task has left the running set and its
/// result is stored, so [`TaskPool::take_result`] with `index` returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDone {
    pub index: usize,
    pub succeeded: bool,
    pub queued_for: Duration,
    pub elapsed: Duration,
}

/// Counters reported by [`TaskPool::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub pool_size: usize,
    /// Tasks ever submitted.
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub finished: usize,
}

struct Pending<T> {
    index: usize,
    work: Work<T>,
    on_done: Option<Callback>,
    submitted: Instant,
}

struct State<T> {
    queue: VecDeque<Pending<T>>,
    running: usize,
    total: usize,
    finished: usize,
    /// Completed tasks still running their callback or dropping their result.
    settling: usize,
    results: HashMap<usize, CompletedTask<T>>,
}

impl<T> State<T> {
    fn is_finished(&self) -> bool {
        self.queue.is_empty() && self.running == 0 && self.settling == 0
    }
}

struct Shared<T> {
    config: PoolConfig,
    state: Mutex<State<T>>,
    idle: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs submitted closures on their own threads, at most `pool_size` at a
/// time, starting them in submission order.
///
/// Results are kept until taken with [`TaskPool::take_result`] or
/// [`TaskPool::drain_results`], so a long-lived pool must drain them or be
/// built with [`PoolConfig::with_retain_results`] set to `false`.
/// Completion order is not guaranteed.
pub struct TaskPool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> TaskPool<T> {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    running: 0,
                    total: 0,
                    finished: 0,
                    settling: 0,
                    results: HashMap::new(),
                }),
                idle: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Queue `work`; `on_done` runs exactly once when it completes, on the
    /// task's thread, after the result is stored and the slot is freed.
    /// Returns the task index (starting at 1).
    pub fn submit<W, C>(&self, work: W, on_done: C) -> usize
    where
        W: FnOnce() -> T + Send + 'static,
        C: FnOnce(TaskDone) + Send + 'static,
    {
        self.enqueue(Box::new(work), Some(Box::new(on_done)))
    }

    /// Queue `work` without a completion callback.
    pub fn execute<W>(&self, work: W) -> usize
    where
        W: FnOnce() -> T + Send + 'static,
    {
        self.enqueue(Box::new(work), None)
    }

    /// No task is queued or running, and every completion callback returned.
    pub fn is_finished(&self) -> bool {
        self.shared.lock().is_finished()
    }

    /// Block until every submitted task has completed.
    pub fn await_completion(&self) {
        let state = self.shared.lock();
        let _state = self
            .shared
            .idle
            .wait_while(state, |s| !s.is_finished())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`TaskPool::await_completion`] with a deadline. Returns whether
    /// the pool drained in time.
    pub fn await_completion_timeout(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .idle
            .wait_timeout_while(state, timeout, |s| !s.is_finished())
            .unwrap_or_else(PoisonError::into_inner);
        state.is_finished()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            pool_size: self.shared.config.limit(),
            total: state.total,
            queued: state.queue.len(),
            running: state.running,
            finished: state.finished,
        }
    }

    /// Remove and return the result of task `index`, if it has completed.
    pub fn take_result(&self, index: usize) -> Option<CompletedTask<T>> {
        self.shared.lock().results.remove(&index)
    }

    /// Remove every stored result, ordered by task index.
    pub fn drain_results(&self) -> Vec<CompletedTask<T>> {
        let mut results: Vec<_> = self
            .shared
            .lock()
            .results
            .drain()
            .map(|(_, r)| r)
            .collect();
        results.sort_by_key(|r| r.index);
        results
    }

    fn enqueue(&self, work: Work<T>, on_done: Option<Callback>) -> usize {
        let index = {
            let mut state = self.shared.lock();
            state.total += 1;
            let index = state.total;
            state.queue.push_back(Pending {
                index,
                work,
                on_done,
                submitted: Instant::now(),
            });
            index
        };
        trace!(index, "task submitted");
        try_start_next(&self.shared);
        index
    }
}

impl<T> std::fmt::Debug for TaskPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("pool_size", &self.shared.config.limit())
            .finish_non_exhaustive()
    }
}

/// Claim free slots for queued tasks, then spawn them outside the lock.
fn try_start_next<T: Send + 'static>(shared: &Arc<Shared<T>>) {
    let ready: Vec<Pending<T>> = {
        let mut state = shared.lock();
        let mut ready = Vec::new();
        while state.running < shared.config.limit() {
            let Some(task) = state.queue.pop_front() else {
                break;
            };
            state.running += 1;
            ready.push(task);
        }
        ready
    };

    for task in ready {
        start(shared, task);
    }
}

fn start<T: Send + 'static>(shared: &Arc<Shared<T>>, task: Pending<T>) {
    let index = task.index;
    // The closure gives the task back when the spawn fails.
    let slot = Arc::new(Mutex::new(Some(task)));
    let thread_slot = Arc::clone(&slot);
    let thread_shared = Arc::clone(shared);

    let spawned = thread::Builder::new()
        .name(format!("{}-{index}", shared.config.thread_name))
        .spawn(move || {
            let task = thread_slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(task) = task {
                run(&thread_shared, task);
            }
        });

    if let Err(e) = spawned {
        warn!(index, error = %e, "could not spawn task thread");
        let task = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            let queued_for = task.submitted.elapsed();
            let completed = CompletedTask {
                index: task.index,
                result: Err(TaskError::Spawn(e)),
                queued_for,
                elapsed: Duration::ZERO,
            };
            on_task_complete(shared, completed, task.on_done);
        }
    }
}

fn run<T: Send + 'static>(shared: &Arc<Shared<T>>, task: Pending<T>) {
    let Pending {
        index,
        work,
        on_done,
        submitted,
    } = task;
    let queued_for = submitted.elapsed();
    let started = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(work))
        .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
    let elapsed = started.elapsed();

    let completed = CompletedTask {
        index,
        result,
        queued_for,
        elapsed,
    };
    on_task_complete(shared, completed, on_done);
}

/// Store the result and free the slot, then run the callback outside the
/// lock, then start whatever is queued.
fn on_task_complete<T: Send + 'static>(
    shared: &Arc<Shared<T>>,
    completed: CompletedTask<T>,
    on_done: Option<Callback>,
) {
    let done = TaskDone {
        index: completed.index,
        succeeded: completed.result.is_ok(),
        queued_for: completed.queued_for,
        elapsed: completed.elapsed,
    };
    if let Err(e) = &completed.result {
        debug!(index = done.index, error = %e, "task failed");
    }

    let settling = on_done.is_some() || !shared.config.retain_results;
    {
        let mut state = shared.lock();
        state.results.insert(done.index, completed);
        state.running -= 1;
        state.finished += 1;
        if settling {
            state.settling += 1;
        }
    }
    trace!(index = done.index, elapsed = ?done.elapsed, "task finished");

    if let Some(callback) = on_done {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(done))).is_err() {
            warn!(index = done.index, "task completion callback panicked");
        }
    }
    if settling {
        let mut state = shared.lock();
        state.settling -= 1;
        if !shared.config.retain_results {
            state.results.remove(&done.index);
        }
    }

    try_start_next(shared);
    shared.idle.notify_all();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
