use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Lifetime of tasks queued on behalf of a client packet.
pub const DISPATCHER_TASK_EXPIRATION: u64 = 2000;

/// A unit of work for the dispatcher thread.
pub struct Task {
    func: Box<dyn FnOnce() + Send>,
    expiration: Option<Instant>,
}

impl Task {
    pub fn new<F: FnOnce() + Send + 'static>(func: F) -> Self {
        Self {
            func: Box::new(func),
            expiration: None,
        }
    }

    /// Task dropped unrun when it is still queued `millis` from now.
    pub fn with_expiration<F: FnOnce() + Send + 'static>(millis: u64, func: F) -> Self {
        Self {
            func: Box::new(func),
            expiration: Some(Instant::now() + Duration::from_millis(millis)),
        }
    }

    pub fn set_dont_expire(&mut self) {
        self.expiration = None;
    }

    pub fn has_expired(&self) -> bool {
        self.expiration
            .map(|deadline| Instant::now() > deadline)
            .unwrap_or(false)
    }

    fn run(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running = 0,
    Closing = 1,
    Terminated = 2,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<VecDeque<Task>>,
    signal: Condvar,
    state: AtomicU8,
    executed: AtomicU64,
    expired: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> DispatcherState {
        match self.state.load(Ordering::SeqCst) {
            2 => DispatcherState::Terminated,
            1 => DispatcherState::Closing,
            _ => DispatcherState::Running,
        }
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn execute(&self, task: Task) {
        if task.has_expired() {
            self.expired.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("dispatcher dropped an expired task");
            return;
        }
        task.run();
        self.executed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Single-consumer task queue. Producers call `add_task` from any thread;
/// tasks run one at a time in queue order, outside the queue lock.
///
/// A new dispatcher accepts tasks right away. `start` adds the consumer
/// thread; without it, `run_pending` drains the queue on the caller.
#[derive(Debug)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                signal: Condvar::new(),
                state: AtomicU8::new(DispatcherState::Running as u8),
                executed: AtomicU64::new(0),
                expired: AtomicU64::new(0),
            }),
            consumer: None,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.shared.state()
    }

    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Relaxed)
    }

    pub fn expired(&self) -> u64 {
        self.shared.expired.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().len()
    }

    /// Queues a task; `false` once the dispatcher stopped accepting work.
    pub fn add_task(&self, task: Task, push_front: bool) -> bool {
        let was_empty = {
            let mut queue = self.shared.lock();
            if self.shared.state() != DispatcherState::Running {
                return false;
            }
            let was_empty = queue.is_empty();
            if push_front {
                queue.push_front(task);
            } else {
                queue.push_back(task);
            }
            was_empty
        };
        if was_empty {
            self.shared.signal.notify_one();
        }
        true
    }

    pub fn start(&mut self) {
        if self.consumer.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.consumer = Some(thread::spawn(move || consume(&shared)));
        tracing::debug!("dispatcher started");
    }

    /// Stops accepting tasks; queued ones still run.
    pub fn stop(&self) {
        let _queue = self.shared.lock();
        if self.shared.state() == DispatcherState::Running {
            self.shared.set_state(DispatcherState::Closing);
        }
    }

    /// Terminates the consumer, then runs whatever is left in the queue on
    /// the calling thread. Returns how many tasks the flush ran.
    pub fn shutdown(&mut self) -> usize {
        {
            let _queue = self.shared.lock();
            self.shared.set_state(DispatcherState::Terminated);
        }
        self.shared.signal.notify_all();
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                tracing::error!("dispatcher thread panicked");
            }
        }

        let remaining: Vec<Task> = self.shared.lock().drain(..).collect();
        let flushed = remaining.len();
        for task in remaining {
            task.run();
            self.shared.executed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(flushed, "dispatcher shut down");
        flushed
    }

    /// Drains the queue on the calling thread, skipping expired tasks.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.shared.lock().pop_front() else {
                return ran;
            };
            let before = self.executed();
            self.shared.execute(task);
            if self.executed() > before {
                ran += 1;
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            self.shutdown();
        }
    }
}

fn consume(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.lock();
            loop {
                if shared.state() == DispatcherState::Terminated {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                queue = shared
                    .signal
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        shared.execute(task);
    }
}
