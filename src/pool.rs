use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: Mutex<Vec<Task>>,
    work_available: Condvar,
}

struct Shared {
    queues: Vec<Queue>,
    exit: AtomicBool,
}

/// Completion handle for a submitted task. Dropping it detaches the task.
pub struct TaskHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes and take its result.
    pub fn wait(self) -> T {
        self.receiver
            .recv()
            .expect("worker dropped a task without completing it")
    }
}

/// A fixed set of worker threads, each draining its own queue. Tasks are
/// pushed round-robin and complete in arbitrary order.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    next_queue: AtomicUsize,
}

impl ThreadPool {
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let shared = Arc::new(Shared {
            queues: (0..worker_count)
                .map(|_| Queue {
                    tasks: Mutex::new(Vec::new()),
                    work_available: Condvar::new(),
                })
                .collect(),
            exit: AtomicBool::new(false),
        });

        let workers = (0..worker_count)
            .map(|index| {
                let shared = shared.clone();
                std::thread::spawn(move || Self::worker_loop(&shared, index))
            })
            .collect();

        Self {
            shared,
            workers,
            next_queue: AtomicUsize::new(0),
        }
    }

    /// One worker per hardware thread.
    pub fn with_hardware_threads() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(threads)
    }

    fn worker_loop(shared: &Shared, index: usize) {
        let queue = &shared.queues[index];
        loop {
            let tasks = {
                let mut pending = queue.tasks.lock();
                while pending.is_empty() && !shared.exit.load(Ordering::Relaxed) {
                    queue.work_available.wait(&mut pending);
                }
                if pending.is_empty() {
                    return;
                }
                std::mem::take(&mut *pending)
            };

            for task in tasks {
                task();
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn add_task<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let work: Task = Box::new(move || {
            let _ = sender.send(task());
        });

        let index = self.next_queue.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len();
        let queue = &self.shared.queues[index];
        {
            let mut pending = queue.tasks.lock();
            pending.push(work);
        }
        queue.work_available.notify_one();

        TaskHandle { receiver }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.exit.store(true, Ordering::Relaxed);
        for queue in &self.shared.queues {
            queue.work_available.notify_one();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
