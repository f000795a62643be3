use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};

use crate::core::queue::WorkQueue;
use crate::types::AppResult;

/// Position of a job in the overall run, for progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub worker: usize,
    pub number: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.total)
    }
}

/// Counts currently running instances of some external program.
pub trait InstanceCounter: Send + Sync {
    fn count(&self) -> usize;
}

/// Counts processes whose name matches a pattern via `pgrep`.
pub struct Pgrep {
    pattern: String,
}

impl Pgrep {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl InstanceCounter for Pgrep {
    fn count(&self) -> usize {
        // pgrep exits 1 when nothing matches; any failure counts as zero
        match Command::new("pgrep").arg(&self.pattern).output() {
            Ok(output) => String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter(|line| line.trim().parse::<u32>().is_ok())
                .count(),
            Err(e) => {
                debug!("pgrep {} failed: {e}", self.pattern);
                0
            }
        }
    }
}

/// Soft cap on concurrently running external processes.
///
/// The check and the subsequent job start are not atomic: several workers
/// may pass the check together and exceed the cap briefly.
pub struct Admission {
    counter: Box<dyn InstanceCounter>,
    cap: usize,
    backoff: Duration,
}

impl Admission {
    pub fn new(counter: impl InstanceCounter + 'static, cap: usize, backoff: Duration) -> Self {
        Self {
            counter: Box::new(counter),
            cap,
            backoff,
        }
    }

    pub fn at_capacity(&self) -> bool {
        self.counter.count() >= self.cap
    }
}

/// Fixed-size pool of OS threads draining a [`WorkQueue`].
///
/// Each worker owns the results of the jobs it ran; they are handed back
/// only after every worker has exited, so callers merge results single-threaded.
pub struct WorkerPool {
    workers: usize,
    running: Arc<AtomicBool>,
    admission: Option<Admission>,
    stagger: Duration,
    progress: bool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            running: Arc::new(AtomicBool::new(true)),
            admission: None,
            stagger: Duration::ZERO,
            progress: false,
        }
    }

    /// Stop handing out jobs once `running` is cleared
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Wait for a free slot under `admission` before every job
    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Delay between starting consecutive workers
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Drain `queue` with `handler`, returning every successful job with its result.
    ///
    /// Handler errors and panics are logged and the job is dropped; the other
    /// workers carry on. Returns once all workers have seen an empty queue.
    pub fn run<T, R, F>(&self, queue: &WorkQueue<T>, handler: F) -> Vec<(T, R)>
    where
        T: Send + fmt::Display,
        R: Send,
        F: Fn(&T, Progress) -> AppResult<R> + Sync,
    {
        let bar = self.progress_bar(queue.total());

        let results = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers);
            for worker in 0..self.workers {
                let handler = &handler;
                let bar = &bar;
                let spawned = thread::Builder::new()
                    .name(format!("worker-{worker}"))
                    .spawn_scoped(scope, move || self.work(worker, queue, handler, bar));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => error!("failed to start worker {worker}: {e}"),
                }

                if !self.stagger.is_zero() && worker + 1 < self.workers {
                    thread::sleep(self.stagger);
                }
            }

            let mut results = Vec::new();
            for handle in handles {
                match handle.join() {
                    Ok(done) => results.extend(done),
                    Err(_) => error!("a worker panicked outside of a job"),
                }
            }
            results
        });

        bar.finish_and_clear();
        results
    }

    fn work<T, R, F>(
        &self,
        worker: usize,
        queue: &WorkQueue<T>,
        handler: &F,
        bar: &ProgressBar,
    ) -> Vec<(T, R)>
    where
        T: fmt::Display,
        F: Fn(&T, Progress) -> AppResult<R>,
    {
        let mut done = Vec::new();
        loop {
            if !self.running.load(Ordering::SeqCst) {
                warn!("worker {worker}: interrupted, not starting further jobs");
                break;
            }

            if let Some(admission) = &self.admission {
                if queue.is_empty() {
                    break;
                }
                if admission.at_capacity() {
                    debug!("worker {worker}: at capacity, waiting");
                    thread::sleep(admission.backoff);
                    continue;
                }
            }

            let Some((number, job)) = queue.pop_numbered() else {
                break;
            };
            let progress = Progress {
                worker,
                number,
                total: queue.total(),
            };
            info!("run {progress}: {job}");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&job, progress)));
            match outcome {
                Ok(Ok(result)) => done.push((job, result)),
                Ok(Err(e)) => error!("job {job} failed: {e}"),
                Err(_) => error!("job {job} panicked"),
            }
            bar.inc(1);
        }
        debug!("worker {worker} done");
        done
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("{elapsed_precise} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }
}
