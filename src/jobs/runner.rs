//! Job runner: one OS thread per job, an optional ceiling on concurrent jobs, and exclusive
//! access for jobs that are not independent.

use log::{debug, error, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::{Job, JobExecutionError, JobState};

/// Releases a runner slot when the job thread ends.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a launched job.
pub struct JobHandle {
    name: &'static str,
    state: Arc<Mutex<JobState>>,
    handle: JoinHandle<Result<(), JobExecutionError>>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its outcome.
    pub fn join(self) -> Result<(), JobExecutionError> {
        self.handle
            .join()
            .unwrap_or(Err(JobExecutionError::Panicked { job: self.name }))
    }
}

/// Admits and executes jobs.
///
/// `max_concurrent` is an explicit ceiling: when that many jobs are running, [`JobRunner::launch`]
/// fails with [`JobExecutionError::AtCapacity`]. `None` means no ceiling.
#[derive(Clone)]
pub struct JobRunner {
    max_concurrent: Option<usize>,
    active: Arc<AtomicUsize>,
    exclusive: Arc<RwLock<()>>,
}

impl JobRunner {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            max_concurrent,
            active: Arc::new(AtomicUsize::new(0)),
            exclusive: Arc::new(RwLock::new(())),
        }
    }

    pub fn max_concurrent(&self) -> Option<usize> {
        self.max_concurrent
    }

    /// Jobs admitted and not yet finished.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn admit(&self) -> Result<ActiveGuard, JobExecutionError> {
        let mut current = self.active.load(Ordering::SeqCst);
        loop {
            if let Some(limit) = self.max_concurrent
                && current >= limit
            {
                return Err(JobExecutionError::AtCapacity { limit });
            }
            match self.active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Ok(ActiveGuard {
                        active: Arc::clone(&self.active),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Admit `job` and start it on its own thread.
    pub fn launch(&self, job: Job) -> Result<JobHandle, JobExecutionError> {
        let guard = self.admit()?;
        let name = job.name();
        let state = Arc::new(Mutex::new(JobState::NotStarted));
        let state_w = Arc::clone(&state);
        let exclusive = Arc::clone(&self.exclusive);

        let handle = thread::Builder::new()
            .name(format!("job-{name}"))
            .spawn(move || {
                let _guard = guard;
                if job.independent() {
                    let _shared = exclusive.read().unwrap_or_else(PoisonError::into_inner);
                    execute(&job, &state_w)
                } else {
                    let _exclusive = exclusive.write().unwrap_or_else(PoisonError::into_inner);
                    execute(&job, &state_w)
                }
            })
            .map_err(|e| JobExecutionError::Failed {
                job: name,
                source: anyhow::Error::from(e).context("spawn job thread"),
            })?;

        Ok(JobHandle {
            name,
            state,
            handle,
        })
    }

    /// Launch `job` and wait for it.
    pub fn run(&self, job: Job) -> Result<(), JobExecutionError> {
        self.launch(job)?.join()
    }
}

fn set_state(state: &Mutex<JobState>, next: JobState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Run a job on the current thread, recording its state. Panics are contained here.
fn execute(job: &Job, state: &Mutex<JobState>) -> Result<(), JobExecutionError> {
    let name = job.name();
    set_state(state, JobState::Running);
    debug!("Job {} started", name);
    let started = Instant::now();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.start()))
        .unwrap_or(Err(JobExecutionError::Panicked { job: name }));

    match &outcome {
        Ok(()) => {
            set_state(state, JobState::Completed);
            info!("Job {} completed in {:?}", name, started.elapsed());
        }
        Err(e) => {
            set_state(state, JobState::Failed);
            error!("{}", e);
        }
    }
    outcome
}
