//! Bounded worker pool: fixed set of OS threads fed by a task channel, results returned in
//! completion order.

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use super::worker::{EnrichmentResult, EnrichmentTask, WorkerContext, run_task};

/// Counters shared with the workers.
#[derive(Debug, Default)]
pub struct PoolStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    executed: AtomicUsize,
}

impl PoolStats {
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

/// Single worker: read tasks from task_rx, run them, send results on result_tx.
fn worker_loop(
    task_rx: Receiver<EnrichmentTask>,
    result_tx: Sender<EnrichmentResult>,
    ctx: Arc<WorkerContext>,
    stats: Arc<PoolStats>,
) {
    while let Ok(task) = task_rx.recv() {
        let running = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = run_task(&task, &ctx);
        stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        stats.executed.fetch_add(1, Ordering::SeqCst);
        if result_tx.send(result).is_err() {
            break;
        }
    }
    drop(result_tx);
}

/// Pool of `size` worker threads. Submission never blocks; [`WorkerPool::recv`] blocks the
/// caller until the next task completes.
pub struct WorkerPool {
    task_tx: Option<Sender<EnrichmentTask>>,
    result_rx: Receiver<EnrichmentResult>,
    handles: Vec<JoinHandle<()>>,
    ctx: Arc<WorkerContext>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn spawn(size: usize, ctx: WorkerContext) -> Result<Self> {
        let (task_tx, task_rx) = unbounded::<EnrichmentTask>();
        let (result_tx, result_rx) = unbounded::<EnrichmentResult>();
        let ctx = Arc::new(ctx);
        let stats = Arc::new(PoolStats::default());

        let mut handles = Vec::with_capacity(size.max(1));
        for id in 0..size.max(1) {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let ctx = Arc::clone(&ctx);
            let stats = Arc::clone(&stats);
            let handle = thread::Builder::new()
                .name(format!("enrich-{id}"))
                .spawn(move || worker_loop(task_rx, result_tx, ctx, stats))?;
            handles.push(handle);
        }
        // Dropping the last sender closes the result channel once every worker exits.
        drop(result_tx);

        Ok(Self {
            task_tx: Some(task_tx),
            result_rx,
            handles,
            ctx,
            stats,
        })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Queue a task. Fails only after [`WorkerPool::close`].
    pub fn submit(&self, task: EnrichmentTask) -> Result<()> {
        let tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| anyhow!("worker pool no longer accepts tasks"))?;
        tx.send(task)
            .map_err(|_| anyhow!("all enrichment workers exited"))
    }

    /// Stop accepting tasks. Workers exit once the queue is drained.
    pub fn close(&mut self) {
        self.task_tx.take();
    }

    /// Next completed result, or None when every worker has exited and no result is pending.
    pub fn recv(&self) -> Option<EnrichmentResult> {
        self.result_rx.recv().ok()
    }

    /// Make queued and running tasks finish as cancelled.
    pub fn abort(&self) {
        self.ctx.abort.store(true, Ordering::Relaxed);
    }

    /// Close the queue and join every worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.close();
        let mut panicked = 0;
        for h in self.handles.drain(..) {
            if h.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            return Err(anyhow!("{panicked} enrichment worker thread(s) panicked"));
        }
        Ok(())
    }
}
