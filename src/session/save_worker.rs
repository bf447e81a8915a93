//! Background record writer
//!
//! When [`SaveMode::Background`](crate::config::SaveMode) is configured, the
//! recorder hands finished records to this worker instead of writing them on
//! the tick thread. The worker only touches the filesystem; completions are
//! drained on the tick thread, which is where the catalog gets updated.

use std::path::PathBuf;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::codec;
use crate::error::{Result, ResultExt};
use crate::types::{ActorId, Record};

/// A record waiting to be written
#[derive(Debug)]
pub struct SaveJob {
    pub actor: ActorId,
    pub path: PathBuf,
    pub category: String,
    pub record: Record,
}

/// Outcome of a [`SaveJob`]
#[derive(Debug)]
pub struct SaveCompletion {
    pub actor: ActorId,
    pub path: PathBuf,
    pub category: String,
    pub result: Result<()>,
}

/// Handle to the writer thread
///
/// Dropping the handle closes the job channel and joins the thread, so every
/// queued record is on disk before the drop returns.
#[derive(Debug)]
pub struct SaveWorker {
    job_tx: Option<Sender<SaveJob>>,
    done_rx: Receiver<SaveCompletion>,
    handle: Option<JoinHandle<()>>,
}

impl SaveWorker {
    /// Spawn the writer thread
    pub fn spawn() -> std::io::Result<Self> {
        let (job_tx, job_rx) = unbounded::<SaveJob>();
        let (done_tx, done_rx) = unbounded();

        let handle = std::thread::Builder::new()
            .name("mimic-save".to_string())
            .spawn(move || run(job_rx, done_tx))?;

        Ok(Self {
            job_tx: Some(job_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    /// Queue a record. Returns the job back if the worker is gone.
    pub fn submit(&self, job: SaveJob) -> std::result::Result<(), SaveJob> {
        match &self.job_tx {
            Some(tx) => tx.send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        }
    }

    /// Completions received so far, without blocking
    pub fn drain(&self) -> Vec<SaveCompletion> {
        self.done_rx.try_iter().collect()
    }

    /// Block until every queued job has completed
    pub fn finish(mut self) -> Vec<SaveCompletion> {
        self.shutdown();
        self.done_rx.try_iter().collect()
    }

    fn shutdown(&mut self) {
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Save worker thread panicked");
            }
        }
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(jobs: Receiver<SaveJob>, done: Sender<SaveCompletion>) {
    tracing::debug!("Save worker started");

    for job in jobs.iter() {
        let result = codec::write_file(&job.path, &job.record)
            .with_context(|| format!("saving record for {}", job.actor));
        match &result {
            Ok(()) => tracing::debug!("Wrote {} in background", job.path.display()),
            Err(e) => tracing::error!("Background write of {} failed: {}", job.path.display(), e),
        }

        let completion = SaveCompletion {
            actor: job.actor,
            path: job.path,
            category: job.category,
            result,
        };
        if done.send(completion).is_err() {
            break;
        }
    }

    tracing::debug!("Save worker stopped");
}
