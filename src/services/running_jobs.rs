//! Registry of import jobs running in this process
//!
//! Guarantees a single orchestrator run per job id and provides the
//! in-process half of cooperative cancellation (the persisted
//! `cancel_requested` flag is the cross-process half). Entries are removed
//! automatically when the `JobGuard` is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct JobEntry {
    token: CancellationToken,
    owner_id: Uuid,
}

/// Held by the orchestrator for the whole run
pub struct JobGuard {
    job_id: Uuid,
    token: CancellationToken,
    registry: RunningJobs,
}

impl JobGuard {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.job_id);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancelError {
    /// Caller is not the owner of this job
    NotOwner,
}

#[derive(Clone, Default)]
pub struct RunningJobs {
    jobs: Arc<Mutex<HashMap<Uuid, JobEntry>>>,
}

impl RunningJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `job_id` for this run. Returns `None` if it is already running.
    pub fn register(&self, job_id: Uuid, owner_id: Uuid) -> Option<JobGuard> {
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(&job_id) {
            return None;
        }
        let token = CancellationToken::new();
        jobs.insert(job_id, JobEntry {
            token: token.clone(),
            owner_id,
        });
        Some(JobGuard {
            job_id,
            token,
            registry: self.clone(),
        })
    }

    /// Trip the token of a locally running job, owner only.
    ///
    /// `Ok(false)` means the job is not running in this process.
    pub fn cancel(&self, job_id: &Uuid, caller_id: Uuid) -> Result<bool, CancelError> {
        let jobs = self.jobs.lock();
        match jobs.get(job_id) {
            Some(entry) => {
                if entry.owner_id != caller_id {
                    return Err(CancelError::NotOwner);
                }
                entry.token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[cfg(test)]
    pub fn is_running(&self, job_id: &Uuid) -> bool {
        self.jobs.lock().contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    fn remove(&self, job_id: &Uuid) {
        self.jobs.lock().remove(job_id);
    }
}
