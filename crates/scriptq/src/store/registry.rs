//! Concurrent in-memory job registry.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::error::JobError;
use crate::job::{JobRecord, JobStatus};

/// Number of jobs per status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
    pub stopped: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.error + self.stopped
    }
}

/// Single source of truth for job lifecycle state.
///
/// Every mutation happens under the write lock, so a transition on one id is
/// applied indivisibly and readers see either the pre-image or the
/// post-image of a record.
#[derive(Default)]
pub struct Registry {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Inserts a new record. Fails with `Conflict` if the id is taken.
    pub fn insert(&self, record: JobRecord) -> Result<(), JobError> {
        let mut jobs = self.write_jobs();
        if jobs.contains_key(record.id()) {
            return Err(JobError::conflict(record.id(), "job id already exists"));
        }
        jobs.insert(record.id().to_string(), record);
        Ok(())
    }

    /// Returns a copy of the record.
    pub fn get(&self, id: &str) -> Result<JobRecord, JobError> {
        self.read_jobs()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_jobs().contains_key(id)
    }

    /// Applies `f` to the record under the write lock.
    pub fn update<T, F>(&self, id: &str, f: F) -> Result<T, JobError>
    where
        F: FnOnce(&mut JobRecord) -> Result<T, JobError>,
    {
        let mut jobs = self.write_jobs();
        let record = jobs.get_mut(id).ok_or_else(|| JobError::not_found(id))?;
        f(record)
    }

    /// Removes the record unconditionally.
    pub fn remove(&self, id: &str) -> Result<JobRecord, JobError> {
        self.write_jobs()
            .remove(id)
            .ok_or_else(|| JobError::not_found(id))
    }

    /// Removes the record if `guard` accepts it; the check and the removal
    /// happen under one lock acquisition.
    pub fn remove_if<F>(&self, id: &str, guard: F) -> Result<JobRecord, JobError>
    where
        F: FnOnce(&JobRecord) -> Result<(), JobError>,
    {
        let mut jobs = self.write_jobs();
        let record = jobs.get(id).ok_or_else(|| JobError::not_found(id))?;
        guard(record)?;
        jobs.remove(id).ok_or_else(|| JobError::not_found(id))
    }

    /// Point-in-time copy of all records.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.read_jobs().values().cloned().collect()
    }

    /// Ids of all jobs currently in PROCESSING.
    pub fn running_ids(&self) -> Vec<String> {
        self.read_jobs()
            .values()
            .filter(|job| job.is_running())
            .map(|job| job.id().to_string())
            .collect()
    }

    pub fn counts(&self) -> StatusCounts {
        let jobs = self.read_jobs();
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            match job.status() {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.error += 1,
                JobStatus::Stopped => counts.stopped += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }
}
