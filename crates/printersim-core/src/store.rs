// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device state store -- the single source of truth for consumables, the busy
// flag and the job ledger.
//
// Every protocol surface holds an `Arc<DeviceStore>` and goes through these
// methods.  Each method is one short critical section on a single mutex, and
// none of them can be held across an `.await` because the guard never leaves
// this module.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument, warn};

use crate::error::{PrinterSimError, Result};
use crate::types::{Job, JobId, JobStatus, JobView, PrinterSnapshot};

/// The mutable device state guarded by [`DeviceStore`].
#[derive(Debug, Clone)]
struct DeviceState {
    has_ink: bool,
    has_paper: bool,
    is_busy: bool,
    /// Append-only ledger; `jobs[n].id == n + 1`.
    jobs: Vec<Job>,
    started_at: DateTime<Utc>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            has_ink: true,
            has_paper: true,
            is_busy: false,
            jobs: Vec::new(),
            started_at: Utc::now(),
        }
    }
}

impl DeviceState {
    fn job_mut(&mut self, id: JobId) -> Result<&mut Job> {
        id.index()
            .and_then(|idx| self.jobs.get_mut(idx))
            .ok_or(PrinterSimError::JobNotFound(id))
    }

    fn snapshot(&self) -> PrinterSnapshot {
        PrinterSnapshot {
            has_ink: self.has_ink,
            has_paper: self.has_paper,
            jobs: self.jobs.iter().map(JobView::from).collect(),
        }
    }
}

/// Thread-safe handle to the emulated device's state.
#[derive(Debug, Default)]
pub struct DeviceStore {
    state: Mutex<DeviceState>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the state lock.  The guarded data is plain values that are
    /// never left half-written, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Scalar fields --------------------------------------------------------

    pub fn has_ink(&self) -> bool {
        self.state().has_ink
    }

    pub fn set_has_ink(&self, has_ink: bool) {
        self.state().has_ink = has_ink;
    }

    pub fn has_paper(&self) -> bool {
        self.state().has_paper
    }

    pub fn set_has_paper(&self, has_paper: bool) {
        self.state().has_paper = has_paper;
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy
    }

    /// Override the busy flag and return the value now stored.
    ///
    /// The job ledger owns this flag: `begin_job` sets it and the terminal
    /// transitions clear it.  Clearing it while a job is still downloading
    /// is refused so that hrPrinterStatus never reads idle mid-transfer.
    pub fn set_busy(&self, is_busy: bool) -> bool {
        let mut state = self.state();
        let downloading = state
            .jobs
            .iter()
            .any(|job| job.status == JobStatus::Downloading);
        if !is_busy && downloading {
            warn!("busy flag kept while a job is downloading");
            return true;
        }
        state.is_busy = is_busy;
        is_busy
    }

    /// When the device came up (base for IPP up-time attributes).
    pub fn started_at(&self) -> DateTime<Utc> {
        self.state().started_at
    }

    // -- Composite reads/writes ------------------------------------------------

    /// Consumables and job listing, read atomically.
    pub fn snapshot(&self) -> PrinterSnapshot {
        self.state().snapshot()
    }

    /// Overwrite both consumable flags at once and return the resulting
    /// snapshot.  The job ledger is untouched.
    #[instrument(skip(self))]
    pub fn set_consumables(&self, has_ink: bool, has_paper: bool) -> PrinterSnapshot {
        let mut state = self.state();
        state.has_ink = has_ink;
        state.has_paper = has_paper;
        debug!("consumables updated");
        state.snapshot()
    }

    // -- Job ledger ------------------------------------------------------------

    /// Copy of every job record, in id order.
    pub fn jobs(&self) -> Vec<Job> {
        self.state().jobs.clone()
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        let state = self.state();
        id.index().and_then(|idx| state.jobs.get(idx)).cloned()
    }

    /// Number of jobs still downloading.
    pub fn active_job_count(&self) -> usize {
        self.state()
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Downloading)
            .count()
    }

    /// Append a new `Downloading` job and mark the device busy.
    ///
    /// The id is assigned inside the same critical section as the append,
    /// so no reader can observe the record before it is complete.
    pub fn begin_job(&self, name: String, document_format: Option<String>) -> Job {
        let mut state = self.state();
        let next = u32::try_from(state.jobs.len() + 1).unwrap_or(u32::MAX);
        let job = Job::new(JobId(next), name, document_format);
        state.jobs.push(job.clone());
        state.is_busy = true;
        debug!(job_id = %job.id, "job appended to ledger");
        job
    }

    /// Mutate an existing job in place and return the updated copy.
    pub fn update_job<F>(&self, id: JobId, update: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut state = self.state();
        let job = state.job_mut(id).inspect_err(|e| error!(error = %e, "ledger update failed"))?;
        update(job);
        Ok(job.clone())
    }

    /// Transition a downloading job to `Printed` and clear the busy flag.
    pub fn complete_job(&self, id: JobId, storage_ref: String, sha256: String) -> Result<Job> {
        self.finish_job(id, |job| {
            job.status = JobStatus::Printed;
            job.storage_ref = Some(storage_ref);
            job.sha256 = Some(sha256);
        })
    }

    /// Transition a downloading job to `Failed` and clear the busy flag.
    pub fn fail_job(&self, id: JobId, reason: String) -> Result<Job> {
        self.finish_job(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(reason);
        })
    }

    fn finish_job<F>(&self, id: JobId, apply: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut state = self.state();
        let job = state.job_mut(id).inspect_err(|e| error!(error = %e, "ledger update failed"))?;
        if job.status.is_terminal() {
            return Err(PrinterSimError::JobNotActive { id });
        }
        apply(job);
        job.completed_at = Some(Utc::now());
        let job = job.clone();
        state.is_busy = false;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn defaults_are_ready_and_idle() {
        let store = DeviceStore::new();
        assert!(store.has_ink());
        assert!(store.has_paper());
        assert!(!store.is_busy());
        assert!(store.jobs().is_empty());
    }

    #[test]
    fn begin_job_assigns_dense_ids_and_sets_busy() {
        let store = DeviceStore::new();
        let first = store.begin_job("".into(), None);
        let second = store.begin_job("../../etc/passwd".into(), None);

        assert_eq!(first.id, JobId(1));
        assert_eq!(second.id, JobId(2));
        assert_eq!(first.status, JobStatus::Downloading);
        assert!(store.is_busy());
        assert_eq!(store.job(JobId(2)).unwrap().name, "../../etc/passwd");
    }

    #[test]
    fn complete_job_records_storage_and_clears_busy() {
        let store = DeviceStore::new();
        let job = store.begin_job("doc".into(), Some("application/pdf".into()));

        let done = store
            .complete_job(job.id, "printjobs/job-1.pdf".into(), "abc".into())
            .unwrap();

        assert_eq!(done.status, JobStatus::Printed);
        assert_eq!(done.storage_ref.as_deref(), Some("printjobs/job-1.pdf"));
        assert!(done.completed_at.is_some());
        assert!(!store.is_busy());
    }

    #[test]
    fn fail_job_clears_busy() {
        let store = DeviceStore::new();
        let job = store.begin_job("doc".into(), None);

        let failed = store.fail_job(job.id, "connection reset".into()).unwrap();

        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("connection reset"));
        assert!(!store.is_busy());
        assert_eq!(store.snapshot().jobs[0].href, "#");
    }

    #[test]
    fn finishing_twice_is_rejected() {
        let store = DeviceStore::new();
        let job = store.begin_job("doc".into(), None);
        store.complete_job(job.id, "printjobs/job-1.ps".into(), "abc".into()).unwrap();

        let err = store.fail_job(job.id, "late".into()).unwrap_err();
        assert!(matches!(err, PrinterSimError::JobNotActive { id } if id == job.id));
        assert_eq!(store.job(job.id).unwrap().status, JobStatus::Printed);
    }

    #[test]
    fn unknown_job_is_an_error() {
        let store = DeviceStore::new();
        let err = store.update_job(JobId(9), |job| job.bytes_received = 1).unwrap_err();
        assert!(matches!(err, PrinterSimError::JobNotFound(JobId(9))));

        let err = store.complete_job(JobId(0), "x".into(), "y".into()).unwrap_err();
        assert!(matches!(err, PrinterSimError::JobNotFound(JobId(0))));
    }

    #[test]
    fn set_consumables_leaves_jobs_alone() {
        let store = DeviceStore::new();
        store.begin_job("a".into(), None);
        let before = store.snapshot().jobs;

        let after = store.set_consumables(false, true);

        assert!(!after.has_ink);
        assert!(after.has_paper);
        assert_eq!(after.jobs, before);
        assert_eq!(store.snapshot(), after);
    }

    #[test]
    fn scalar_setters_touch_one_field() {
        let store = DeviceStore::new();

        store.set_has_ink(false);
        assert!(!store.has_ink());
        assert!(store.has_paper());

        store.set_has_paper(false);
        assert!(!store.has_paper());
        assert!(!store.has_ink());

        store.set_has_ink(true);
        let snapshot = store.snapshot();
        assert!(snapshot.has_ink);
        assert!(!snapshot.has_paper);
        assert!(snapshot.jobs.is_empty());
        assert!(!store.is_busy());
    }

    #[test]
    fn set_busy_toggles_when_idle() {
        let store = DeviceStore::new();
        assert!(store.set_busy(true));
        assert!(store.is_busy());
        assert!(!store.set_busy(false));
        assert!(!store.is_busy());
    }

    #[test]
    fn set_busy_cannot_clear_a_downloading_job() {
        let store = DeviceStore::new();
        let job = store.begin_job("doc".into(), None);

        assert!(store.set_busy(false));
        assert!(store.is_busy());

        store.complete_job(job.id, "printjobs/job-1.ps".into(), String::new()).unwrap();
        assert!(!store.is_busy());
    }

    #[test]
    fn concurrent_appends_keep_ids_dense() {
        let store = Arc::new(DeviceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        store.begin_job(format!("t{i}-{n}"), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 200);
        for (idx, job) in jobs.iter().enumerate() {
            assert_eq!(job.id, JobId(idx as u32 + 1));
        }
    }
}
