// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job ingestion pipeline -- turns print-protocol events into ledger state.
//
//   start()        -> job appended as Downloading, device busy, sink created
//   write_chunk()  -> bytes appended verbatim to the sink
//   finish()       -> sink flushed, job Printed, device idle
//   fail()         -> sink removed, job Failed, device idle
//
// Only one job may be downloading at a time.  `start` waits on a single
// permit (the print slot) before the job record exists, so a second client
// is back-pressured until the first job reaches a terminal state.  Dropping
// an `ActiveJob` without finishing it counts as a failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use printersim_core::config::SPOOL_SUBDIR;
use printersim_core::error::{PrinterSimError, Result};
use printersim_core::store::DeviceStore;
use printersim_core::types::{DocumentType, Job, JobId};

/// Creates jobs in the shared store and spools their documents to disk.
pub struct JobPipeline {
    store: Arc<DeviceStore>,
    spool_dir: PathBuf,
    slot: Arc<Semaphore>,
}

impl JobPipeline {
    /// `spool_dir` must exist before the first job starts.
    pub fn new(store: Arc<DeviceStore>, spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            spool_dir: spool_dir.into(),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Start event: claim the print slot, append the job, open its sink.
    pub async fn start(&self, name: String, document_format: Option<String>) -> Result<ActiveJob> {
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(|_| PrinterSimError::Transport("print slot closed".into()))?;

        let extension = DocumentType::spool_extension(document_format.as_deref());
        let job = self.store.begin_job(name, document_format);
        info!(job_id = %job.id, name = %job.name, "printing document");

        let filename = format!("job-{}.{extension}", job.id);
        let path = self.spool_dir.join(&filename);
        // Built before the sink is opened so that a start cancelled mid-open
        // still fails the job and frees the slot.
        let mut active = ActiveJob {
            id: job.id,
            store: Arc::clone(&self.store),
            writer: None,
            href: format!("{SPOOL_SUBDIR}/{filename}"),
            path,
            hasher: Sha256::new(),
            bytes: 0,
            finished: false,
            _permit: permit,
        };

        match File::create(&active.path).await {
            Ok(file) => {
                active.writer = Some(BufWriter::new(file));
                Ok(active)
            }
            Err(e) => {
                let reason = format!("create {}: {e}", active.path.display());
                warn!(job_id = %job.id, error = %reason, "could not open spool file");
                active.fail(reason).await;
                Err(PrinterSimError::Io(e))
            }
        }
    }
}

/// A job in the `Downloading` state, holding the print slot.
pub struct ActiveJob {
    id: JobId,
    store: Arc<DeviceStore>,
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    href: String,
    hasher: Sha256,
    bytes: u64,
    finished: bool,
    _permit: OwnedSemaphorePermit,
}

impl ActiveJob {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data event: append a chunk verbatim.  The store lock is only taken
    /// after the write completes, to bump the byte counter.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or(PrinterSimError::JobNotActive { id: self.id })?;
        writer.write_all(chunk).await?;
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;

        let total = self.bytes;
        self.store.update_job(self.id, |job| job.bytes_received = total)?;
        debug!(job_id = %self.id, bytes = total, "document chunk spooled");
        Ok(())
    }

    /// End event: flush the sink and mark the job printed.
    pub async fn finish(mut self) -> Result<Job> {
        let Some(mut writer) = self.writer.take() else {
            return Err(PrinterSimError::JobNotActive { id: self.id });
        };
        if let Err(e) = writer.flush().await {
            drop(writer);
            let reason = format!("flush {}: {e}", self.path.display());
            self.fail(reason).await;
            return Err(PrinterSimError::Io(e));
        }
        drop(writer);

        let digest = hex::encode(std::mem::take(&mut self.hasher).finalize());
        self.finished = true;
        let job = self
            .store
            .complete_job(self.id, self.href.clone(), digest.clone())?;

        info!(
            job_id = %self.id,
            path = %self.path.display(),
            bytes = self.bytes,
            sha256 = %digest,
            "document saved"
        );
        Ok(job)
    }

    /// Error event: discard the partial document and mark the job failed.
    ///
    /// Returns the updated record when the ledger accepted the transition.
    pub async fn fail(mut self, reason: impl Into<String>) -> Option<Job> {
        let reason = reason.into();
        self.finished = true;
        drop(self.writer.take());

        warn!(job_id = %self.id, bytes = self.bytes, error = %reason, "print job failed");

        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            debug!(path = %self.path.display(), error = %e, "partial spool file not removed");
        }
        self.store.fail_job(self.id, reason).ok()
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.writer.take());
        warn!(job_id = %self.id, bytes = self.bytes, "print job abandoned");
        // Drop cannot await; a single unlink is run inline.
        let _ = std::fs::remove_file(&self.path);
        let _ = self.store.fail_job(self.id, "abandoned before end of document".into());
    }
}
