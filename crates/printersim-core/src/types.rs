// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the emulated printer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a print job: its 1-based position in the job ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u32);

impl JobId {
    /// Index of this job inside the ledger vector.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a received job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Document body is still streaming in.
    Downloading,
    /// Document fully received and stored.
    Printed,
    /// Transfer broke off; nothing usable was stored.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Downloading)
    }
}

/// Document formats the spool knows a file extension for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    PostScript,
    PlainText,
    Jpeg,
    Png,
    PwgRaster,
    Urf,
}

impl DocumentType {
    /// Map an IPP `document-format` MIME type. Unknown and generic types
    /// yield `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/postscript" => Some(Self::PostScript),
            "text/plain" => Some(Self::PlainText),
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/pwg-raster" => Some(Self::PwgRaster),
            "image/urf" => Some(Self::Urf),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PostScript => "ps",
            Self::PlainText => "txt",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::PwgRaster => "pwg",
            Self::Urf => "urf",
        }
    }

    /// Spool file extension for a declared format. Falls back to `ps`,
    /// which is what generic drivers emit.
    pub fn spool_extension(mime: Option<&str>) -> &'static str {
        mime.and_then(Self::from_mime)
            .map_or(DocumentType::PostScript.extension(), Self::extension)
    }
}

/// One submitted print document and its lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Name declared by the client. Untrusted; never used in paths.
    pub name: String,
    pub status: JobStatus,
    /// Public href of the stored body, set once the job is `Printed`.
    pub storage_ref: Option<String>,
    /// Declared IPP `document-format`, if any.
    pub document_format: Option<String>,
    pub bytes_received: u64,
    /// Hex SHA-256 of the stored body.
    pub sha256: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason the transfer failed.
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: JobId, name: String, document_format: Option<String>) -> Self {
        Self {
            id,
            name,
            status: JobStatus::Downloading,
            storage_ref: None,
            document_format,
            bytes_received: 0,
            sha256: None,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Link shown in job listings: `#` until the document is stored.
    pub fn display_href(&self) -> &str {
        match (self.status, self.storage_ref.as_deref()) {
            (JobStatus::Printed, Some(href)) => href,
            _ => "#",
        }
    }
}

/// Job entry as exposed by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub name: String,
    pub href: String,
    pub status: JobStatus,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            href: job.display_href().to_string(),
            status: job.status,
        }
    }
}

/// Consumable flags plus the job listing, read in one critical section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterSnapshot {
    pub has_ink: bool,
    pub has_paper: bool,
    pub jobs: Vec<JobView>,
}

/// Lifecycle of a protocol listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}
