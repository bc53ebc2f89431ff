// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for PrinterSim.

use std::net::SocketAddr;

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all PrinterSim operations.
#[derive(Debug, Error)]
pub enum PrinterSimError {
    // -- Print protocol --
    #[error("print transport failed: {0}")]
    Transport(String),

    #[error("job {0} not found in ledger")]
    JobNotFound(JobId),

    #[error("job {id} is not downloading")]
    JobNotActive { id: JobId },

    // -- Wire formats --
    #[error("protocol error: {0}")]
    Protocol(String),

    // -- Control plane --
    #[error("malformed control input: {0}")]
    MalformedControlInput(String),

    // -- Startup --
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrinterSimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_not_found_names_the_id() {
        let err = PrinterSimError::JobNotFound(JobId(7));
        assert_eq!(err.to_string(), "job 7 not found in ledger");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: PrinterSimError = io.into();
        assert!(matches!(err, PrinterSimError::Io(_)));
    }
}
