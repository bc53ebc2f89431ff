// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrinterSim Print -- the IPP listener of the emulated device and the
// pipeline that turns incoming documents into ledger entries and spool files.

pub mod http_body;
pub mod ingest;
pub mod ipp_server;
pub mod ipp_wire;

pub use ingest::{ActiveJob, JobPipeline};
pub use ipp_server::{IppServer, IppServerConfig};
