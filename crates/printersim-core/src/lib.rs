// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrinterSim -- device state, core types and error definitions shared by the
// print listener, the SNMP responder and the control plane.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::SimConfig;
pub use error::PrinterSimError;
pub use store::DeviceStore;
pub use types::*;
