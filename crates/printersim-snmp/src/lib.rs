// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrinterSim SNMP -- a minimal read-only SNMPv1/v2c agent and the Printer-MIB
// view of the emulated device.

pub mod agent;
pub mod ber;
pub mod printer_mib;

pub use agent::{MibRegistry, SnmpAgent, SnmpAgentConfig};
pub use printer_mib::PrinterMibResponder;
