// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulator configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PrinterSimError, Result};

/// Subdirectory of the public directory that holds received documents.
pub const SPOOL_SUBDIR: &str = "printjobs";

/// Runtime settings for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Address every listener binds to.
    pub bind_address: IpAddr,
    /// TCP port for the IPP print listener (default 9100).
    pub ipp_port: u16,
    /// UDP port for the SNMP agent (default 1308).
    pub snmp_port: u16,
    /// TCP port for the HTTP control plane (default 5000).
    pub web_port: u16,
    /// Directory served statically by the control plane.
    pub public_dir: PathBuf,
    /// Printer name reported over IPP and mDNS.
    pub printer_name: String,
    /// SNMP community to enforce. `None` answers any community.
    pub community: Option<String>,
    /// Advertise `_ipp._tcp` via mDNS.
    pub advertise_mdns: bool,
    /// Seconds a document stream may stay silent before the job fails.
    pub job_idle_timeout_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ipp_port: 9100,
            snmp_port: 1308,
            web_port: 5000,
            public_dir: PathBuf::from("public"),
            printer_name: "PrinterSim".into(),
            community: None,
            advertise_mdns: false,
            job_idle_timeout_secs: 60,
        }
    }
}

impl SimConfig {
    /// Load a JSON config file. Fields absent from the file keep their
    /// defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PrinterSimError::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| PrinterSimError::Config(format!("parse {}: {e}", path.display())))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Directory where received documents are written.
    pub fn spool_dir(&self) -> PathBuf {
        self.public_dir.join(SPOOL_SUBDIR)
    }

    pub fn ipp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.ipp_port)
    }

    pub fn snmp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.snmp_port)
    }

    pub fn web_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.web_port)
    }

    pub fn job_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.job_idle_timeout_secs)
    }
}
