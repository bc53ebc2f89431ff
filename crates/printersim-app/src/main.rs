// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrinterSim -- emulated network printer.
//
// Entry point. Initialises logging, loads configuration, creates the spool
// directory, then runs the IPP listener, the SNMP agent and the HTTP control
// plane against one shared device store until Ctrl-C.

mod api;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use printersim_core::error::{PrinterSimError, Result};
use printersim_core::{DeviceStore, SimConfig};
use printersim_print::ipp_server::PRINTER_RESOURCE;
use printersim_print::{IppServer, IppServerConfig, JobPipeline};
use printersim_snmp::{PrinterMibResponder, SnmpAgent, SnmpAgentConfig};

/// Command-line overrides.  Anything not given falls back to the config
/// file, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "printersim", version, about = "Emulated network printer (IPP + SNMP + HTTP control plane)")]
struct Cli {
    /// JSON configuration file
    #[arg(long, short, env = "PRINTERSIM_CONFIG")]
    config: Option<PathBuf>,

    /// Address every listener binds to
    #[arg(long, env = "PRINTERSIM_BIND")]
    bind: Option<IpAddr>,

    /// IPP listener port
    #[arg(long, env = "PRINTERSIM_IPP_PORT")]
    ipp_port: Option<u16>,

    /// SNMP agent port
    #[arg(long, env = "PRINTERSIM_SNMP_PORT")]
    snmp_port: Option<u16>,

    /// HTTP control-plane port
    #[arg(long, env = "PRINTERSIM_WEB_PORT")]
    web_port: Option<u16>,

    /// Directory served by the control plane; documents land in
    /// `<public-dir>/printjobs`
    #[arg(long, env = "PRINTERSIM_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Only answer SNMP requests carrying this community
    #[arg(long, env = "PRINTERSIM_COMMUNITY")]
    community: Option<String>,

    /// Advertise the printer via mDNS
    #[arg(long, env = "PRINTERSIM_MDNS")]
    mdns: bool,

    /// Seconds a document upload may stall before the job fails
    #[arg(long, env = "PRINTERSIM_JOB_IDLE_TIMEOUT")]
    job_idle_timeout: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut SimConfig) {
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.ipp_port {
            config.ipp_port = port;
        }
        if let Some(port) = self.snmp_port {
            config.snmp_port = port;
        }
        if let Some(port) = self.web_port {
            config.web_port = port;
        }
        if let Some(dir) = &self.public_dir {
            config.public_dir.clone_from(dir);
        }
        if self.community.is_some() {
            config.community.clone_from(&self.community);
        }
        if self.mdns {
            config.advertise_mdns = true;
        }
        if let Some(secs) = self.job_idle_timeout {
            config.job_idle_timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    cli.apply(&mut config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "PrinterSim failed");
            ExitCode::FAILURE
        }
    }
}

/// Read the config file if one was named.  A missing or broken file is not
/// fatal; the defaults are used instead.
fn load_config(path: Option<&Path>) -> SimConfig {
    let Some(path) = path else {
        return SimConfig::default();
    };
    SimConfig::from_file(path).unwrap_or_else(|e| {
        warn!(error = %e, "falling back to default configuration");
        SimConfig::default()
    })
}

async fn run(config: SimConfig) -> Result<()> {
    info!(printer = %config.printer_name, "PrinterSim starting");

    let spool_dir = config.spool_dir();
    tokio::fs::create_dir_all(&spool_dir).await.map_err(|e| {
        PrinterSimError::Config(format!("create spool directory {}: {e}", spool_dir.display()))
    })?;

    let store = Arc::new(DeviceStore::new());

    let pipeline = Arc::new(JobPipeline::new(Arc::clone(&store), spool_dir));
    let mut ipp = IppServer::new(IppServerConfig::from_sim_config(&config));
    ipp.start(pipeline).await?;

    let registry = PrinterMibResponder::new(Arc::clone(&store)).into_registry();
    let mut snmp = SnmpAgent::new(SnmpAgentConfig::from_sim_config(&config), registry);
    snmp.start().await?;

    let web_addr = config.web_addr();
    let listener = tokio::net::TcpListener::bind(web_addr)
        .await
        .map_err(|source| PrinterSimError::Bind {
            addr: web_addr,
            source,
        })?;
    let app = api::router(Arc::clone(&store), &config.public_dir);

    log_banner(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ipp.stop().await?;
    snmp.stop().await?;
    info!("PrinterSim stopped");
    Ok(())
}

fn log_banner(config: &SimConfig) {
    info!(port = config.ipp_port, "IPP printer listening");
    info!(port = config.snmp_port, "SNMP agent listening");
    info!(port = config.web_port, "control plane listening");
    info!(
        driver = "Generic PDF",
        uri = %format!("ipp://localhost:{}{PRINTER_RESOURCE}", config.ipp_port),
        "add the printer with this driver and URI"
    );
    match local_ip_address::local_ip() {
        Ok(ip) => info!("External access on http://{ip}:{}", config.web_port),
        Err(e) => warn!(error = %e, "no external IPv4 address found"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config_values() {
        let cli = Cli::parse_from([
            "printersim",
            "--ipp-port",
            "6310",
            "--public-dir",
            "/tmp/sim",
            "--community",
            "private",
            "--mdns",
        ]);
        let mut config = SimConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ipp_port, 6310);
        assert_eq!(config.snmp_port, 1308);
        assert_eq!(config.public_dir, PathBuf::from("/tmp/sim"));
        assert_eq!(config.community.as_deref(), Some("private"));
        assert!(config.advertise_mdns);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/printersim.json")));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("printersim.json");
        std::fs::write(&path, r#"{ "web_port": 8080, "job_idle_timeout_secs": 5 }"#).unwrap();

        let config = load_config(Some(&path));

        assert_eq!(config.web_port, 8080);
        assert_eq!(config.job_idle_timeout_secs, 5);
        assert_eq!(config.ipp_port, 9100);
    }
}
