// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Emulated IPP/1.1 printer listener.
//
// The server listens on a TCP port (default 9100) for IPP requests, either
// wrapped in HTTP POST (RFC 8010 SS4) or sent raw.  Print-Job bodies are not
// buffered: after the attribute header is decoded, the remaining body is
// streamed through the `JobPipeline` chunk by chunk, so the ledger shows the
// job as Downloading for exactly as long as the transfer lasts.
//
// # Supported operations
//
//   - Print-Job              (0x0002)  RFC 8011 SS4.2.1
//   - Validate-Job           (0x0004)  RFC 8011 SS4.2.3
//   - Get-Job-Attributes     (0x0009)  RFC 8011 SS4.3.4
//   - Get-Jobs               (0x000A)  RFC 8011 SS4.2.6
//   - Get-Printer-Attributes (0x000B)  RFC 8011 SS4.2.5
//
// # mDNS advertisement
//
// When enabled, the printer registers `_ipp._tcp.local.` via mDNS-SD so
// drivers can discover it.  Off by default.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use printersim_core::error::{PrinterSimError, Result};
use printersim_core::types::{Job, JobId, JobStatus, ServerStatus};

use crate::http_body::{BodyFraming, BodyReader, looks_like_http, read_http_head};
use crate::ingest::JobPipeline;
use crate::ipp_wire::*;

/// Maximum size of the IPP attribute header before the document data.
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Read size while streaming document data.
const CHUNK_SIZE: usize = 8192;

/// Resource path advertised to drivers.
pub const PRINTER_RESOURCE: &str = "/ipp/printer";

/// mDNS service type for plain IPP.
const IPP_SERVICE_TYPE: &str = "_ipp._tcp.local.";

/// Document formats listed in `document-format-supported`.
const SUPPORTED_FORMATS: [&str; 6] = [
    "application/octet-stream",
    "application/pdf",
    "application/postscript",
    "image/pwg-raster",
    "image/urf",
    "text/plain",
];

/// Operations listed in `operations-supported`.
const SUPPORTED_OPERATIONS: [u16; 5] = [
    OP_PRINT_JOB,
    OP_VALIDATE_JOB,
    OP_GET_JOB_ATTRIBUTES,
    OP_GET_JOBS,
    OP_GET_PRINTER_ATTRIBUTES,
];

// ---------------------------------------------------------------------------
// Configuration and shared state
// ---------------------------------------------------------------------------

/// Settings for the IPP listener.
#[derive(Debug, Clone)]
pub struct IppServerConfig {
    pub bind_addr: SocketAddr,
    pub printer_name: String,
    /// How long a document stream may stay silent before the job fails.
    pub idle_timeout: Duration,
    pub advertise_mdns: bool,
}

impl IppServerConfig {
    pub fn from_sim_config(config: &printersim_core::SimConfig) -> Self {
        Self {
            bind_addr: config.ipp_addr(),
            printer_name: config.printer_name.clone(),
            idle_timeout: config.job_idle_timeout(),
            advertise_mdns: config.advertise_mdns,
        }
    }
}

/// State shared across all connection-handling tasks.
struct SharedState {
    pipeline: Arc<JobPipeline>,
    active_connections: Arc<AtomicU32>,
    /// The port we are listening on (used to build printer-uri).
    port: u16,
    printer_name: String,
    idle_timeout: Duration,
}

impl SharedState {
    fn printer_uri(&self) -> String {
        format!("ipp://localhost:{}{PRINTER_RESOURCE}", self.port)
    }

    fn job_uri(&self, id: JobId) -> String {
        format!("{}/jobs/{id}", self.printer_uri())
    }
}

// ---------------------------------------------------------------------------
// IppServer
// ---------------------------------------------------------------------------

/// The print-protocol listener of the emulated device.
pub struct IppServer {
    config: IppServerConfig,
    /// Address actually bound (differs from the config when port 0 is used).
    local_addr: Option<SocketAddr>,
    status: ServerStatus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    mdns_daemon: Option<mdns_sd::ServiceDaemon>,
    mdns_fullname: Option<String>,
}

impl IppServer {
    /// Create a server in `Stopped` state.  Call [`IppServer::start`] to
    /// begin accepting connections.
    pub fn new(config: IppServerConfig) -> Self {
        Self {
            config,
            local_addr: None,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            mdns_daemon: None,
            mdns_fullname: None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`PrinterSimError::Bind`] if the port is unavailable.
    pub async fn start(&mut self, pipeline: Arc<JobPipeline>) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(addr = ?self.local_addr, "IPP server already running");
            return Ok(());
        }

        self.status = ServerStatus::Starting;

        let bind_addr = self.config.bind_addr;
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.status = ServerStatus::Error;
                return Err(PrinterSimError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        info!(addr = %local_addr, "IPP listener ready");

        if self.config.advertise_mdns {
            self.register_mdns(local_addr.port());
        }

        let shared = Arc::new(SharedState {
            pipeline,
            active_connections: Arc::clone(&self.active_connections),
            port: local_addr.port(),
            printer_name: self.config.printer_name.clone(),
            idle_timeout: self.config.idle_timeout,
        });

        let shutdown = Arc::clone(&self.shutdown_signal);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Stop accepting connections.  Transfers already in progress finish on
    /// their own tasks.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(addr = ?self.local_addr, "stopping IPP listener");
        self.unregister_mdns();
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| PrinterSimError::Transport(format!("accept task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        Ok(())
    }

    /// Register `_ipp._tcp.local.`.  Failures are logged; the printer keeps
    /// working by direct address.
    fn register_mdns(&mut self, port: u16) {
        let daemon = match mdns_sd::ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS daemon for advertisement");
                return;
            }
        };

        let rp = PRINTER_RESOURCE.trim_start_matches('/');
        let pdl = SUPPORTED_FORMATS.join(",");
        let properties = [
            ("txtvers", "1"),
            ("qtotal", "1"),
            ("rp", rp),
            ("ty", self.config.printer_name.as_str()),
            ("pdl", pdl.as_str()),
            ("Color", "F"),
            ("Duplex", "F"),
        ];

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "printersim".into());

        match mdns_sd::ServiceInfo::new(
            IPP_SERVICE_TYPE,
            &self.config.printer_name,
            &format!("{hostname}.local."),
            "",
            port,
            &properties[..],
        ) {
            Ok(service_info) => {
                let service_info = service_info.enable_addr_auto();
                let fullname = service_info.get_fullname().to_owned();
                match daemon.register(service_info) {
                    Ok(()) => {
                        info!(name = %fullname, port, "mDNS service registered");
                        self.mdns_fullname = Some(fullname);
                    }
                    Err(e) => warn!(error = %e, "failed to register mDNS service"),
                }
            }
            Err(e) => warn!(error = %e, "failed to create mDNS ServiceInfo"),
        }

        self.mdns_daemon = Some(daemon);
    }

    fn unregister_mdns(&mut self) {
        if let Some(daemon) = self.mdns_daemon.take() {
            if let Some(fullname) = self.mdns_fullname.take() {
                if let Err(e) = daemon.unregister(&fullname) {
                    warn!(error = %e, "failed to unregister mDNS service");
                }
            }
            if let Err(e) = daemon.shutdown() {
                warn!(error = %e, "failed to shut down mDNS daemon");
            }
        }
    }

    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("IPP accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "incoming IPP connection");
                            let state = Arc::clone(&shared);
                            tokio::spawn(async move {
                                state.active_connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = handle_connection(stream, peer_addr, &state).await {
                                    warn!(peer = %peer_addr, error = %e, "IPP connection error");
                                }
                                state.active_connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept IPP connection");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connection handling
// ---------------------------------------------------------------------------

/// Serve one request on a fresh connection.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &SharedState,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let peek = reader
        .fill_buf()
        .await
        .map_err(|e| PrinterSimError::Transport(format!("read from {peer_addr}: {e}")))?;
    if peek.is_empty() {
        debug!(peer = %peer_addr, "empty connection -- closing");
        return Ok(());
    }

    let http = looks_like_http(peek);
    let framing = if http {
        let head = read_http_head(&mut reader)
            .await
            .map_err(|e| PrinterSimError::Protocol(format!("HTTP head from {peer_addr}: {e}")))?;
        debug!(peer = %peer_addr, method = %head.method, path = %head.path, "HTTP envelope");

        if head.method != "POST" {
            write_half
                .write_all(
                    b"HTTP/1.1 405 Method Not Allowed\r\nAllow: POST\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .await?;
            return Ok(());
        }
        if head.expects_continue() {
            write_half.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        }
        head.framing()
    } else {
        BodyFraming::UntilEof
    };

    let mut body = BodyReader::new(reader, framing);
    let response = serve_request(&mut body, peer_addr, state).await;
    send_response(&mut write_half, &response, http).await
}

/// Decode the IPP header from `body`, run the operation, and return the
/// encoded response.
async fn serve_request<R>(body: &mut BodyReader<R>, peer_addr: SocketAddr, state: &SharedState) -> Vec<u8>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    let (request, consumed) = loop {
        match parse_ipp_header(&buf) {
            Ok(Some(parsed)) => break parsed,
            Ok(None) => {}
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "malformed IPP request");
                return build_status_response(
                    STATUS_CLIENT_ERROR_BAD_REQUEST,
                    request_id_hint(&buf),
                    &format!("Malformed IPP request: {e}"),
                );
            }
        }
        if buf.len() > MAX_HEADER_BYTES {
            warn!(peer = %peer_addr, bytes = buf.len(), "IPP header too large");
            return build_status_response(
                STATUS_CLIENT_ERROR_BAD_REQUEST,
                request_id_hint(&buf),
                "IPP attribute header too large",
            );
        }
        let n = match tokio::time::timeout(state.idle_timeout, body.read(&mut chunk)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!(peer = %peer_addr, error = %e, "IPP header read failed");
                return build_status_response(
                    STATUS_CLIENT_ERROR_BAD_REQUEST,
                    request_id_hint(&buf),
                    &format!("Incomplete IPP request: {e}"),
                );
            }
            Err(_) => {
                return build_status_response(
                    STATUS_CLIENT_ERROR_TIMEOUT,
                    request_id_hint(&buf),
                    "Timed out waiting for the IPP request",
                );
            }
        };
        if n == 0 {
            return build_status_response(
                STATUS_CLIENT_ERROR_BAD_REQUEST,
                request_id_hint(&buf),
                "IPP request ended before end-of-attributes",
            );
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    debug!(
        peer = %peer_addr,
        version = %format!("{}.{}", request.version_major, request.version_minor),
        operation_id = %format!("0x{:04X}", request.operation_id),
        request_id = request.request_id,
        groups = request.attribute_groups.len(),
        "parsed IPP request"
    );

    let response = if request.operation_id == OP_PRINT_JOB {
        let leftover = buf.split_off(consumed);
        handle_print_job(&request, &leftover, body, state).await
    } else {
        dispatch_operation(&request, state)
    };

    info!(
        peer = %peer_addr,
        operation = %format!("0x{:04X}", request.operation_id),
        response_bytes = response.len(),
        "IPP response ready"
    );
    response
}

/// The request-id of a partially received message, for error replies.
fn request_id_hint(buf: &[u8]) -> u32 {
    buf.get(4..8)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(0)
}

/// Send an IPP response, wrapped in HTTP when the request was.
async fn send_response<W>(stream: &mut W, ipp_body: &[u8], http: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if http {
        let header = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/ipp\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            ipp_body.len()
        );
        stream
            .write_all(header.as_bytes())
            .await
            .map_err(|e| PrinterSimError::Transport(format!("write HTTP headers: {e}")))?;
    }

    stream
        .write_all(ipp_body)
        .await
        .map_err(|e| PrinterSimError::Transport(format!("write IPP body: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| PrinterSimError::Transport(format!("flush: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| PrinterSimError::Transport(format!("shutdown: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Operation handlers
// ---------------------------------------------------------------------------

/// Handle Print-Job (0x0002): drive the job through the pipeline while the
/// document streams in.
async fn handle_print_job<R>(
    request: &IppRequest,
    leftover: &[u8],
    body: &mut BodyReader<R>,
    state: &SharedState,
) -> Vec<u8>
where
    R: AsyncBufRead + Unpin,
{
    let name = request
        .operation_string("job-name")
        .or_else(|| request.operation_string("document-name"))
        .unwrap_or_default();
    let document_format = request.operation_string("document-format");

    let mut job = match state.pipeline.start(name, document_format).await {
        Ok(job) => job,
        Err(e) => {
            error!(error = %e, "could not start print job");
            return build_status_response(
                STATUS_SERVER_ERROR_INTERNAL,
                request.request_id,
                &format!("Failed to start job: {e}"),
            );
        }
    };

    for attr in request.attributes() {
        debug!(job_id = %job.id(), "{}={}", attr.name, attr.display_value());
    }

    if let Err(e) = job.write_chunk(leftover).await {
        job.fail(format!("spool write: {e}")).await;
        return build_status_response(
            STATUS_SERVER_ERROR_INTERNAL,
            request.request_id,
            "Failed to store document",
        );
    }

    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match tokio::time::timeout(state.idle_timeout, body.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                job.fail(format!("transport error: {e}")).await;
                return build_status_response(
                    STATUS_SERVER_ERROR_INTERNAL,
                    request.request_id,
                    &format!("Document transfer failed: {e}"),
                );
            }
            Err(_) => {
                let secs = state.idle_timeout.as_secs_f32();
                job.fail(format!("no document data for {secs:.1}s")).await;
                return build_status_response(
                    STATUS_CLIENT_ERROR_TIMEOUT,
                    request.request_id,
                    "Timed out waiting for document data",
                );
            }
        };
        if let Err(e) = job.write_chunk(&chunk[..n]).await {
            job.fail(format!("spool write: {e}")).await;
            return build_status_response(
                STATUS_SERVER_ERROR_INTERNAL,
                request.request_id,
                "Failed to store document",
            );
        }
    }

    let job = match job.finish().await {
        Ok(job) => job,
        Err(e) => {
            error!(error = %e, "could not finalise print job");
            return build_status_response(
                STATUS_SERVER_ERROR_INTERNAL,
                request.request_id,
                &format!("Failed to store document: {e}"),
            );
        }
    };

    let mut resp = IppResponseBuilder::new(STATUS_OK, request.request_id);
    resp.operation_preamble("successful-ok");
    resp.begin_group(TAG_JOB_ATTRIBUTES)
        .integer("job-id", job_id_value(job.id))
        .uri("job-uri", &state.job_uri(job.id))
        .enum_attr("job-state", job_state(job.status))
        .keyword("job-state-reasons", job_state_reason(job.status));
    resp.build()
}

/// Route a non-streaming request to its handler.
fn dispatch_operation(request: &IppRequest, state: &SharedState) -> Vec<u8> {
    match request.operation_id {
        OP_VALIDATE_JOB => handle_validate_job(request),
        OP_GET_JOB_ATTRIBUTES => handle_get_job_attributes(request, state),
        OP_GET_JOBS => handle_get_jobs(request, state),
        OP_GET_PRINTER_ATTRIBUTES => handle_get_printer_attributes(request, state),
        _ => {
            warn!(
                operation = %format!("0x{:04X}", request.operation_id),
                "unsupported IPP operation"
            );
            build_status_response(
                STATUS_SERVER_ERROR_OPERATION_NOT_SUPPORTED,
                request.request_id,
                &format!("Operation 0x{:04X} is not supported", request.operation_id),
            )
        }
    }
}

fn handle_validate_job(request: &IppRequest) -> Vec<u8> {
    build_status_response(STATUS_OK, request.request_id, "successful-ok")
}

/// Handle Get-Job-Attributes (0x0009).  The job is named by `job-id` or by
/// the trailing segment of `job-uri`.
fn handle_get_job_attributes(request: &IppRequest, state: &SharedState) -> Vec<u8> {
    let requested = request.operation_integer("job-id").or_else(|| {
        request
            .operation_string("job-uri")
            .and_then(|uri| uri.rsplit('/').next().and_then(|id| id.parse().ok()))
    });

    let Some(raw_id) = requested else {
        return build_status_response(
            STATUS_CLIENT_ERROR_BAD_REQUEST,
            request.request_id,
            "Missing required job-id attribute",
        );
    };

    let job = u32::try_from(raw_id)
        .ok()
        .and_then(|id| state.pipeline.store().job(JobId(id)));
    let Some(job) = job else {
        debug!(job_id = raw_id, "Get-Job-Attributes: job not found");
        return build_status_response(
            STATUS_CLIENT_ERROR_NOT_FOUND,
            request.request_id,
            &format!("Job {raw_id} not found"),
        );
    };

    let started_at = state.pipeline.store().started_at();
    let mut resp = IppResponseBuilder::new(STATUS_OK, request.request_id);
    resp.operation_preamble("successful-ok");
    write_job_group(&mut resp, &job, started_at, state);
    resp.build()
}

/// Handle Get-Jobs (0x000A), honouring `which-jobs` (default
/// `not-completed`, RFC 8011 SS4.2.6.1).
fn handle_get_jobs(request: &IppRequest, state: &SharedState) -> Vec<u8> {
    let which = request
        .operation_string("which-jobs")
        .unwrap_or_else(|| "not-completed".into());
    let wants_terminal = match which.as_str() {
        "completed" => true,
        "not-completed" => false,
        other => {
            return build_status_response(
                STATUS_CLIENT_ERROR_BAD_REQUEST,
                request.request_id,
                &format!("Unsupported which-jobs value {other:?}"),
            );
        }
    };

    let store = state.pipeline.store();
    let started_at = store.started_at();
    let jobs: Vec<Job> = store
        .jobs()
        .into_iter()
        .filter(|job| job.status.is_terminal() == wants_terminal)
        .collect();

    let mut resp = IppResponseBuilder::new(STATUS_OK, request.request_id);
    resp.operation_preamble("successful-ok");
    for job in &jobs {
        write_job_group(&mut resp, job, started_at, state);
    }

    debug!(count = jobs.len(), which = %which, "Get-Jobs: returning job list");
    resp.build()
}

/// Handle Get-Printer-Attributes (0x000B).  State attributes are computed
/// from the store on every request.
fn handle_get_printer_attributes(request: &IppRequest, state: &SharedState) -> Vec<u8> {
    let store = state.pipeline.store();
    let busy = store.is_busy();
    let has_ink = store.has_ink();
    let has_paper = store.has_paper();
    let up_time = seconds_since(store.started_at(), Utc::now());
    let queued = i32::try_from(store.active_job_count()).unwrap_or(i32::MAX);

    let printer_uri = state.printer_uri();
    let mut resp = IppResponseBuilder::new(STATUS_OK, request.request_id);
    resp.operation_preamble("successful-ok");

    resp.begin_group(TAG_PRINTER_ATTRIBUTES)
        .uri("printer-uri-supported", &printer_uri)
        .keyword("uri-security-supported", "none")
        .keyword("uri-authentication-supported", "none")
        .name_attr("printer-name", &state.printer_name)
        .text("printer-info", "PrinterSim emulated printer")
        .text("printer-make-and-model", "PrinterSim Virtual Printer")
        .enum_attr(
            "printer-state",
            if busy { PRINTER_STATE_PROCESSING } else { PRINTER_STATE_IDLE },
        );

    let reasons = printer_state_reasons(has_ink, has_paper);
    resp.keyword("printer-state-reasons", reasons[0]);
    for reason in &reasons[1..] {
        resp.keyword_additional(reason);
    }

    resp.boolean("printer-is-accepting-jobs", true)
        .integer("queued-job-count", queued)
        .integer("printer-up-time", up_time)
        .keyword("ipp-versions-supported", "1.1")
        .enum_attr("operations-supported", i32::from(SUPPORTED_OPERATIONS[0]));
    for op in &SUPPORTED_OPERATIONS[1..] {
        resp.enum_additional(i32::from(*op));
    }

    resp.mime_type("document-format-supported", SUPPORTED_FORMATS[0]);
    for format in &SUPPORTED_FORMATS[1..] {
        resp.mime_type_additional(format);
    }

    resp.mime_type("document-format-default", "application/octet-stream")
        .charset("charset-configured", "utf-8")
        .charset("charset-supported", "utf-8")
        .natural_language("natural-language-configured", "en")
        .natural_language("generated-natural-language-supported", "en")
        .keyword("compression-supported", "none")
        .keyword("pdl-override-supported", "not-attempted")
        .boolean("color-supported", false)
        .name_attr("marker-names", "Ink")
        .keyword("marker-types", "ink-cartridge")
        .integer("marker-levels", if has_ink { 100 } else { 0 });

    debug!(busy, has_ink, has_paper, "Get-Printer-Attributes: returning state");
    resp.build()
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn write_job_group(
    resp: &mut IppResponseBuilder,
    job: &Job,
    started_at: DateTime<Utc>,
    state: &SharedState,
) {
    let k_octets = i32::try_from(job.bytes_received.div_ceil(1024)).unwrap_or(i32::MAX);
    resp.begin_group(TAG_JOB_ATTRIBUTES)
        .integer("job-id", job_id_value(job.id))
        .uri("job-uri", &state.job_uri(job.id))
        .uri("job-printer-uri", &state.printer_uri())
        .name_attr("job-name", &job.name)
        .enum_attr("job-state", job_state(job.status))
        .keyword("job-state-reasons", job_state_reason(job.status))
        .integer("job-k-octets", k_octets)
        .integer("time-at-creation", seconds_since(started_at, job.created_at));
    if let Some(completed_at) = job.completed_at {
        resp.integer("time-at-completed", seconds_since(started_at, completed_at));
    }
}

fn job_id_value(id: JobId) -> i32 {
    i32::try_from(id.0).unwrap_or(i32::MAX)
}

/// Seconds between the device coming up and `at`, clamped to the IPP
/// integer range.
fn seconds_since(started_at: DateTime<Utc>, at: DateTime<Utc>) -> i32 {
    let secs = (at - started_at).num_seconds().max(0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

/// Map a ledger status to an IPP job-state value.
fn job_state(status: JobStatus) -> i32 {
    match status {
        JobStatus::Downloading => JOB_STATE_PROCESSING,
        JobStatus::Printed => JOB_STATE_COMPLETED,
        JobStatus::Failed => JOB_STATE_ABORTED,
    }
}

fn job_state_reason(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Downloading => "job-incoming",
        JobStatus::Printed => "job-completed-successfully",
        JobStatus::Failed => "aborted-by-system",
    }
}

/// `printer-state-reasons` for the current consumables (never empty).
fn printer_state_reasons(has_ink: bool, has_paper: bool) -> Vec<&'static str> {
    let mut reasons = Vec::new();
    if !has_ink {
        reasons.push("marker-supply-empty-error");
    }
    if !has_paper {
        reasons.push("media-empty-error");
    }
    if reasons.is_empty() {
        reasons.push("none");
    }
    reasons
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
