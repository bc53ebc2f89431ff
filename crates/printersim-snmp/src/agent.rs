// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-only SNMP agent: a registry of scalar handlers plus the UDP listener
// that answers GET, GETNEXT and GETBULK against it.
//
// Handlers are registered per scalar node and answered at `<node>.0`.  Each
// handler is invoked on every request, so answers always reflect the current
// device state.  SET is answered but never applied.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use printersim_core::error::{PrinterSimError, Result};
use printersim_core::types::ServerStatus;

use crate::ber::{
    ERROR_NO_SUCH_NAME, ERROR_NONE, ERROR_NOT_WRITABLE, ERROR_TOO_BIG, Message, Oid, Pdu,
    PduKind, SnmpValue, VarBind, Version, decode_message, encode_message,
};

/// Largest datagram we accept or send.
const MAX_DATAGRAM: usize = 65_507;

/// Upper bound on varbinds in a single GETBULK response.
const MAX_BULK_VARBINDS: usize = 512;

/// Computes the current value of one scalar.
pub type ScalarHandler = Arc<dyn Fn() -> SnmpValue + Send + Sync>;

// ---------------------------------------------------------------------------
// MibRegistry
// ---------------------------------------------------------------------------

/// Ordered table of scalar instances.
#[derive(Default, Clone)]
pub struct MibRegistry {
    instances: BTreeMap<Oid, ScalarHandler>,
}

impl MibRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a read-only scalar.  The value is served at `node.0`.
    pub fn register_scalar<F>(&mut self, node: Oid, handler: F)
    where
        F: Fn() -> SnmpValue + Send + Sync + 'static,
    {
        let instance = node.child(0);
        debug!(oid = %instance, "scalar registered");
        self.instances.insert(instance, Arc::new(handler));
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Registered instance OIDs, in walk order.
    pub fn oids(&self) -> impl Iterator<Item = &Oid> {
        self.instances.keys()
    }

    /// Exact lookup.  The bare scalar node, or any OID below it other than
    /// its `.0` instance, is `noSuchInstance`; anything else is
    /// `noSuchObject`.
    pub fn get(&self, oid: &Oid) -> SnmpValue {
        if let Some(handler) = self.instances.get(oid) {
            return handler();
        }
        let under_scalar = self
            .instances
            .keys()
            .filter_map(Oid::parent)
            .any(|node| oid.starts_with(&node));
        if under_scalar {
            SnmpValue::NoSuchInstance
        } else {
            SnmpValue::NoSuchObject
        }
    }

    /// The first instance strictly after `oid`, with its current value.
    pub fn next(&self, oid: &Oid) -> Option<(Oid, SnmpValue)> {
        self.instances
            .range((Bound::Excluded(oid), Bound::Unbounded))
            .next()
            .map(|(next, handler)| (next.clone(), handler()))
    }

    fn next_varbind(&self, oid: &Oid) -> VarBind {
        match self.next(oid) {
            Some((next, value)) => VarBind::new(next, value),
            None => VarBind::new(oid.clone(), SnmpValue::EndOfMibView),
        }
    }
}

impl std::fmt::Debug for MibRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MibRegistry")
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Request processing
// ---------------------------------------------------------------------------

/// Answer one decoded request.  `None` means the message is dropped
/// (wrong community, or a PDU an agent never answers).
pub fn respond(registry: &MibRegistry, community: Option<&str>, request: &Message) -> Option<Message> {
    if let Some(expected) = community {
        if request.community != expected.as_bytes() {
            debug!(
                community = %String::from_utf8_lossy(&request.community),
                "dropping request with wrong community"
            );
            return None;
        }
    }

    let pdu = &request.pdu;
    let (error_status, error_index, varbinds) = match (pdu.kind, request.version) {
        (PduKind::Get, version) => answer_get(registry, version, &pdu.varbinds),
        (PduKind::GetNext, version) => answer_get_next(registry, version, &pdu.varbinds),
        (PduKind::GetBulk, Version::V2c) => (
            ERROR_NONE,
            0,
            answer_get_bulk(registry, pdu.error_status, pdu.error_index, &pdu.varbinds),
        ),
        (PduKind::Set, version) => {
            let status = match version {
                Version::V1 => ERROR_NO_SUCH_NAME,
                Version::V2c => ERROR_NOT_WRITABLE,
            };
            debug!(varbinds = pdu.varbinds.len(), "SET refused: all objects are read-only");
            let index = if pdu.varbinds.is_empty() { 0 } else { 1 };
            (status, index, pdu.varbinds.clone())
        }
        (PduKind::GetBulk, Version::V1) | (PduKind::Response, _) => {
            debug!(kind = ?pdu.kind, version = ?request.version, "ignoring PDU");
            return None;
        }
    };

    Some(Message {
        version: request.version,
        community: request.community.clone(),
        pdu: Pdu {
            kind: PduKind::Response,
            request_id: pdu.request_id,
            error_status,
            error_index,
            varbinds,
        },
    })
}

/// v1 reports the first missing name as `noSuchName` with the request
/// varbinds echoed; v2c carries exceptions inline.
fn v1_error(requested: &[VarBind], answered: &[VarBind]) -> Option<(i32, i32, Vec<VarBind>)> {
    let position = answered.iter().position(|vb| vb.value.is_exception())?;
    let index = i32::try_from(position + 1).unwrap_or(i32::MAX);
    Some((ERROR_NO_SUCH_NAME, index, requested.to_vec()))
}

fn answer_get(registry: &MibRegistry, version: Version, requested: &[VarBind]) -> (i32, i32, Vec<VarBind>) {
    let answered: Vec<VarBind> = requested
        .iter()
        .map(|vb| VarBind::new(vb.oid.clone(), registry.get(&vb.oid)))
        .collect();
    if version == Version::V1 {
        if let Some(error) = v1_error(requested, &answered) {
            return error;
        }
    }
    (ERROR_NONE, 0, answered)
}

fn answer_get_next(
    registry: &MibRegistry,
    version: Version,
    requested: &[VarBind],
) -> (i32, i32, Vec<VarBind>) {
    let answered: Vec<VarBind> = requested
        .iter()
        .map(|vb| registry.next_varbind(&vb.oid))
        .collect();
    if version == Version::V1 {
        if let Some(error) = v1_error(requested, &answered) {
            return error;
        }
    }
    (ERROR_NONE, 0, answered)
}

/// GETBULK (RFC 3416 SS4.2.3).  The first `non_repeaters` varbinds get one
/// GETNEXT each; the rest are walked `max_repetitions` times, stopping early
/// once every repeater has reached the end of the view.
fn answer_get_bulk(
    registry: &MibRegistry,
    non_repeaters: i32,
    max_repetitions: i32,
    requested: &[VarBind],
) -> Vec<VarBind> {
    let non_repeaters = usize::try_from(non_repeaters.max(0))
        .unwrap_or(0)
        .min(requested.len());
    let max_repetitions = usize::try_from(max_repetitions.max(0)).unwrap_or(0);
    let (singles, repeaters) = requested.split_at(non_repeaters);

    let mut out: Vec<VarBind> = singles
        .iter()
        .map(|vb| registry.next_varbind(&vb.oid))
        .collect();

    let mut cursors: Vec<Oid> = repeaters.iter().map(|vb| vb.oid.clone()).collect();
    for _ in 0..max_repetitions {
        if cursors.is_empty() || out.len() + cursors.len() > MAX_BULK_VARBINDS {
            break;
        }
        let mut all_done = true;
        for cursor in &mut cursors {
            let vb = registry.next_varbind(cursor);
            if vb.value != SnmpValue::EndOfMibView {
                all_done = false;
            }
            cursor.clone_from(&vb.oid);
            out.push(vb);
        }
        if all_done {
            break;
        }
    }
    out
}

/// Decode, answer, and encode one datagram.
pub fn handle_datagram(registry: &MibRegistry, community: Option<&str>, datagram: &[u8]) -> Option<Vec<u8>> {
    let request = match decode_message(datagram) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, bytes = datagram.len(), "dropping undecodable datagram");
            return None;
        }
    };
    let response = respond(registry, community, &request)?;
    let encoded = encode_message(&response);
    if encoded.len() <= MAX_DATAGRAM {
        return Some(encoded);
    }

    warn!(bytes = encoded.len(), "SNMP response too big");
    let too_big = Message {
        pdu: Pdu {
            error_status: ERROR_TOO_BIG,
            error_index: 0,
            varbinds: request.pdu.varbinds,
            ..response.pdu
        },
        ..response
    };
    Some(encode_message(&too_big))
}

// ---------------------------------------------------------------------------
// SnmpAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SnmpAgentConfig {
    pub bind_addr: SocketAddr,
    /// Community to enforce; `None` answers any.
    pub community: Option<String>,
}

impl SnmpAgentConfig {
    pub fn from_sim_config(config: &printersim_core::SimConfig) -> Self {
        Self {
            bind_addr: config.snmp_addr(),
            community: config.community.clone(),
        }
    }
}

/// UDP listener serving a [`MibRegistry`].
pub struct SnmpAgent {
    config: SnmpAgentConfig,
    registry: Arc<MibRegistry>,
    local_addr: Option<SocketAddr>,
    status: ServerStatus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
}

impl SnmpAgent {
    pub fn new(config: SnmpAgentConfig, registry: MibRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            local_addr: None,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Bind the UDP socket and spawn the receive loop.
    pub async fn start(&mut self) -> Result<()> {
        if self.status == ServerStatus::Running {
            return Ok(());
        }
        self.status = ServerStatus::Starting;

        let bind_addr = self.config.bind_addr;
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(source) => {
                self.status = ServerStatus::Error;
                return Err(PrinterSimError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };
        let local_addr = socket.local_addr()?;
        self.local_addr = Some(local_addr);
        info!(
            addr = %local_addr,
            scalars = self.registry.len(),
            community_check = self.config.community.is_some(),
            "SNMP agent ready"
        );

        let registry = Arc::clone(&self.registry);
        let community = self.config.community.clone();
        let shutdown = Arc::clone(&self.shutdown_signal);
        self.task_handle = Some(tokio::spawn(async move {
            Self::receive_loop(socket, registry, community, shutdown).await;
        }));
        self.status = ServerStatus::Running;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }
        info!(addr = ?self.local_addr, "stopping SNMP agent");
        self.shutdown_signal.notify_one();
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| PrinterSimError::Transport(format!("SNMP task join: {e}")))?;
        }
        self.status = ServerStatus::Stopped;
        Ok(())
    }

    async fn receive_loop(
        socket: UdpSocket,
        registry: Arc<MibRegistry>,
        community: Option<String>,
        shutdown: Arc<Notify>,
    ) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("SNMP receive loop received shutdown signal");
                    break;
                }

                received = socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(error = %e, "SNMP receive failed");
                            continue;
                        }
                    };
                    let Some(reply) = handle_datagram(&registry, community.as_deref(), &buf[..len]) else {
                        continue;
                    };
                    if let Err(e) = socket.send_to(&reply, peer).await {
                        warn!(peer = %peer, error = %e, "SNMP send failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    use super::*;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn registry() -> MibRegistry {
        let mut registry = MibRegistry::new();
        registry.register_scalar(oid("1.3.6.1.2.1.1.5"), || SnmpValue::string("host"));
        registry.register_scalar(oid("1.3.6.1.2.1.25.3.2.1.5"), || SnmpValue::Integer(2));
        registry.register_scalar(oid("1.3.6.1.2.1.43.99.1"), || SnmpValue::string("0"));
        registry
    }

    fn request(version: Version, kind: PduKind, oids: &[&str]) -> Message {
        Message {
            version,
            community: b"public".to_vec(),
            pdu: Pdu {
                kind,
                request_id: 77,
                error_status: 0,
                error_index: 0,
                varbinds: oids.iter().map(|s| VarBind::null(oid(s))).collect(),
            },
        }
    }

    #[test]
    fn get_answers_scalar_instances_only() {
        let reg = registry();
        assert_eq!(reg.get(&oid("1.3.6.1.2.1.1.5.0")), SnmpValue::string("host"));
        assert_eq!(reg.get(&oid("1.3.6.1.2.1.1.5")), SnmpValue::NoSuchInstance);
        assert_eq!(reg.get(&oid("1.3.6.1.2.1.1.5.1")), SnmpValue::NoSuchInstance);
        assert_eq!(reg.get(&oid("1.3.6.1.4.1")), SnmpValue::NoSuchObject);
    }

    #[test]
    fn handlers_run_on_every_query() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut reg = MibRegistry::new();
        let c = Arc::clone(&counter);
        reg.register_scalar(oid("1.3.6.1.2.1.1.3"), move || {
            SnmpValue::Integer(c.fetch_add(1, Ordering::SeqCst))
        });

        let instance = oid("1.3.6.1.2.1.1.3.0");
        assert_eq!(reg.get(&instance), SnmpValue::Integer(0));
        assert_eq!(reg.get(&instance), SnmpValue::Integer(1));
    }

    #[test]
    fn get_next_walks_in_oid_order_then_ends() {
        let reg = registry();
        let mut cursor = oid("1.3.6.1");
        let mut visited = Vec::new();
        while let Some((next, _)) = reg.next(&cursor) {
            visited.push(next.to_string());
            cursor = next;
        }
        assert_eq!(
            visited,
            ["1.3.6.1.2.1.1.5.0", "1.3.6.1.2.1.25.3.2.1.5.0", "1.3.6.1.2.1.43.99.1.0"]
        );

        let reply = respond(&reg, None, &request(Version::V2c, PduKind::GetNext, &["1.3.6.1.2.1.43.99.1.0"]))
            .unwrap();
        assert_eq!(reply.pdu.varbinds[0].value, SnmpValue::EndOfMibView);
    }

    #[test]
    fn v1_reports_no_such_name() {
        let reg = registry();
        let req = request(Version::V1, PduKind::Get, &["1.3.6.1.2.1.1.5.0", "1.3.6.1.9.9.0"]);

        let reply = respond(&reg, None, &req).unwrap();

        assert_eq!(reply.pdu.kind, PduKind::Response);
        assert_eq!(reply.pdu.request_id, 77);
        assert_eq!(reply.pdu.error_status, ERROR_NO_SUCH_NAME);
        assert_eq!(reply.pdu.error_index, 2);
        assert_eq!(reply.pdu.varbinds, req.pdu.varbinds);
    }

    #[test]
    fn v2c_carries_exceptions_inline() {
        let reg = registry();
        let req = request(Version::V2c, PduKind::Get, &["1.3.6.1.2.1.1.5.0", "1.3.6.1.9.9.0"]);

        let reply = respond(&reg, None, &req).unwrap();

        assert_eq!(reply.pdu.error_status, ERROR_NONE);
        assert_eq!(reply.pdu.varbinds[0].value, SnmpValue::string("host"));
        assert_eq!(reply.pdu.varbinds[1].value, SnmpValue::NoSuchObject);
    }

    #[test]
    fn get_bulk_repeats_and_stops_at_end_of_view() {
        let reg = registry();
        let mut req = request(
            Version::V2c,
            PduKind::GetBulk,
            &["1.3.6.1.2.1.1", "1.3.6.1.2.1.25"],
        );
        req.pdu.error_status = 1; // non-repeaters
        req.pdu.error_index = 10; // max-repetitions

        let reply = respond(&reg, None, &req).unwrap();
        let oids: Vec<String> = reply.pdu.varbinds.iter().map(|vb| vb.oid.to_string()).collect();

        assert_eq!(
            oids,
            [
                "1.3.6.1.2.1.1.5.0",
                "1.3.6.1.2.1.25.3.2.1.5.0",
                "1.3.6.1.2.1.43.99.1.0",
                "1.3.6.1.2.1.43.99.1.0",
            ]
        );
        assert_eq!(reply.pdu.varbinds[3].value, SnmpValue::EndOfMibView);
    }

    #[test]
    fn set_is_refused() {
        let reg = registry();
        let v2 = respond(&reg, None, &request(Version::V2c, PduKind::Set, &["1.3.6.1.2.1.1.5.0"])).unwrap();
        assert_eq!(v2.pdu.error_status, ERROR_NOT_WRITABLE);
        assert_eq!(v2.pdu.error_index, 1);

        let v1 = respond(&reg, None, &request(Version::V1, PduKind::Set, &["1.3.6.1.2.1.1.5.0"])).unwrap();
        assert_eq!(v1.pdu.error_status, ERROR_NO_SUCH_NAME);
        assert_eq!(reg.get(&oid("1.3.6.1.2.1.1.5.0")), SnmpValue::string("host"));
    }

    #[test]
    fn community_is_enforced_when_configured() {
        let reg = registry();
        let req = request(Version::V2c, PduKind::Get, &["1.3.6.1.2.1.1.5.0"]);
        assert!(respond(&reg, Some("public"), &req).is_some());
        assert!(respond(&reg, Some("secret"), &req).is_none());
        assert!(respond(&reg, None, &req).is_some());
    }

    #[test]
    fn garbage_and_responses_are_dropped() {
        let reg = registry();
        assert!(handle_datagram(&reg, None, b"not snmp").is_none());
        let stray = request(Version::V2c, PduKind::Response, &["1.3.6.1.2.1.1.5.0"]);
        assert!(handle_datagram(&reg, None, &encode_message(&stray)).is_none());
    }

    #[tokio::test]
    async fn answers_over_udp() {
        let mut agent = SnmpAgent::new(
            SnmpAgentConfig {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                community: None,
            },
            registry(),
        );
        agent.start().await.unwrap();
        assert_eq!(agent.status(), ServerStatus::Running);
        let addr = agent.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let req = request(Version::V2c, PduKind::Get, &["1.3.6.1.2.1.25.3.2.1.5.0"]);
        client.send_to(&encode_message(&req), addr).await.unwrap();

        let mut buf = vec![0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("reply within timeout")
            .unwrap();
        let reply = decode_message(&buf[..len]).unwrap();
        assert_eq!(reply.pdu.varbinds[0].value, SnmpValue::Integer(2));

        agent.stop().await.unwrap();
        assert_eq!(agent.status(), ServerStatus::Stopped);
    }
}
