// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer-MIB (RFC 3805) and Host-Resources (RFC 2790) projection of the
// device state.
//
// Only the handful of scalars that drivers and monitoring tools poll are
// exposed.  Every value is read from the store at query time; nothing here
// writes to it.

use std::sync::Arc;

use tracing::{debug, warn};

use printersim_core::store::DeviceStore;

use crate::agent::MibRegistry;
use crate::ber::{Oid, SnmpValue};

/// sysName
pub const SYS_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 5];
/// hrDeviceStatus
pub const HR_DEVICE_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 2, 1, 5];
/// hrPrinterStatus
pub const HR_PRINTER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 5, 1, 1];
/// prtInputCurrentLevel.1.1
pub const PRT_INPUT_CURRENT_LEVEL: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 8, 2, 1, 10, 1, 1];
/// prtInputName.1.1
pub const PRT_INPUT_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 8, 2, 1, 18, 1, 1];
/// prtMarkerSuppliesDescription.1.1
pub const PRT_MARKER_SUPPLIES_DESCRIPTION: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 6, 1, 1];
/// prtMarkerSuppliesLevel.1.1
pub const PRT_MARKER_SUPPLIES_LEVEL: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 9, 1, 1];
/// prtAlertTable entry; slots 1..=8 hang below it.
pub const PRT_ALERT_ENTRY: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 18, 1, 1];
/// Last node of the view; walks end here.
pub const END_OF_VIEW: &[u32] = &[1, 3, 6, 1, 2, 1, 43, 99, 1, 1, 9, 1];

pub const ALERT_SLOTS: u32 = 8;

/// hrDeviceStatus running(2).
pub const DEVICE_STATUS_RUNNING: i32 = 2;
/// hrPrinterStatus idle(3).
pub const PRINTER_STATUS_IDLE: i32 = 3;
/// hrPrinterStatus printing(4).
pub const PRINTER_STATUS_PRINTING: i32 = 4;
/// prtMarkerSuppliesLevel when the cartridge is full.
pub const MARKER_LEVEL_FULL: i32 = 100;
/// prtInputCurrentLevel "at least one unit remains" (-3).
pub const INPUT_LEVEL_SOME_REMAINING: i32 = -3;

/// Binds the fixed node set to a [`DeviceStore`].
#[derive(Debug, Clone)]
pub struct PrinterMibResponder {
    store: Arc<DeviceStore>,
    hostname: String,
}

impl PrinterMibResponder {
    /// Resolves the host name once; it never changes for the process.
    pub fn new(store: Arc<DeviceStore>) -> Self {
        let hostname = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(error = %e, "could not resolve host name for sysName");
                "printersim".into()
            }
        };
        Self::with_hostname(store, hostname)
    }

    pub fn with_hostname(store: Arc<DeviceStore>, hostname: impl Into<String>) -> Self {
        Self {
            store,
            hostname: hostname.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn printer_status(&self) -> i32 {
        if self.store.is_busy() {
            PRINTER_STATUS_PRINTING
        } else {
            PRINTER_STATUS_IDLE
        }
    }

    pub fn marker_level(&self) -> i32 {
        if self.store.has_ink() { MARKER_LEVEL_FULL } else { 0 }
    }

    pub fn input_level(&self) -> i32 {
        if self.store.has_paper() {
            INPUT_LEVEL_SOME_REMAINING
        } else {
            0
        }
    }

    /// Register every node on `registry`.
    pub fn register(&self, registry: &mut MibRegistry) {
        let hostname = self.hostname.clone();
        registry.register_scalar(Oid::from(SYS_NAME), move || SnmpValue::string(hostname.as_str()));

        registry.register_scalar(Oid::from(HR_DEVICE_STATUS), || {
            SnmpValue::Integer(DEVICE_STATUS_RUNNING)
        });

        let this = self.clone();
        registry.register_scalar(Oid::from(HR_PRINTER_STATUS), move || {
            SnmpValue::Integer(this.printer_status())
        });

        let this = self.clone();
        registry.register_scalar(Oid::from(PRT_INPUT_CURRENT_LEVEL), move || {
            SnmpValue::Integer(this.input_level())
        });
        registry.register_scalar(Oid::from(PRT_INPUT_NAME), || SnmpValue::string("Input Tray"));

        registry.register_scalar(Oid::from(PRT_MARKER_SUPPLIES_DESCRIPTION), || {
            SnmpValue::string("Ink")
        });
        let this = self.clone();
        registry.register_scalar(Oid::from(PRT_MARKER_SUPPLIES_LEVEL), move || {
            SnmpValue::Integer(this.marker_level())
        });

        let alert_entry = Oid::from(PRT_ALERT_ENTRY);
        for slot in 1..=ALERT_SLOTS {
            registry.register_scalar(alert_entry.child(slot), || SnmpValue::string("0"));
        }

        registry.register_scalar(Oid::from(END_OF_VIEW), || SnmpValue::string("0"));

        debug!(nodes = registry.len(), hostname = %self.hostname, "printer MIB registered");
    }

    /// A registry holding only the printer nodes.
    pub fn into_registry(self) -> MibRegistry {
        let mut registry = MibRegistry::new();
        self.register(&mut registry);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::respond;
    use crate::ber::{Message, Pdu, PduKind, VarBind, Version};

    fn instance(node: &[u32]) -> Oid {
        Oid::from(node).child(0)
    }

    fn setup() -> (Arc<DeviceStore>, MibRegistry) {
        let store = Arc::new(DeviceStore::new());
        let registry = PrinterMibResponder::with_hostname(Arc::clone(&store), "test-host").into_registry();
        (store, registry)
    }

    #[test]
    fn fixed_nodes_answer_at_scalar_instances() {
        let (_store, reg) = setup();
        assert_eq!(reg.get(&instance(SYS_NAME)), SnmpValue::string("test-host"));
        assert_eq!(reg.get(&instance(HR_DEVICE_STATUS)), SnmpValue::Integer(2));
        assert_eq!(reg.get(&instance(PRT_INPUT_NAME)), SnmpValue::string("Input Tray"));
        assert_eq!(
            reg.get(&instance(PRT_MARKER_SUPPLIES_DESCRIPTION)),
            SnmpValue::string("Ink")
        );
        for slot in 1..=ALERT_SLOTS {
            let oid = Oid::from(PRT_ALERT_ENTRY).child(slot).child(0);
            assert_eq!(reg.get(&oid), SnmpValue::string("0"), "alert slot {slot}");
        }
        assert_eq!(reg.get(&instance(END_OF_VIEW)), SnmpValue::string("0"));
    }

    #[test]
    fn consumable_levels_follow_the_store() {
        let (store, reg) = setup();
        assert_eq!(reg.get(&instance(PRT_MARKER_SUPPLIES_LEVEL)), SnmpValue::Integer(100));
        assert_eq!(reg.get(&instance(PRT_INPUT_CURRENT_LEVEL)), SnmpValue::Integer(-3));

        store.set_consumables(false, true);
        assert_eq!(reg.get(&instance(PRT_MARKER_SUPPLIES_LEVEL)), SnmpValue::Integer(0));
        assert_eq!(reg.get(&instance(PRT_INPUT_CURRENT_LEVEL)), SnmpValue::Integer(-3));

        store.set_consumables(true, false);
        assert_eq!(reg.get(&instance(PRT_INPUT_CURRENT_LEVEL)), SnmpValue::Integer(0));
    }

    #[test]
    fn printer_status_follows_busy_flag() {
        let (store, reg) = setup();
        let oid = instance(HR_PRINTER_STATUS);
        assert_eq!(reg.get(&oid), SnmpValue::Integer(PRINTER_STATUS_IDLE));

        let job = store.begin_job("doc".into(), None);
        assert_eq!(reg.get(&oid), SnmpValue::Integer(PRINTER_STATUS_PRINTING));

        store.complete_job(job.id, "printjobs/job-1.ps".into(), String::new()).unwrap();
        assert_eq!(reg.get(&oid), SnmpValue::Integer(PRINTER_STATUS_IDLE));
    }

    #[test]
    fn queries_never_touch_the_store() {
        let (store, reg) = setup();
        store.begin_job("doc".into(), None);
        let before = store.snapshot();
        for oid in reg.oids().cloned().collect::<Vec<_>>() {
            reg.get(&oid);
        }
        assert_eq!(store.snapshot(), before);
        assert!(store.is_busy());
    }

    #[test]
    fn printer_mib_walk_ends_on_sentinel() {
        let (_store, reg) = setup();
        let mut cursor = Oid::from(&[1u32, 3, 6, 1, 2, 1, 43][..]);
        let mut walked = Vec::new();

        loop {
            let request = Message {
                version: Version::V2c,
                community: b"public".to_vec(),
                pdu: Pdu {
                    kind: PduKind::GetNext,
                    request_id: 1,
                    error_status: 0,
                    error_index: 0,
                    varbinds: vec![VarBind::null(cursor.clone())],
                },
            };
            let reply = respond(&reg, None, &request).unwrap();
            let vb = reply.pdu.varbinds.into_iter().next().unwrap();
            if vb.value == SnmpValue::EndOfMibView {
                break;
            }
            walked.push(vb.oid.clone());
            cursor = vb.oid;
        }

        assert_eq!(walked.len(), 4 + ALERT_SLOTS as usize + 1);
        assert!(walked.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(walked.first(), Some(&instance(PRT_INPUT_CURRENT_LEVEL)));
        assert_eq!(walked.last(), Some(&instance(END_OF_VIEW)));
    }
}
