// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the SNMP codec and the Printer-MIB walk.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use printersim_core::store::DeviceStore;
use printersim_snmp::agent::handle_datagram;
use printersim_snmp::ber::{
    Message, Oid, Pdu, PduKind, VarBind, Version, decode_message, encode_message,
};
use printersim_snmp::printer_mib::PrinterMibResponder;

fn request(kind: PduKind, oid: &str, non_repeaters: i32, max_repetitions: i32) -> Vec<u8> {
    let oid: Oid = oid.parse().expect("valid oid");
    encode_message(&Message {
        version: Version::V2c,
        community: b"public".to_vec(),
        pdu: Pdu {
            kind,
            request_id: 4242,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: vec![VarBind::null(oid)],
        },
    })
}

fn bench_codec(c: &mut Criterion) {
    let datagram = request(PduKind::Get, "1.3.6.1.2.1.43.11.1.1.9.1.1.0", 0, 0);
    c.bench_function("decode_message (GET)", |b| {
        b.iter(|| decode_message(black_box(&datagram)).expect("decodes"));
    });

    let message = decode_message(&datagram).expect("decodes");
    c.bench_function("encode_message (GET)", |b| {
        b.iter(|| black_box(encode_message(black_box(&message))));
    });
}

fn bench_agent(c: &mut Criterion) {
    let store = Arc::new(DeviceStore::new());
    let registry = PrinterMibResponder::with_hostname(store, "bench-host").into_registry();

    let get = request(PduKind::Get, "1.3.6.1.2.1.25.3.5.1.1.0", 0, 0);
    c.bench_function("handle_datagram (GET printer status)", |b| {
        b.iter(|| black_box(handle_datagram(&registry, None, black_box(&get))));
    });

    let bulk = request(PduKind::GetBulk, "1.3.6.1.2.1.43", 0, 20);
    c.bench_function("handle_datagram (GETBULK printer MIB)", |b| {
        b.iter(|| black_box(handle_datagram(&registry, None, black_box(&bulk))));
    });
}

criterion_group!(benches, bench_codec, bench_agent);
criterion_main!(benches);
