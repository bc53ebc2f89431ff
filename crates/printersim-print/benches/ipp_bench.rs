// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for IPP header parsing, response building, chunked
// body decoding and document hashing in the printersim-print crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sha2::{Digest, Sha256};
use tokio::io::BufReader;

use printersim_print::http_body::{BodyFraming, BodyReader};
use printersim_print::ipp_wire::{
    IPP_VERSION_MAJOR, IPP_VERSION_MINOR, IppResponseBuilder, OP_GET_PRINTER_ATTRIBUTES,
    OP_PRINT_JOB, STATUS_OK, TAG_END_OF_ATTRIBUTES, TAG_OPERATION_ATTRIBUTES,
    TAG_PRINTER_ATTRIBUTES, VALUE_TAG_CHARSET, VALUE_TAG_NAME, VALUE_TAG_NATURAL_LANGUAGE,
    parse_ipp_header,
};

fn build_request(
    operation_id: u16,
    request_id: u32,
    attributes: &[(u8, &str, &[u8])],
    document_data: &[u8],
) -> Vec<u8> {
    let mut buf = vec![IPP_VERSION_MAJOR, IPP_VERSION_MINOR];
    buf.extend_from_slice(&operation_id.to_be_bytes());
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.push(TAG_OPERATION_ATTRIBUTES);
    write_attr(&mut buf, VALUE_TAG_CHARSET, "attributes-charset", b"utf-8");
    write_attr(
        &mut buf,
        VALUE_TAG_NATURAL_LANGUAGE,
        "attributes-natural-language",
        b"en",
    );
    for &(tag, name, value) in attributes {
        write_attr(&mut buf, tag, name, value);
    }
    buf.push(TAG_END_OF_ATTRIBUTES);
    buf.extend_from_slice(document_data);
    buf
}

fn write_attr(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) {
    buf.push(value_tag);
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

fn bench_parse_header(c: &mut Criterion) {
    let data = build_request(OP_GET_PRINTER_ATTRIBUTES, 42, &[], &[]);
    c.bench_function("parse_ipp_header (minimal)", |b| {
        b.iter(|| {
            let result = parse_ipp_header(black_box(&data));
            assert!(matches!(result, Ok(Some(_))));
        });
    });

    // The document trailer must not affect header parsing cost.
    let attrs = vec![(VALUE_TAG_NAME, "job-name", b"Benchmark Print Job" as &[u8])];
    let doc = vec![0xABu8; 64 * 1024];
    let data_with_doc = build_request(OP_PRINT_JOB, 100, &attrs, &doc);
    c.bench_function("parse_ipp_header (64 KiB document)", |b| {
        b.iter(|| {
            let result = parse_ipp_header(black_box(&data_with_doc));
            assert!(matches!(result, Ok(Some(_))));
        });
    });
}

fn bench_build_response(c: &mut Criterion) {
    c.bench_function("build_ipp_response (printer attrs)", |b| {
        b.iter(|| {
            let mut builder = IppResponseBuilder::new(black_box(STATUS_OK), black_box(1));
            builder.operation_preamble("successful-ok");
            builder
                .begin_group(TAG_PRINTER_ATTRIBUTES)
                .name_attr("printer-name", "PrinterSim")
                .uri("printer-uri-supported", "ipp://localhost:9100/ipp/printer")
                .enum_attr("printer-state", 3)
                .keyword("printer-state-reasons", "marker-supply-empty-error")
                .keyword_additional("media-empty-error")
                .mime_type("document-format-supported", "application/pdf")
                .mime_type_additional("application/postscript")
                .boolean("printer-is-accepting-jobs", true);
            black_box(builder.build());
        });
    });
}

fn bench_chunked_body(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime");
    let mut encoded = Vec::new();
    for _ in 0..256 {
        encoded.extend_from_slice(b"1000\r\n");
        encoded.extend_from_slice(&[0x42u8; 4096]);
        encoded.extend_from_slice(b"\r\n");
    }
    encoded.extend_from_slice(b"0\r\n\r\n");

    c.bench_function("chunked body decode (1 MiB)", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut body = BodyReader::new(BufReader::new(&encoded[..]), BodyFraming::Chunked);
                let mut buf = [0u8; 8192];
                let mut total = 0usize;
                loop {
                    let n = body.read(&mut buf).await.expect("decode");
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                black_box(total);
            });
        });
    });
}

fn bench_document_hash(c: &mut Criterion) {
    let data = vec![0x42u8; 1024 * 1024];
    c.bench_function("document sha256 (1 MiB)", |b| {
        b.iter(|| {
            let mut hasher = Sha256::new();
            hasher.update(black_box(&data));
            black_box(hasher.finalize());
        });
    });
}

criterion_group!(
    benches,
    bench_parse_header,
    bench_build_response,
    bench_chunked_body,
    bench_document_hash,
);
criterion_main!(benches);
