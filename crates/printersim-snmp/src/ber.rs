// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// BER codec for SNMPv1 (RFC 1157) and SNMPv2c (RFC 1901, RFC 3416) messages.
//
// Only the definite-length subset of X.690 that SNMP uses is supported:
//
// ```text
// Message ::= SEQUENCE {
//     version   INTEGER { v1(0), v2c(1) },
//     community OCTET STRING,
//     data      PDU
// }
// PDU ::= [tag] IMPLICIT SEQUENCE {
//     request-id   INTEGER,
//     error-status INTEGER,   -- non-repeaters for GetBulk
//     error-index  INTEGER,   -- max-repetitions for GetBulk
//     variable-bindings SEQUENCE OF SEQUENCE { name OID, value ANY }
// }
// ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// -- Universal and application tags ------------------------------------------

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OBJECT_ID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_IP_ADDRESS: u8 = 0x40;
pub const TAG_COUNTER32: u8 = 0x41;
pub const TAG_GAUGE32: u8 = 0x42;
pub const TAG_TIME_TICKS: u8 = 0x43;
pub const TAG_COUNTER64: u8 = 0x46;

// -- v2c exception values (RFC 3416 SS3) --------------------------------------

pub const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub const TAG_END_OF_MIB_VIEW: u8 = 0x82;

// -- PDU tags ------------------------------------------------------------------

pub const PDU_GET: u8 = 0xA0;
pub const PDU_GET_NEXT: u8 = 0xA1;
pub const PDU_RESPONSE: u8 = 0xA2;
pub const PDU_SET: u8 = 0xA3;
pub const PDU_GET_BULK: u8 = 0xA5;

// -- error-status values -------------------------------------------------------

pub const ERROR_NONE: i32 = 0;
pub const ERROR_TOO_BIG: i32 = 1;
pub const ERROR_NO_SUCH_NAME: i32 = 2;
pub const ERROR_NOT_WRITABLE: i32 = 17;

/// Reasons a datagram could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BerError {
    #[error("message truncated")]
    Truncated,

    #[error("expected tag 0x{expected:02X}, found 0x{found:02X}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("unsupported length encoding")]
    BadLength,

    #[error("integer does not fit the target type")]
    IntegerOverflow,

    #[error("malformed object identifier")]
    BadOid,

    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),

    #[error("unsupported PDU type 0x{0:02X}")]
    UnsupportedPdu(u8),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

// ---------------------------------------------------------------------------
// Object identifiers
// ---------------------------------------------------------------------------

/// An object identifier.  The derived ordering is the lexicographic ordering
/// SNMP walks use.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: impl Into<Vec<u32>>) -> Self {
        Self(arcs.into())
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// This OID with one more arc appended.
    pub fn child(&self, arc: u32) -> Self {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Self(arcs)
    }

    /// The OID without its last arc.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self(arcs.to_vec())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = BerError;

    /// Parse dotted notation, with or without a leading dot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix('.').unwrap_or(s);
        if s.is_empty() {
            return Err(BerError::BadOid);
        }
        s.split('.')
            .map(|arc| arc.parse::<u32>().map_err(|_| BerError::BadOid))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

// ---------------------------------------------------------------------------
// Values and PDUs
// ---------------------------------------------------------------------------

/// A variable-binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i32),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::OctetString(value.into().into_bytes())
    }

    /// Whether this is one of the v2c exception markers.
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: SnmpValue) -> Self {
        Self { oid, value }
    }

    pub fn null(oid: Oid) -> Self {
        Self::new(oid, SnmpValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2c,
}

impl Version {
    fn wire(self) -> i64 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    Get,
    GetNext,
    Response,
    Set,
    GetBulk,
}

impl PduKind {
    fn from_tag(tag: u8) -> Result<Self, BerError> {
        match tag {
            PDU_GET => Ok(Self::Get),
            PDU_GET_NEXT => Ok(Self::GetNext),
            PDU_RESPONSE => Ok(Self::Response),
            PDU_SET => Ok(Self::Set),
            PDU_GET_BULK => Ok(Self::GetBulk),
            other => Err(BerError::UnsupportedPdu(other)),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Get => PDU_GET,
            Self::GetNext => PDU_GET_NEXT,
            Self::Response => PDU_RESPONSE,
            Self::Set => PDU_SET,
            Self::GetBulk => PDU_GET_BULK,
        }
    }
}

/// A protocol data unit.  For GetBulk, `error_status` carries
/// non-repeaters and `error_index` carries max-repetitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: Version,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode one SNMP message occupying the whole datagram.
pub fn decode_message(data: &[u8]) -> Result<Message, BerError> {
    let mut outer = Reader::new(data);
    let body = outer.expect(TAG_SEQUENCE)?;
    if !outer.is_empty() {
        return Err(BerError::TrailingBytes(outer.remaining()));
    }

    let mut r = Reader::new(body);
    let version = match decode_integer(r.expect(TAG_INTEGER)?)? {
        0 => Version::V1,
        1 => Version::V2c,
        other => return Err(BerError::UnsupportedVersion(other)),
    };
    let community = r.expect(TAG_OCTET_STRING)?.to_vec();

    let (tag, pdu_body) = r.any()?;
    let kind = PduKind::from_tag(tag)?;

    let mut p = Reader::new(pdu_body);
    let request_id = decode_i32(p.expect(TAG_INTEGER)?)?;
    let error_status = decode_i32(p.expect(TAG_INTEGER)?)?;
    let error_index = decode_i32(p.expect(TAG_INTEGER)?)?;

    let mut list = Reader::new(p.expect(TAG_SEQUENCE)?);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = Reader::new(list.expect(TAG_SEQUENCE)?);
        let oid = decode_oid(vb.expect(TAG_OBJECT_ID)?)?;
        let (value_tag, value) = vb.any()?;
        varbinds.push(VarBind::new(oid, decode_value(value_tag, value)?));
    }

    Ok(Message {
        version,
        community,
        pdu: Pdu {
            kind,
            request_id,
            error_status,
            error_index,
            varbinds,
        },
    })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn byte(&mut self) -> Result<u8, BerError> {
        let b = *self.data.get(self.pos).ok_or(BerError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> Result<usize, BerError> {
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        if count == 0 || count > 4 {
            return Err(BerError::BadLength);
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | usize::from(self.byte()?);
        }
        Ok(len)
    }

    /// Next TLV, whatever its tag.
    fn any(&mut self) -> Result<(u8, &'a [u8]), BerError> {
        let tag = self.byte()?;
        let len = self.length()?;
        let end = self.pos.checked_add(len).ok_or(BerError::BadLength)?;
        let value = self.data.get(self.pos..end).ok_or(BerError::Truncated)?;
        self.pos = end;
        Ok((tag, value))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], BerError> {
        let (found, value) = self.any()?;
        if found != expected {
            return Err(BerError::UnexpectedTag { expected, found });
        }
        Ok(value)
    }
}

fn decode_integer(bytes: &[u8]) -> Result<i64, BerError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | i64::from(b);
    }
    Ok(value)
}

fn decode_i32(bytes: &[u8]) -> Result<i32, BerError> {
    i32::try_from(decode_integer(bytes)?).map_err(|_| BerError::IntegerOverflow)
}

fn decode_unsigned(bytes: &[u8]) -> Result<u64, BerError> {
    // One leading zero octet is allowed so the high bit stays clear.
    let bytes = match bytes {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

fn decode_u32(bytes: &[u8]) -> Result<u32, BerError> {
    u32::try_from(decode_unsigned(bytes)?).map_err(|_| BerError::IntegerOverflow)
}

fn decode_oid(bytes: &[u8]) -> Result<Oid, BerError> {
    let Some((&first, rest)) = bytes.split_first() else {
        return Err(BerError::BadOid);
    };
    let mut arcs = vec![u32::from(first / 40).min(2), 0];
    arcs[1] = u32::from(first) - arcs[0] * 40;

    let mut acc: u32 = 0;
    let mut pending = false;
    for &b in rest {
        acc = acc
            .checked_mul(128)
            .and_then(|v| v.checked_add(u32::from(b & 0x7F)))
            .ok_or(BerError::BadOid)?;
        if b & 0x80 == 0 {
            arcs.push(acc);
            acc = 0;
            pending = false;
        } else {
            pending = true;
        }
    }
    if pending {
        return Err(BerError::BadOid);
    }
    Ok(Oid(arcs))
}

fn decode_value(tag: u8, bytes: &[u8]) -> Result<SnmpValue, BerError> {
    Ok(match tag {
        TAG_INTEGER => SnmpValue::Integer(decode_i32(bytes)?),
        TAG_OCTET_STRING => SnmpValue::OctetString(bytes.to_vec()),
        TAG_NULL => SnmpValue::Null,
        TAG_OBJECT_ID => SnmpValue::ObjectId(decode_oid(bytes)?),
        TAG_IP_ADDRESS => {
            let octets: [u8; 4] = bytes.try_into().map_err(|_| BerError::Truncated)?;
            SnmpValue::IpAddress(octets)
        }
        TAG_COUNTER32 => SnmpValue::Counter32(decode_u32(bytes)?),
        TAG_GAUGE32 => SnmpValue::Gauge32(decode_u32(bytes)?),
        TAG_TIME_TICKS => SnmpValue::TimeTicks(decode_u32(bytes)?),
        TAG_COUNTER64 => SnmpValue::Counter64(decode_unsigned(bytes)?),
        TAG_NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
        // Unknown application types are carried as opaque strings.
        _ => SnmpValue::OctetString(bytes.to_vec()),
    })
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encode a message into a datagram.
pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    write_tlv(&mut body, TAG_INTEGER, &encode_integer(message.version.wire()));
    write_tlv(&mut body, TAG_OCTET_STRING, &message.community);
    write_tlv(&mut body, message.pdu.kind.tag(), &encode_pdu(&message.pdu));

    let mut out = Vec::with_capacity(body.len() + 4);
    write_tlv(&mut out, TAG_SEQUENCE, &body);
    out
}

fn encode_pdu(pdu: &Pdu) -> Vec<u8> {
    let mut list = Vec::new();
    for vb in &pdu.varbinds {
        let mut entry = Vec::new();
        write_tlv(&mut entry, TAG_OBJECT_ID, &encode_oid(&vb.oid));
        encode_value(&mut entry, &vb.value);
        write_tlv(&mut list, TAG_SEQUENCE, &entry);
    }

    let mut body = Vec::with_capacity(list.len() + 16);
    write_tlv(&mut body, TAG_INTEGER, &encode_integer(i64::from(pdu.request_id)));
    write_tlv(&mut body, TAG_INTEGER, &encode_integer(i64::from(pdu.error_status)));
    write_tlv(&mut body, TAG_INTEGER, &encode_integer(i64::from(pdu.error_index)));
    write_tlv(&mut body, TAG_SEQUENCE, &list);
    body
}

fn encode_value(out: &mut Vec<u8>, value: &SnmpValue) {
    match value {
        SnmpValue::Integer(v) => write_tlv(out, TAG_INTEGER, &encode_integer(i64::from(*v))),
        SnmpValue::OctetString(bytes) => write_tlv(out, TAG_OCTET_STRING, bytes),
        SnmpValue::Null => write_tlv(out, TAG_NULL, &[]),
        SnmpValue::ObjectId(oid) => write_tlv(out, TAG_OBJECT_ID, &encode_oid(oid)),
        SnmpValue::IpAddress(octets) => write_tlv(out, TAG_IP_ADDRESS, octets),
        SnmpValue::Counter32(v) => write_tlv(out, TAG_COUNTER32, &encode_unsigned(u64::from(*v))),
        SnmpValue::Gauge32(v) => write_tlv(out, TAG_GAUGE32, &encode_unsigned(u64::from(*v))),
        SnmpValue::TimeTicks(v) => write_tlv(out, TAG_TIME_TICKS, &encode_unsigned(u64::from(*v))),
        SnmpValue::Counter64(v) => write_tlv(out, TAG_COUNTER64, &encode_unsigned(*v)),
        SnmpValue::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
        SnmpValue::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
        SnmpValue::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
    }
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    let len = value.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = (len as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (4 - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(value);
}

/// Minimal two's-complement encoding.
fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

fn encode_oid(oid: &Oid) -> Vec<u8> {
    let arcs = oid.arcs();
    let mut out = Vec::with_capacity(arcs.len() + 2);
    let (first, rest) = match arcs {
        [] => (0, &[][..]),
        [a] => (a.saturating_mul(40), &[][..]),
        [a, b, rest @ ..] => (a.saturating_mul(40).saturating_add(*b), rest),
    };
    push_base128(&mut out, first);
    for &arc in rest {
        push_base128(&mut out, arc);
    }
    out
}

fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut tmp = [0u8; 5];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (n, b) in tmp[i..].iter().enumerate() {
        out.push(if i + n == last { *b } else { b | 0x80 });
    }
}
