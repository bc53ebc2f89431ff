// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP/1.1 binary encoding (RFC 8010 SS3).
//
// The parser only decodes the message header and attribute groups; the
// document data that follows the end-of-attributes tag is left in the
// caller's stream so it can be spooled chunk by chunk.

use tracing::warn;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// IPP version 1.1 major byte.
pub const IPP_VERSION_MAJOR: u8 = 0x01;

/// IPP version 1.1 minor byte.
pub const IPP_VERSION_MINOR: u8 = 0x01;

// Delimiter tags (RFC 8010 SS3.5.1)

pub const TAG_OPERATION_ATTRIBUTES: u8 = 0x01;
pub const TAG_JOB_ATTRIBUTES: u8 = 0x02;
pub const TAG_END_OF_ATTRIBUTES: u8 = 0x03;
pub const TAG_PRINTER_ATTRIBUTES: u8 = 0x04;

// Value tags (RFC 8010 SS3.5.2)

/// Integer value (4 bytes, signed big-endian).
pub const VALUE_TAG_INTEGER: u8 = 0x21;
/// Boolean value (1 byte).
pub const VALUE_TAG_BOOLEAN: u8 = 0x22;
/// Enum value (same encoding as integer).
pub const VALUE_TAG_ENUM: u8 = 0x23;
pub const VALUE_TAG_TEXT: u8 = 0x41;
pub const VALUE_TAG_NAME: u8 = 0x42;
pub const VALUE_TAG_KEYWORD: u8 = 0x44;
pub const VALUE_TAG_URI: u8 = 0x45;
pub const VALUE_TAG_CHARSET: u8 = 0x47;
pub const VALUE_TAG_NATURAL_LANGUAGE: u8 = 0x48;
pub const VALUE_TAG_MIME_MEDIA_TYPE: u8 = 0x49;

// Operation ids (RFC 8011 SS4)

pub const OP_PRINT_JOB: u16 = 0x0002;
pub const OP_VALIDATE_JOB: u16 = 0x0004;
pub const OP_GET_JOB_ATTRIBUTES: u16 = 0x0009;
pub const OP_GET_JOBS: u16 = 0x000A;
pub const OP_GET_PRINTER_ATTRIBUTES: u16 = 0x000B;

// Status codes (RFC 8011 SS4.1.8)

pub const STATUS_OK: u16 = 0x0000;
pub const STATUS_CLIENT_ERROR_BAD_REQUEST: u16 = 0x0400;
pub const STATUS_CLIENT_ERROR_NOT_FOUND: u16 = 0x0406;
pub const STATUS_CLIENT_ERROR_TIMEOUT: u16 = 0x0409;
pub const STATUS_SERVER_ERROR_INTERNAL: u16 = 0x0500;
pub const STATUS_SERVER_ERROR_OPERATION_NOT_SUPPORTED: u16 = 0x0501;

// job-state values (RFC 8011 SS5.3.7)

pub const JOB_STATE_PROCESSING: i32 = 5;
pub const JOB_STATE_ABORTED: i32 = 8;
pub const JOB_STATE_COMPLETED: i32 = 9;

// printer-state values (RFC 8011 SS5.4.11)

pub const PRINTER_STATE_IDLE: i32 = 3;
pub const PRINTER_STATE_PROCESSING: i32 = 4;

// ---------------------------------------------------------------------------
// Parsed request
// ---------------------------------------------------------------------------

/// A single parsed IPP attribute.
#[derive(Debug, Clone)]
pub struct IppAttribute {
    pub value_tag: u8,
    /// Attribute name (empty for additional values in a 1setOf).
    pub name: String,
    pub value: Vec<u8>,
}

impl IppAttribute {
    /// Render the value for log output.
    pub fn display_value(&self) -> String {
        match self.value_tag {
            VALUE_TAG_INTEGER | VALUE_TAG_ENUM if self.value.len() == 4 => {
                i32::from_be_bytes([self.value[0], self.value[1], self.value[2], self.value[3]])
                    .to_string()
            }
            VALUE_TAG_BOOLEAN if self.value.len() == 1 => (self.value[0] != 0).to_string(),
            _ => String::from_utf8_lossy(&self.value).into_owned(),
        }
    }
}

/// A group of attributes delimited by a group tag.
#[derive(Debug, Clone)]
pub struct IppAttributeGroup {
    pub delimiter: u8,
    pub attributes: Vec<IppAttribute>,
}

impl IppAttributeGroup {
    pub fn get(&self, name: &str) -> Option<&IppAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Value as text.  Invalid UTF-8 is replaced rather than dropped so a
    /// client's job name always reaches the ledger.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
    }

    pub fn get_integer(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|a| {
            if a.value.len() == 4 {
                Some(i32::from_be_bytes([a.value[0], a.value[1], a.value[2], a.value[3]]))
            } else {
                None
            }
        })
    }
}

/// Header and attribute groups of an IPP request.
#[derive(Debug)]
pub struct IppRequest {
    pub version_major: u8,
    pub version_minor: u8,
    /// Operation id in a request, status code in a response.
    pub operation_id: u16,
    pub request_id: u32,
    pub attribute_groups: Vec<IppAttributeGroup>,
}

impl IppRequest {
    pub fn operation_attributes(&self) -> Option<&IppAttributeGroup> {
        self.attribute_groups
            .iter()
            .find(|g| g.delimiter == TAG_OPERATION_ATTRIBUTES)
    }

    /// String-valued operation attribute.
    pub fn operation_string(&self, name: &str) -> Option<String> {
        self.operation_attributes().and_then(|g| g.get_string(name))
    }

    /// Integer-valued operation attribute.
    pub fn operation_integer(&self, name: &str) -> Option<i32> {
        self.operation_attributes().and_then(|g| g.get_integer(name))
    }

    /// Every named attribute across all groups, for diagnostics.
    pub fn attributes(&self) -> impl Iterator<Item = &IppAttribute> {
        self.attribute_groups
            .iter()
            .flat_map(|g| g.attributes.iter())
            .filter(|a| !a.name.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse the header of an IPP message.
///
/// Returns `Ok(None)` while `data` does not yet contain the end-of-attributes
/// tag, and `Ok(Some((request, consumed)))` once it does; `consumed` is the
/// offset of the first document byte.
///
/// ```text
/// version-number:  2 bytes (major, minor)
/// operation-id:    2 bytes (big-endian u16)
/// request-id:      4 bytes (big-endian u32)
/// attribute-groups: variable
///   delimiter-tag: 1 byte
///   attributes:    variable
///     value-tag:    1 byte
///     name-length:  2 bytes
///     name:         name-length bytes
///     value-length: 2 bytes
///     value:        value-length bytes
/// end-of-attributes-tag: 1 byte (0x03)
/// document-data: remainder
/// ```
pub fn parse_ipp_header(
    data: &[u8],
) -> std::result::Result<Option<(IppRequest, usize)>, String> {
    if data.len() < 8 {
        return Ok(None);
    }

    let version_major = data[0];
    let version_minor = data[1];
    if version_major == 0 || version_major > 2 {
        return Err(format!("unsupported IPP version {version_major}.{version_minor}"));
    }
    let operation_id = u16::from_be_bytes([data[2], data[3]]);
    let request_id = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    let mut pos = 8;
    let mut attribute_groups: Vec<IppAttributeGroup> = Vec::new();
    let mut current_group: Option<IppAttributeGroup> = None;

    loop {
        let Some(&tag) = data.get(pos) else {
            return Ok(None);
        };

        // Delimiter tags are in the range 0x00..=0x0F.
        if tag <= 0x0F {
            if let Some(group) = current_group.take() {
                attribute_groups.push(group);
            }

            if tag == TAG_END_OF_ATTRIBUTES {
                pos += 1;
                break;
            }

            current_group = Some(IppAttributeGroup {
                delimiter: tag,
                attributes: Vec::new(),
            });
            pos += 1;
            continue;
        }

        let value_tag = tag;
        pos += 1;

        let Some(name_length) = read_u16(data, pos) else {
            return Ok(None);
        };
        pos += 2;

        let Some(name_bytes) = data.get(pos..pos + name_length) else {
            return Ok(None);
        };
        let name = String::from_utf8_lossy(name_bytes).to_string();
        pos += name_length;

        let Some(value_length) = read_u16(data, pos) else {
            return Ok(None);
        };
        pos += 2;

        let Some(value) = data.get(pos..pos + value_length) else {
            return Ok(None);
        };
        let value = value.to_vec();
        pos += value_length;

        let attr = IppAttribute {
            value_tag,
            name,
            value,
        };

        if let Some(ref mut group) = current_group {
            group.attributes.push(attr);
        } else {
            warn!("IPP attribute outside of any group -- discarded");
        }
    }

    Ok(Some((
        IppRequest {
            version_major,
            version_minor,
            operation_id,
            request_id,
            attribute_groups,
        },
        pos,
    )))
}

fn read_u16(data: &[u8], pos: usize) -> Option<usize> {
    let bytes = data.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]) as usize)
}

// ---------------------------------------------------------------------------
// Response builder
// ---------------------------------------------------------------------------

/// Builder for IPP response messages (RFC 8010 SS3.4).
pub struct IppResponseBuilder {
    buf: Vec<u8>,
}

impl IppResponseBuilder {
    pub fn new(status_code: u16, request_id: u32) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.push(IPP_VERSION_MAJOR);
        buf.push(IPP_VERSION_MINOR);
        buf.extend_from_slice(&status_code.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        Self { buf }
    }

    /// Start a new attribute group.
    pub fn begin_group(&mut self, delimiter: u8) -> &mut Self {
        self.buf.push(delimiter);
        self
    }

    /// Standard charset/language/status-message preamble.
    pub fn operation_preamble(&mut self, status_message: &str) -> &mut Self {
        self.begin_group(TAG_OPERATION_ATTRIBUTES)
            .charset("attributes-charset", "utf-8")
            .natural_language("attributes-natural-language", "en")
            .text("status-message", status_message)
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_TEXT, name, value.as_bytes())
    }

    pub fn name_attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_NAME, name, value.as_bytes())
    }

    pub fn keyword(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_KEYWORD, name, value.as_bytes())
    }

    /// Additional keyword value of a 1setOf (name-length = 0, RFC 8010 SS3.1.4).
    pub fn keyword_additional(&mut self, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_KEYWORD, "", value.as_bytes())
    }

    pub fn uri(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_URI, name, value.as_bytes())
    }

    pub fn charset(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_CHARSET, name, value.as_bytes())
    }

    pub fn natural_language(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_NATURAL_LANGUAGE, name, value.as_bytes())
    }

    pub fn mime_type(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_MIME_MEDIA_TYPE, name, value.as_bytes())
    }

    pub fn mime_type_additional(&mut self, value: &str) -> &mut Self {
        self.write_attr(VALUE_TAG_MIME_MEDIA_TYPE, "", value.as_bytes())
    }

    pub fn integer(&mut self, name: &str, value: i32) -> &mut Self {
        self.write_attr(VALUE_TAG_INTEGER, name, &value.to_be_bytes())
    }

    pub fn enum_attr(&mut self, name: &str, value: i32) -> &mut Self {
        self.write_attr(VALUE_TAG_ENUM, name, &value.to_be_bytes())
    }

    pub fn enum_additional(&mut self, value: i32) -> &mut Self {
        self.write_attr(VALUE_TAG_ENUM, "", &value.to_be_bytes())
    }

    pub fn boolean(&mut self, name: &str, value: bool) -> &mut Self {
        self.write_attr(VALUE_TAG_BOOLEAN, name, &[u8::from(value)])
    }

    /// Write a raw attribute (value-tag, name, value bytes).
    ///
    /// Values longer than the 16-bit length field are truncated.
    pub fn write_attr(&mut self, value_tag: u8, name: &str, value: &[u8]) -> &mut Self {
        let name_bytes = &name.as_bytes()[..name.len().min(u16::MAX as usize)];
        let value = &value[..value.len().min(u16::MAX as usize)];
        self.buf.push(value_tag);
        self.buf
            .extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(name_bytes);
        self.buf
            .extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(value);
        self
    }

    /// Finalise the response: write end-of-attributes tag and return bytes.
    pub fn build(mut self) -> Vec<u8> {
        self.buf.push(TAG_END_OF_ATTRIBUTES);
        self.buf
    }
}

/// Build a minimal response carrying only a status and message.
pub fn build_status_response(status: u16, request_id: u32, message: &str) -> Vec<u8> {
    let mut resp = IppResponseBuilder::new(status, request_id);
    resp.operation_preamble(message);
    resp.build()
}
