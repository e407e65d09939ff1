//! Minimal BER codec for SNMPv2c messages.
//!
//! Covers what a GET client needs: the message envelope, the four PDU shapes
//! that share the request layout, and the SMIv2 application types plus the
//! v2 exception values. Lengths are definite only.

use thiserror::Error;

use crate::error::{TransportError, Unresolvable};
use crate::source::Reading;

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_IP_ADDRESS: u8 = 0x40;
pub const TAG_COUNTER32: u8 = 0x41;
pub const TAG_GAUGE32: u8 = 0x42;
pub const TAG_TIMETICKS: u8 = 0x43;
pub const TAG_OPAQUE: u8 = 0x44;
pub const TAG_COUNTER64: u8 = 0x46;
pub const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub const TAG_END_OF_MIB_VIEW: u8 = 0x82;

pub const PDU_GET_REQUEST: u8 = 0xA0;
pub const PDU_GET_NEXT_REQUEST: u8 = 0xA1;
pub const PDU_GET_RESPONSE: u8 = 0xA2;
pub const PDU_SET_REQUEST: u8 = 0xA3;

/// SNMP version field value for v2c.
pub const VERSION_2C: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("insufficient data: need {need} bytes but only {have} remain")]
    InsufficientData { need: usize, have: usize },
    #[error("unexpected tag {found:#04x}, expected {expected:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },
    #[error("unsupported length encoding {0:#04x}")]
    UnsupportedLength(u8),
    #[error("integer of {0} bytes does not fit")]
    IntegerOverflow(usize),
    #[error("malformed object identifier")]
    BadOid,
    #[error("unknown value tag {0:#04x}")]
    UnknownValueTag(u8),
    #[error("unsupported pdu type {0:#04x}")]
    UnsupportedPdu(u8),
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        TransportError::Protocol(e.to_string())
    }
}

/// A varbind value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Vec<u32>),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Numeric reading, or why there is none.
    pub fn to_reading(&self) -> Reading {
        match self {
            Self::Integer(v) => Ok(*v as f64),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Ok(f64::from(*v)),
            Self::Counter64(v) => Ok(*v as f64),
            Self::OctetString(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or(Unresolvable::NotNumeric),
            Self::NoSuchObject => Err(Unresolvable::NoSuchObject),
            Self::NoSuchInstance => Err(Unresolvable::NoSuchInstance),
            Self::EndOfMibView => Err(Unresolvable::EndOfMibView),
            Self::Null | Self::ObjectId(_) | Self::IpAddress(_) | Self::Opaque(_) => {
                Err(Unresolvable::NotNumeric)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Vec<u32>,
    pub value: Value,
}

/// A complete SNMPv1/v2c message with a request-layout PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: i64,
    pub community: Vec<u8>,
    pub pdu_type: u8,
    pub request_id: i64,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Message {
    /// v2c GetRequest for `oids`, each bound to NULL.
    pub fn get_request(community: &[u8], request_id: i64, oids: &[Vec<u32>]) -> Self {
        Self {
            version: VERSION_2C,
            community: community.to_vec(),
            pdu_type: PDU_GET_REQUEST,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids
                .iter()
                .map(|oid| VarBind {
                    oid: oid.clone(),
                    value: Value::Null,
                })
                .collect(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut varbinds = Vec::new();
        for vb in &self.varbinds {
            let mut inner = Vec::new();
            write_tlv(&mut inner, TAG_OID, &encode_oid(&vb.oid));
            encode_value(&mut inner, &vb.value);
            write_tlv(&mut varbinds, TAG_SEQUENCE, &inner);
        }

        let mut pdu = Vec::new();
        write_tlv(&mut pdu, TAG_INTEGER, &encode_integer(self.request_id));
        write_tlv(&mut pdu, TAG_INTEGER, &encode_integer(self.error_status));
        write_tlv(&mut pdu, TAG_INTEGER, &encode_integer(self.error_index));
        write_tlv(&mut pdu, TAG_SEQUENCE, &varbinds);

        let mut body = Vec::new();
        write_tlv(&mut body, TAG_INTEGER, &encode_integer(self.version));
        write_tlv(&mut body, TAG_OCTET_STRING, &self.community);
        write_tlv(&mut body, self.pdu_type, &pdu);

        let mut out = Vec::with_capacity(body.len() + 4);
        write_tlv(&mut out, TAG_SEQUENCE, &body);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut outer = Reader::new(buf);
        let body = outer.expect(TAG_SEQUENCE)?;
        if outer.remaining() > 0 {
            return Err(CodecError::TrailingBytes(outer.remaining()));
        }

        let mut body = Reader::new(body);
        let version = decode_integer(body.expect(TAG_INTEGER)?)?;
        let community = body.expect(TAG_OCTET_STRING)?.to_vec();
        let (pdu_type, pdu) = body.read_tlv()?;
        if !matches!(
            pdu_type,
            PDU_GET_REQUEST | PDU_GET_NEXT_REQUEST | PDU_GET_RESPONSE | PDU_SET_REQUEST
        ) {
            return Err(CodecError::UnsupportedPdu(pdu_type));
        }

        let mut pdu = Reader::new(pdu);
        let request_id = decode_integer(pdu.expect(TAG_INTEGER)?)?;
        let error_status = decode_integer(pdu.expect(TAG_INTEGER)?)?;
        let error_index = decode_integer(pdu.expect(TAG_INTEGER)?)?;

        let mut list = Reader::new(pdu.expect(TAG_SEQUENCE)?);
        let mut varbinds = Vec::new();
        while list.remaining() > 0 {
            let mut vb = Reader::new(list.expect(TAG_SEQUENCE)?);
            let oid = decode_oid(vb.expect(TAG_OID)?)?;
            let (tag, content) = vb.read_tlv()?;
            varbinds.push(VarBind {
                oid,
                value: decode_value(tag, content)?,
            });
        }

        Ok(Self {
            version,
            community,
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

/// Minimal two's-complement big-endian encoding.
fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Unsigned encoding, with a leading zero when the high bit is set.
fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|b| **b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Whether `arcs` can be carried in a BER object identifier: at least two
/// arcs, a first arc of 0..=2, a second arc below 40 under 0 and 1, and a
/// combined first subidentifier that fits in 32 bits.
pub fn check_oid(arcs: &[u32]) -> Result<(), CodecError> {
    match arcs {
        [0..=1, second, ..] if *second < 40 => Ok(()),
        [2, second, ..] if u64::from(*second) + 80 <= u64::from(u32::MAX) => Ok(()),
        _ => Err(CodecError::BadOid),
    }
}

// Computes the first subidentifier in 64 bits, so out-of-range arcs encode
// to something `decode_oid` rejects instead of overflowing.
fn encode_oid(arcs: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    let first = match arcs {
        [] => return out,
        [a] => u64::from(*a) * 40,
        [a, b, ..] => u64::from(*a) * 40 + u64::from(*b),
    };
    push_base128(&mut out, first);
    for arc in arcs.iter().skip(2) {
        push_base128(&mut out, u64::from(*arc));
    }
    out
}

fn push_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut tmp = [0u8; 10];
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
    for (j, byte) in tmp.iter().enumerate().skip(i) {
        out.push(if j == last { *byte } else { byte | 0x80 });
    }
}

fn encode_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(v) => write_tlv(out, TAG_INTEGER, &encode_integer(*v)),
        Value::OctetString(b) => write_tlv(out, TAG_OCTET_STRING, b),
        Value::Null => write_tlv(out, TAG_NULL, &[]),
        Value::ObjectId(arcs) => write_tlv(out, TAG_OID, &encode_oid(arcs)),
        Value::IpAddress(ip) => write_tlv(out, TAG_IP_ADDRESS, ip),
        Value::Counter32(v) => write_tlv(out, TAG_COUNTER32, &encode_unsigned(u64::from(*v))),
        Value::Gauge32(v) => write_tlv(out, TAG_GAUGE32, &encode_unsigned(u64::from(*v))),
        Value::TimeTicks(v) => write_tlv(out, TAG_TIMETICKS, &encode_unsigned(u64::from(*v))),
        Value::Opaque(b) => write_tlv(out, TAG_OPAQUE, b),
        Value::Counter64(v) => write_tlv(out, TAG_COUNTER64, &encode_unsigned(*v)),
        Value::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
        Value::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
        Value::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::InsufficientData {
                need: n,
                have: self.remaining(),
            });
        }
        let slice = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_length(&mut self) -> Result<usize, CodecError> {
        let first = self.take(1)?[0];
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        if count == 0 || count > 4 {
            return Err(CodecError::UnsupportedLength(first));
        }
        Ok(self
            .take(count)?
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b)))
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), CodecError> {
        let tag = self.take(1)?[0];
        let len = self.read_length()?;
        Ok((tag, self.take(len)?))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], CodecError> {
        let (found, content) = self.read_tlv()?;
        if found != expected {
            return Err(CodecError::UnexpectedTag { expected, found });
        }
        Ok(content)
    }
}

fn decode_integer(content: &[u8]) -> Result<i64, CodecError> {
    if content.is_empty() || content.len() > 8 {
        return Err(CodecError::IntegerOverflow(content.len()));
    }
    let init: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(init, |acc, b| (acc << 8) | i64::from(*b)))
}

fn decode_unsigned(content: &[u8], max_bits: u32) -> Result<u64, CodecError> {
    let significant = match content.iter().position(|b| *b != 0) {
        Some(i) => &content[i..],
        None => &[][..],
    };
    if significant.len() * 8 > max_bits as usize {
        return Err(CodecError::IntegerOverflow(content.len()));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_oid(content: &[u8]) -> Result<Vec<u32>, CodecError> {
    let mut subids = Vec::new();
    let mut current: u32 = 0;
    let mut pending = false;
    for byte in content {
        if current > (u32::MAX >> 7) {
            return Err(CodecError::BadOid);
        }
        current = (current << 7) | u32::from(byte & 0x7F);
        pending = byte & 0x80 != 0;
        if !pending {
            subids.push(current);
            current = 0;
        }
    }
    if pending || subids.is_empty() {
        return Err(CodecError::BadOid);
    }

    let first = subids[0];
    let mut arcs = Vec::with_capacity(subids.len() + 1);
    match first {
        0..=39 => arcs.extend([0, first]),
        40..=79 => arcs.extend([1, first - 40]),
        _ => arcs.extend([2, first - 80]),
    }
    arcs.extend_from_slice(&subids[1..]);
    Ok(arcs)
}

fn decode_value(tag: u8, content: &[u8]) -> Result<Value, CodecError> {
    Ok(match tag {
        TAG_INTEGER => Value::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
        TAG_NULL => Value::Null,
        TAG_OID => Value::ObjectId(decode_oid(content)?),
        TAG_IP_ADDRESS => {
            let ip: [u8; 4] = content
                .try_into()
                .map_err(|_| CodecError::IntegerOverflow(content.len()))?;
            Value::IpAddress(ip)
        }
        TAG_COUNTER32 => Value::Counter32(decode_unsigned(content, 32)? as u32),
        TAG_GAUGE32 => Value::Gauge32(decode_unsigned(content, 32)? as u32),
        TAG_TIMETICKS => Value::TimeTicks(decode_unsigned(content, 32)? as u32),
        TAG_OPAQUE => Value::Opaque(content.to_vec()),
        TAG_COUNTER64 => Value::Counter64(decode_unsigned(content, 64)?),
        TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
        other => return Err(CodecError::UnknownValueTag(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYS_DESCR: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 1, 0];

    #[test]
    fn test_get_request_wire_bytes() {
        let msg = Message::get_request(b"public", 1, &[SYS_DESCR.to_vec()]);
        let expected: &[u8] = &[
            0x30, 0x26, 0x02, 0x01, 0x01, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xA0,
            0x19, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x0E, 0x30, 0x0C,
            0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x05, 0x00,
        ];
        assert_eq!(msg.encode(), expected);
        assert_eq!(Message::decode(expected).unwrap(), msg);
    }

    #[test]
    fn test_integer_encoding_is_minimal() {
        assert_eq!(encode_integer(0), vec![0x00]);
        assert_eq!(encode_integer(127), vec![0x7F]);
        assert_eq!(encode_integer(128), vec![0x00, 0x80]);
        assert_eq!(encode_integer(256), vec![0x01, 0x00]);
        assert_eq!(encode_integer(-1), vec![0xFF]);
        assert_eq!(encode_integer(-129), vec![0xFF, 0x7F]);
        for v in [0, 1, -1, 127, 128, -128, -129, 65535, i64::from(i32::MAX), i64::MIN] {
            assert_eq!(decode_integer(&encode_integer(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_unsigned_high_bit_gets_leading_zero() {
        assert_eq!(encode_unsigned(0), vec![0x00]);
        assert_eq!(encode_unsigned(0x80), vec![0x00, 0x80]);
        assert_eq!(encode_unsigned(u64::from(u32::MAX)), vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_unsigned(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF], 32).unwrap(), 0xFFFF_FFFF);
        assert!(decode_unsigned(&[0x01, 0x00, 0x00, 0x00, 0x00], 32).is_err());
    }

    #[test]
    fn test_oid_with_large_arcs() {
        let arcs = vec![1, 3, 6, 1, 4, 1, 476, 1, 42, 3, 8, 40, 20, 1, 130, 4, 3];
        let encoded = encode_oid(&arcs);
        // 476 = 0x1DC -> 0x83 0x5C
        assert_eq!(&encoded[5..7], &[0x83, 0x5C]);
        assert_eq!(decode_oid(&encoded).unwrap(), arcs);
    }

    #[test]
    fn test_out_of_range_first_arc() {
        assert_eq!(check_oid(&[1, 3, 6, 1]), Ok(()));
        assert_eq!(check_oid(&[2, 999, 1]), Ok(()));
        assert_eq!(check_oid(&[3, 1]), Err(CodecError::BadOid));
        assert_eq!(check_oid(&[1, 40]), Err(CodecError::BadOid));
        assert_eq!(check_oid(&[2, u32::MAX]), Err(CodecError::BadOid));
        assert_eq!(check_oid(&[1]), Err(CodecError::BadOid));

        // Encoding never overflows, even for arcs that do not fit.
        let encoded = encode_oid(&[u32::MAX, u32::MAX, 1]);
        assert_eq!(decode_oid(&encoded), Err(CodecError::BadOid));
    }

    #[test]
    fn test_oid_truncated() {
        assert_eq!(decode_oid(&[0x2B, 0x83]), Err(CodecError::BadOid));
        assert_eq!(decode_oid(&[]), Err(CodecError::BadOid));
    }

    #[test]
    fn test_long_form_length() {
        let mut out = Vec::new();
        write_length(&mut out, 300);
        assert_eq!(out, vec![0x82, 0x01, 0x2C]);
        let mut reader = Reader::new(&out);
        assert_eq!(reader.read_length().unwrap(), 300);
    }

    #[test]
    fn test_decode_response_with_exceptions() {
        let response = Message {
            version: VERSION_2C,
            community: b"LiebertEM".to_vec(),
            pdu_type: PDU_GET_RESPONSE,
            request_id: 77,
            error_status: 0,
            error_index: 0,
            varbinds: vec![
                VarBind {
                    oid: vec![1, 3, 6, 1, 4, 1, 476, 1],
                    value: Value::Gauge32(1250),
                },
                VarBind {
                    oid: vec![1, 3, 6, 1, 4, 1, 476, 2],
                    value: Value::NoSuchInstance,
                },
                VarBind {
                    oid: vec![1, 3, 6, 1, 4, 1, 476, 3],
                    value: Value::EndOfMibView,
                },
                VarBind {
                    oid: vec![1, 3, 6, 1, 4, 1, 476, 4],
                    value: Value::Integer(-3),
                },
            ],
        };
        let decoded = Message::decode(&response.encode()).unwrap();
        assert_eq!(decoded, response);

        let readings: Vec<Reading> = decoded.varbinds.iter().map(|vb| vb.value.to_reading()).collect();
        assert_eq!(
            readings,
            vec![
                Ok(1250.0),
                Err(Unresolvable::NoSuchInstance),
                Err(Unresolvable::EndOfMibView),
                Ok(-3.0),
            ]
        );
    }

    #[test]
    fn test_octet_string_readings() {
        assert_eq!(Value::OctetString(b" 12.5 ".to_vec()).to_reading(), Ok(12.5));
        assert_eq!(
            Value::OctetString(b"on".to_vec()).to_reading(),
            Err(Unresolvable::NotNumeric)
        );
        assert_eq!(Value::Null.to_reading(), Err(Unresolvable::NotNumeric));
        assert_eq!(Value::Counter64(1 << 40).to_reading(), Ok((1u64 << 40) as f64));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Message::decode(&[0x30]),
            Err(CodecError::InsufficientData { .. })
        ));
        assert!(matches!(
            Message::decode(&[0x04, 0x00]),
            Err(CodecError::UnexpectedTag { expected: TAG_SEQUENCE, found: 0x04 })
        ));
        assert!(matches!(
            Message::decode(&[0x30, 0x80]),
            Err(CodecError::UnsupportedLength(0x80))
        ));
        let mut bytes = Message::get_request(b"c", 1, &[]).encode();
        bytes.push(0x00);
        assert_eq!(Message::decode(&bytes), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn test_decode_rejects_unknown_pdu() {
        let mut msg = Message::get_request(b"c", 1, &[]);
        msg.pdu_type = 0xA7;
        assert_eq!(
            Message::decode(&msg.encode()),
            Err(CodecError::UnsupportedPdu(0xA7))
        );
    }
}
