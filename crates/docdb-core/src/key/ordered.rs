//! Module: key::ordered
//! Responsibility: value-to-bytes transforms whose byte order is value order.
//! Does not own: keyspace namespaces or row layout.
//! Boundary: `key::build` frames these components into row keys.

use crate::value::Value;

// Kind tags order values of different kinds; within one kind the payload
// carries the order. Unsigned values that fit in i64 reuse the INT tag.
const TAG_BOOL: u8 = 0x10;
const TAG_INT: u8 = 0x20;
const TAG_UINT_HIGH: u8 = 0x21;
const TAG_FLOAT: u8 = 0x30;
const TAG_TEXT: u8 = 0x40;
const TAG_BYTES: u8 = 0x50;

const ESCAPE: [u8; 2] = [0x00, 0xFF];
const TERMINATOR: [u8; 2] = [0x00, 0x00];

///
/// Termination
///
/// Whether the last variable-length component keeps its terminator.
/// `Open` encodings are byte-prefixes of every longer value they start.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Termination {
    Closed,
    Open,
}

/// Encode an ordered tuple of components.
#[must_use]
pub fn encode_components(values: &[Value], termination: Termination) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 10);
    push_components(&mut out, values, termination);

    out
}

/// Append an ordered tuple of components; only the last one can be open.
pub fn push_components(out: &mut Vec<u8>, values: &[Value], termination: Termination) {
    let last = values.len().saturating_sub(1);
    for (i, value) in values.iter().enumerate() {
        let component_termination = if i == last {
            termination
        } else {
            Termination::Closed
        };
        push_component(out, value, component_termination);
    }
}

/// Append one component: kind tag, then an order-preserving payload.
pub fn push_component(out: &mut Vec<u8>, value: &Value, termination: Termination) {
    match value {
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&ordered_i64_bytes(*v));
        }
        Value::Uint(v) => match i64::try_from(*v) {
            Ok(signed) => {
                out.push(TAG_INT);
                out.extend_from_slice(&ordered_i64_bytes(signed));
            }
            Err(_) => {
                out.push(TAG_UINT_HIGH);
                out.extend_from_slice(&v.to_be_bytes());
            }
        },
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&ordered_f64_bytes(*v));
        }
        Value::Text(v) => {
            out.push(TAG_TEXT);
            push_escaped_bytes(out, v.as_bytes(), termination);
        }
        Value::Bytes(v) => {
            out.push(TAG_BYTES);
            push_escaped_bytes(out, v, termination);
        }
    }
}

// Escape zero bytes so the terminator stays unambiguous inside a tuple.
pub(crate) fn push_escaped_bytes(out: &mut Vec<u8>, bytes: &[u8], termination: Termination) {
    for &byte in bytes {
        if byte == 0 {
            out.extend_from_slice(&ESCAPE);
        } else {
            out.push(byte);
        }
    }

    if termination == Termination::Closed {
        out.extend_from_slice(&TERMINATOR);
    }
}

/// Read one escaped, terminated segment starting at `offset`.
pub(crate) fn read_escaped_bytes(bytes: &[u8], offset: &mut usize) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = *offset;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte != 0 {
            out.push(byte);
            i += 1;
            continue;
        }

        match bytes.get(i + 1)? {
            0x00 => {
                *offset = i + 2;
                return Some(out);
            }
            0xFF => {
                out.push(0);
                i += 2;
            }
            _ => return None,
        }
    }

    None
}

pub(crate) const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    let biased = value.cast_unsigned() ^ (1u64 << 63);
    biased.to_be_bytes()
}

pub(crate) const fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & 0x8000_0000_0000_0000 == 0 {
        bits ^ 0x8000_0000_0000_0000
    } else {
        !bits
    };

    ordered.to_be_bytes()
}
