use crate::{
    key::{
        Namespace, RawKey, TYPE_TAG_LEN, TypeTag,
        ordered::{Termination, push_components, push_escaped_bytes, read_escaped_bytes},
    },
    value::Value,
};

const LIST_LEN_BYTES: usize = 4;

/// Prefix shared by every primary row of every type.
#[must_use]
pub fn primary_namespace() -> Vec<u8> {
    vec![Namespace::Primary.to_u8()]
}

/// Prefix shared by every primary row of one type.
#[must_use]
pub fn primary_prefix(tag: TypeTag) -> Vec<u8> {
    tagged(Namespace::Primary, tag, 0)
}

/// `PRIMARY ∥ tag ∥ id`, where `id` is an already encoded component tuple.
#[must_use]
pub fn primary_key(tag: TypeTag, id: &[u8]) -> RawKey {
    let mut out = tagged(Namespace::Primary, tag, id.len());
    out.extend_from_slice(id);

    RawKey::new(out)
}

/// `INDEX ∥ tag ∥ name`: every secondary row of one index.
#[must_use]
pub fn index_prefix(tag: TypeTag, index: &str) -> Vec<u8> {
    let mut out = tagged(Namespace::Index, tag, index.len() + 2);
    push_escaped_bytes(&mut out, index.as_bytes(), Termination::Closed);

    out
}

/// `INDEX ∥ tag ∥ name ∥ components ∥ id`.
#[must_use]
pub fn secondary_key(tag: TypeTag, index: &str, components: &[Value], id: &[u8]) -> RawKey {
    let mut out = index_prefix(tag, index);
    push_components(&mut out, components, Termination::Closed);
    out.extend_from_slice(id);

    RawKey::new(out)
}

/// `REFS ∥ tag ∥ id`: the list of secondary rows owned by one record.
#[must_use]
pub fn refs_key(tag: TypeTag, id: &[u8]) -> RawKey {
    let mut out = tagged(Namespace::Refs, tag, id.len());
    out.extend_from_slice(id);

    RawKey::new(out)
}

/// Prefix shared by every type row.
#[must_use]
pub fn types_namespace() -> Vec<u8> {
    vec![Namespace::Types.to_u8()]
}

/// `TYPES ∥ name`: persisted tag assignment for one type.
#[must_use]
pub fn type_row_key(type_name: &str) -> RawKey {
    let mut out = types_namespace();
    push_escaped_bytes(&mut out, type_name.as_bytes(), Termination::Closed);

    RawKey::new(out)
}

pub(crate) fn type_name_from_row_key(key: &[u8]) -> Option<String> {
    if key.first() != Some(&Namespace::Types.to_u8()) {
        return None;
    }

    let mut offset = 1;
    let name = read_escaped_bytes(key, &mut offset)?;
    if offset != key.len() {
        return None;
    }

    String::from_utf8(name).ok()
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such key exists (empty or all-0xFF prefix).
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|&byte| byte != 0xFF)?;
    let mut out = prefix[..=last].to_vec();
    out[last] += 1;

    Some(out)
}

// Length-prefixed list of keys, used as the value of a reference row.
pub(crate) fn encode_key_list(keys: &[RawKey]) -> Vec<u8> {
    let total: usize = keys.iter().map(|key| key.len() + LIST_LEN_BYTES).sum();
    let mut out = Vec::with_capacity(total + LIST_LEN_BYTES);

    out.extend_from_slice(&list_len(keys.len()));
    for key in keys {
        out.extend_from_slice(&list_len(key.len()));
        out.extend_from_slice(key.as_bytes());
    }

    out
}

pub(crate) fn decode_key_list(bytes: &[u8]) -> Option<Vec<RawKey>> {
    let mut offset = 0;
    let count = read_len(bytes, &mut offset)?;
    let mut keys = Vec::with_capacity(count.min(1024));

    for _ in 0..count {
        let len = read_len(bytes, &mut offset)?;
        let end = offset.checked_add(len)?;
        keys.push(RawKey::from(bytes.get(offset..end)?));
        offset = end;
    }

    (offset == bytes.len()).then_some(keys)
}

fn tagged(namespace: Namespace, tag: TypeTag, extra: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + TYPE_TAG_LEN + extra);
    out.push(namespace.to_u8());
    out.extend_from_slice(&tag.to_be_bytes());

    out
}

fn list_len(len: usize) -> [u8; LIST_LEN_BYTES] {
    u32::try_from(len).unwrap_or(u32::MAX).to_be_bytes()
}

fn read_len(bytes: &[u8], offset: &mut usize) -> Option<usize> {
    let end = offset.checked_add(LIST_LEN_BYTES)?;
    let mut buf = [0u8; LIST_LEN_BYTES];
    buf.copy_from_slice(bytes.get(*offset..end)?);
    *offset = end;

    usize::try_from(u32::from_be_bytes(buf)).ok()
}
