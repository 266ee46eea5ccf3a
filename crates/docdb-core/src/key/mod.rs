//! Module: key
//! Responsibility: keyspace layout, typed record keys, and scan ranges.
//! Does not own: engine traversal or row values.
//! Boundary: the store layer builds every engine key through this module.

mod build;
mod ordered;


pub use build::{
    index_prefix, primary_key, primary_prefix, prefix_successor, primary_namespace, refs_key,
    secondary_key, type_row_key, types_namespace,
};
pub use ordered::{Termination, encode_components, push_component, push_components};

pub(crate) use build::{decode_key_list, encode_key_list, type_name_from_row_key};

use derive_more::Deref;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    cmp::Ordering,
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Bound,
};

///
/// Namespace
///
/// First byte of every engine key.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Namespace {
    Index = b'i',
    Primary = b'o',
    Refs = b'r',
    Types = b't',
}

impl Namespace {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

///
/// TypeTag
///
/// Per-type discriminator assigned in first-registration order.
///

pub type TypeTag = u32;

pub(crate) const TYPE_TAG_LEN: usize = 4;

///
/// RawKey
///
/// Untyped engine key bytes.
///

#[derive(Clone, Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RawKey(Vec<u8>);

impl RawKey {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Type tag of a primary or reference row key, if the key is long enough.
    #[must_use]
    pub fn type_tag(&self) -> Option<TypeTag> {
        let bytes = self.0.get(1..=TYPE_TAG_LEN)?;
        let mut tag = [0u8; TYPE_TAG_LEN];
        tag.copy_from_slice(bytes);

        Some(TypeTag::from_be_bytes(tag))
    }
}

impl Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawKey(")?;
        for byte in &self.0 {
            if byte.is_ascii_graphic() {
                write!(f, "{}", char::from(*byte))?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        write!(f, ")")
    }
}

impl From<Vec<u8>> for RawKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RawKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for RawKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

///
/// Key
///
/// Typed identity of one record: the full primary-row key of a record of
/// type `M`. Equality and order are byte equality and byte order.
///

pub struct Key<M> {
    raw: RawKey,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Key<M> {
    #[must_use]
    pub const fn from_raw(raw: RawKey) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn raw(&self) -> &RawKey {
        &self.raw
    }

    #[must_use]
    pub fn into_raw(self) -> RawKey {
        self.raw
    }

    #[must_use]
    pub fn type_tag(&self) -> Option<TypeTag> {
        self.raw.type_tag()
    }

    /// The primary-id encoding that follows the namespace and type tag.
    #[must_use]
    pub fn id_bytes(&self) -> &[u8] {
        self.raw.get(1 + TYPE_TAG_LEN..).unwrap_or_default()
    }
}

impl<M> Clone for Key<M> {
    fn clone(&self) -> Self {
        Self::from_raw(self.raw.clone())
    }
}

impl<M> PartialEq for Key<M> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<M> Eq for Key<M> {}

impl<M> PartialOrd for Key<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for Key<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<M> Hash for Key<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<M> Debug for Key<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key<{}>({:?})", std::any::type_name::<M>(), self.raw)
    }
}

impl<M> Serialize for Key<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes::serialize(self.raw.as_bytes(), serializer)
    }
}

impl<'de, M> Deserialize<'de> for Key<M> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: serde_bytes::ByteBuf = serde_bytes::deserialize(deserializer)?;

        Ok(Self::from_raw(RawKey::new(bytes.into_vec())))
    }
}

///
/// KeyRange
///
/// Half-open scan range: `[lower, upper)`, or `[lower, ∞)` when the upper
/// bound is unbounded.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange {
    pub lower: Vec<u8>,
    pub upper: Bound<Vec<u8>>,
}

impl KeyRange {
    /// Range holding exactly one key: `[key, key ∥ 0x00)`.
    #[must_use]
    pub fn exact(key: Vec<u8>) -> Self {
        let mut upper = key.clone();
        upper.push(0x00);

        Self {
            lower: key,
            upper: Bound::Excluded(upper),
        }
    }

    /// Range holding every key that starts with `prefix`.
    #[must_use]
    pub fn prefix(prefix: Vec<u8>) -> Self {
        let upper = prefix_successor(&prefix).map_or(Bound::Unbounded, Bound::Excluded);

        Self {
            lower: prefix,
            upper,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        if key < self.lower.as_slice() {
            return false;
        }

        match &self.upper {
            Bound::Excluded(upper) => key < upper.as_slice(),
            Bound::Included(upper) => key <= upper.as_slice(),
            Bound::Unbounded => true,
        }
    }
}
