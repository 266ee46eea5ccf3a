use crate::{
    codec::{CborCodec, Codec},
    db::{
        Db,
        cursor::{Cursor, ScanKind},
    },
    error::{Error, Result},
    key::{
        KeyRange, Termination, TypeTag, encode_components, index_prefix, primary_key,
        primary_prefix, push_components,
    },
    model::{Model, index_model},
    value::{IntoValues, Value},
};
use std::marker::PhantomData;

/// Prefix-or-exact range over one component tuple appended to `base`.
fn component_range(mut base: Vec<u8>, values: &[Value], open: bool) -> KeyRange {
    let termination = if open {
        Termination::Open
    } else {
        Termination::Closed
    };
    push_components(&mut base, values, termination);

    KeyRange::prefix(base)
}

/// Range holding the primary rows of `tag` whose id matches `values`.
pub(crate) fn id_range(tag: TypeTag, values: &[Value], open: bool) -> KeyRange {
    if open {
        component_range(primary_prefix(tag), values, true)
    } else {
        let id = encode_components(values, Termination::Closed);
        KeyRange::exact(primary_key(tag, &id).into_bytes())
    }
}

/// Range holding the secondary rows of `index` matching `values`; every
/// row of the index when `values` is empty.
pub(crate) fn index_range(
    tag: TypeTag,
    index: &str,
    values: &[Value],
    open: bool,
) -> KeyRange {
    let prefix = index_prefix(tag, index);
    if values.is_empty() {
        return KeyRange::prefix(prefix);
    }

    component_range(prefix, values, open)
}

///
/// Finder
///
/// Typed query entry point for one record type.
///

pub struct Finder<'a, M: Model, C: Codec = CborCodec> {
    db: &'a Db<C>,
    _marker: PhantomData<fn() -> M>,
}

impl<'a, M: Model, C: Codec> Finder<'a, M, C> {
    pub(crate) const fn new(db: &'a Db<C>) -> Self {
        Self {
            db,
            _marker: PhantomData,
        }
    }

    /// Every record of `M`, ascending by id.
    pub fn all(&self) -> Result<Cursor<M, C>> {
        let tag = self.db.tag_of::<M>()?;
        self.scan(KeyRange::prefix(primary_prefix(tag)), ScanKind::Primary)
    }

    /// Records whose id equals `id`, or starts with it when `open`.
    pub fn by_id(&self, id: impl IntoValues, open: bool) -> Result<Cursor<M, C>> {
        let tag = self.db.tag_of::<M>()?;
        let range = id_range(tag, &id.into_values(), open);

        self.scan(range, ScanKind::Primary)
    }

    /// Records by index value, in index order. `()` walks the whole index;
    /// a leading subset of a composite index matches every completion.
    pub fn by_index(
        &self,
        index: &str,
        values: impl IntoValues,
        open: bool,
    ) -> Result<Cursor<M, C>> {
        if index_model::<M>(index).is_none() {
            return Err(Error::UnknownIndex {
                type_name: M::TYPE_NAME,
                index: index.to_string(),
            });
        }

        let tag = self.db.tag_of::<M>()?;
        let range = index_range(tag, index, &values.into_values(), open);

        self.scan(range, ScanKind::Secondary)
    }

    fn scan(&self, range: KeyRange, kind: ScanKind) -> Result<Cursor<M, C>> {
        tracing::trace!(
            target: "docdb::query",
            type_name = M::TYPE_NAME,
            ?kind,
            ?range,
            "resolved scan range"
        );

        let resource = self.db.shared.open_scan(range, kind)?;
        Ok(Cursor::new(resource, self.db.shared.clone()))
    }
}
