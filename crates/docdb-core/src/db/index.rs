//! Module: db::index
//! Responsibility: secondary and reference row maintenance for one record.
//! Does not own: the atomic write; callers hand the staged `WriteBatch` to the engine.
//! Boundary: db::{Db, Batch} -> db::index -> key builders.

use crate::{
    engine::{Engine, WriteBatch},
    error::{Error, Result},
    key::{
        RawKey, Termination, TypeTag, decode_key_list, encode_components, encode_key_list,
        refs_key, secondary_key,
    },
    model::Model,
};
use std::collections::BTreeSet;

/// Closed encoding of the record's primary id.
pub(crate) fn id_encoding<M: Model>(model: &M) -> Vec<u8> {
    encode_components(&model.id(), Termination::Closed)
}

/// Every secondary row key `model` owns, one per declared index.
pub(crate) fn secondary_keys<M: Model>(tag: TypeTag, model: &M, id: &[u8]) -> Vec<RawKey> {
    M::INDEXES
        .iter()
        .map(|index| secondary_key(tag, index.name, &index.values(model), id))
        .collect()
}

/// Secondary rows currently recorded for `(tag, id)`.
pub(crate) fn read_refs(engine: &dyn Engine, tag: TypeTag, id: &[u8]) -> Result<Vec<RawKey>> {
    let key = refs_key(tag, id);

    match engine.get(key.as_bytes())? {
        None => Ok(Vec::new()),
        Some(bytes) => decode_key_list(&bytes)
            .ok_or_else(|| Error::corruption("reference row", format!("{key:?}"))),
    }
}

///
/// RowPlan
///
/// Staged row transition for one record: what to write and what the
/// reference row will hold afterwards.
///

pub(crate) struct RowPlan {
    pub(crate) refs: Vec<RawKey>,
    pub(crate) removed: usize,
}

/// Stage the rows of a put: drop old secondary rows the record no longer
/// owns, write the new ones, the reference row and the primary row.
pub(crate) fn stage_put(
    batch: &mut WriteBatch,
    tag: TypeTag,
    id: &[u8],
    primary: &RawKey,
    bytes: Vec<u8>,
    old_refs: &[RawKey],
    new_refs: Vec<RawKey>,
) -> RowPlan {
    let keep: BTreeSet<&RawKey> = new_refs.iter().collect();
    let mut removed = 0;
    for stale in old_refs.iter().filter(|key| !keep.contains(key)) {
        batch.delete(stale.as_bytes());
        removed += 1;
    }

    for secondary in &new_refs {
        batch.put(secondary.as_bytes(), primary.as_bytes());
    }
    batch.put(refs_key(tag, id).into_bytes(), encode_key_list(&new_refs));
    batch.put(primary.as_bytes(), bytes);

    RowPlan {
        refs: new_refs,
        removed,
    }
}

/// Stage the rows of a delete: every secondary row, the reference row and
/// the primary row.
pub(crate) fn stage_delete(
    batch: &mut WriteBatch,
    tag: TypeTag,
    id: &[u8],
    primary: &RawKey,
    old_refs: &[RawKey],
) {
    for secondary in old_refs {
        batch.delete(secondary.as_bytes());
    }
    batch.delete(refs_key(tag, id).into_bytes());
    batch.delete(primary.as_bytes());
}
