use crate::{
    cache::CacheBatch,
    codec::{CborCodec, Codec},
    db::{Db, index},
    engine::{Engine, WriteBatch},
    error::{Error, Result},
    key::{Key, RawKey, TypeTag, primary_key, refs_key},
    model::Model,
    sync::ExclusiveLock,
};
use std::{
    collections::HashMap,
    fmt::{self, Debug},
};

// One staged record change. Rows are derived from it at write time.
enum Staged {
    Put {
        tag: TypeTag,
        id: Vec<u8>,
        primary: RawKey,
        bytes: Vec<u8>,
        refs: Vec<RawKey>,
    },
    Delete {
        tag: TypeTag,
        id: Vec<u8>,
        primary: RawKey,
    },
}

///
/// Batch
///
/// Puts and deletes staged against one store and applied together: one
/// engine write, then one cache batch. Index maintenance is planned against
/// the reference rows stored at write time, so batches and single writes
/// may interleave freely. Dropping an unwritten batch discards it.
///

pub struct Batch<'a, C: Codec = CborCodec> {
    db: &'a Db<C>,
    staged: Vec<Staged>,
    cache: CacheBatch,
    puts: usize,
    deletes: usize,
}

impl<'a, C: Codec> Batch<'a, C> {
    pub(crate) fn new(db: &'a Db<C>) -> Self {
        Self {
            db,
            staged: Vec::new(),
            cache: CacheBatch::default(),
            puts: 0,
            deletes: 0,
        }
    }

    /// Stage `model`; returns the key it will be stored under.
    pub fn put<M: Model>(&mut self, model: M) -> Result<Key<M>> {
        let tag = self.db.tag_of::<M>()?;
        let id = index::id_encoding(&model);
        let primary = primary_key(tag, &id);
        let bytes = self.db.codec().encode(&model)?;
        let size = bytes.len();
        let refs = index::secondary_keys(tag, &model, &id);

        let key = Key::from_raw(primary.clone());
        self.cache.put(&key, model, size);
        self.staged.push(Staged::Put {
            tag,
            id,
            primary,
            bytes,
            refs,
        });
        self.puts += 1;

        Ok(key)
    }

    /// Stage removal of the record under `key` and its index rows.
    pub fn delete<M: Model>(&mut self, key: &Key<M>) -> Result<()> {
        let tag = key
            .type_tag()
            .ok_or_else(|| Error::corruption("record key", format!("{key:?}")))?;

        self.cache.delete(key);
        self.staged.push(Staged::Delete {
            tag,
            id: key.id_bytes().to_vec(),
            primary: key.raw().clone(),
        });
        self.deletes += 1;

        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Apply every staged op in one engine write, then update the cache.
    /// Store writes are serialized from reading reference rows through the
    /// cache update.
    pub fn write(self) -> Result<()> {
        let Self {
            db,
            staged,
            cache,
            puts,
            deletes,
        } = self;
        if staged.is_empty() {
            return Ok(());
        }

        let shared = &db.shared;
        shared.writes.with_lock(|()| -> Result<()> {
            shared.check_open()?;

            let (rows, stale_index_rows) = plan_rows(shared.engine.as_ref(), staged)?;
            let row_count = rows.len();
            shared.engine.write(rows)?;
            shared.cache.apply(cache);

            tracing::debug!(
                target: "docdb::db",
                puts,
                deletes,
                rows = row_count,
                stale_index_rows,
                "wrote batch"
            );

            Ok(())
        })
    }
}

impl<C: Codec> Debug for Batch<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("puts", &self.puts)
            .field("deletes", &self.deletes)
            .finish_non_exhaustive()
    }
}

// Engine rows for `staged` against the reference rows stored now. Later
// changes to the same record build on the rows earlier ones leave behind.
// Returns the rows and how many stale secondary rows they remove.
fn plan_rows(engine: &dyn Engine, staged: Vec<Staged>) -> Result<(WriteBatch, usize)> {
    let mut rows = WriteBatch::new();
    let mut refs: HashMap<RawKey, Vec<RawKey>> = HashMap::new();
    let mut stale = 0;

    for change in staged {
        match change {
            Staged::Put {
                tag,
                id,
                primary,
                bytes,
                refs: new_refs,
            } => {
                let old_refs = current_refs(engine, &refs, tag, &id)?;
                let plan =
                    index::stage_put(&mut rows, tag, &id, &primary, bytes, &old_refs, new_refs);

                stale += plan.removed;
                refs.insert(refs_key(tag, &id), plan.refs);
            }
            Staged::Delete { tag, id, primary } => {
                let old_refs = current_refs(engine, &refs, tag, &id)?;
                index::stage_delete(&mut rows, tag, &id, &primary, &old_refs);

                stale += old_refs.len();
                refs.insert(refs_key(tag, &id), Vec::new());
            }
        }
    }

    Ok((rows, stale))
}

// Planned reference rows shadow the engine's.
fn current_refs(
    engine: &dyn Engine,
    planned: &HashMap<RawKey, Vec<RawKey>>,
    tag: TypeTag,
    id: &[u8],
) -> Result<Vec<RawKey>> {
    match planned.get(&refs_key(tag, id)) {
        Some(refs) => Ok(refs.clone()),
        None => index::read_refs(engine, tag, id),
    }
}
