//! Module: db
//! Responsibility: the typed store; records in, records out, indexes kept in step.
//! Does not own: byte layout (key), memoization policy (cache), handle lifecycle (resource).
//! Boundary: public entry point; every engine read and write of the crate starts here.

mod batch;
mod cursor;
mod index;
mod query;
mod types;


pub use batch::Batch;
pub use cursor::{AnyCursor, AnyEntry, Cursor};
pub use query::Finder;

use crate::{
    cache::{AnyModel, ModelCache},
    codec::{CborCodec, Codec},
    config::DbOptions,
    db::{
        cursor::{ScanKind, ScanState},
        types::TypeTable,
    },
    engine::Engine,
    error::{Error, Result},
    key::{
        Key, KeyRange, RawKey, Termination, TypeTag, encode_components, primary_key,
        primary_namespace,
    },
    model::{Model, SizedModel, indexes_of},
    resource::{Handler, Resource, ResourceOptions},
    sync::{ExclusiveLock, Lock, RwLock, SharedLock},
    value::IntoValues,
};
use std::{
    collections::BTreeSet,
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

///
/// Shared
///
/// State shared by a `Db` and every cursor it opened.
///

pub(crate) struct Shared<C> {
    engine: Arc<dyn Engine>,
    codec: C,
    cache: ModelCache,
    types: RwLock<TypeTable<C>>,
    handler: Handler,
    resource_options: ResourceOptions,
    // Held by a batch from reading reference rows until its cache update.
    writes: Lock<()>,
    closed: AtomicBool,
}

impl<C: Codec> Shared<C> {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::closed("Db"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn open_scan(&self, range: KeyRange, kind: ScanKind) -> Result<Resource<ScanState>> {
        self.check_open()?;
        let cursor = self.engine.cursor()?;

        Ok(Resource::new(
            "Cursor",
            ScanState::new(cursor, range, kind),
            Some(&self.handler),
            &self.resource_options,
        ))
    }

    /// Decode `key` through the cache. `bytes` are the primary row when the
    /// caller already read it; otherwise the row is fetched on a miss.
    pub(crate) fn load<M: Model>(
        &self,
        key: &Key<M>,
        bytes: Option<Vec<u8>>,
    ) -> Result<Option<Arc<M>>> {
        self.cache.get_or_retrieve(key, || -> Result<Option<SizedModel<M>>> {
            let bytes = match bytes {
                Some(bytes) => bytes,
                None => match self.engine.get(key.raw().as_bytes())? {
                    Some(bytes) => bytes,
                    None => return Ok(None),
                },
            };
            let model = self.codec.decode::<M>(&bytes)?;

            Ok(Some(SizedModel::new(model, bytes.len())))
        })
    }

    /// Decode a primary row of any registered type through the cache.
    pub(crate) fn load_any(&self, key: RawKey, bytes: Option<Vec<u8>>) -> Result<Option<AnyEntry>> {
        let tag = key
            .type_tag()
            .ok_or_else(|| Error::corruption("primary row", format!("{key:?}")))?;
        let registration = self
            .types
            .read(|types| types.registration(tag).cloned())
            .ok_or(Error::UnregisteredType { tag })?;

        let model = self.cache.get_or_retrieve_any(&key, || -> Result<Option<(AnyModel, usize)>> {
            let bytes = match bytes {
                Some(bytes) => bytes,
                None => match self.engine.get(key.as_bytes())? {
                    Some(bytes) => bytes,
                    None => return Ok(None),
                },
            };
            let model: AnyModel = (registration.decode)(&self.codec, &bytes)?;

            Ok(Some((model, bytes.len())))
        })?;

        Ok(model.map(|model| AnyEntry::new(key, registration.type_name, model)))
    }
}

///
/// Db
///
/// Embedded object-document store over an ordered key-value engine.
/// Cheap to clone; clones share state.
///

pub struct Db<C: Codec = CborCodec> {
    pub(crate) shared: Arc<Shared<C>>,
}

impl Db<CborCodec> {
    /// Open a store over `engine` with the default CBOR codec.
    pub fn open(engine: impl Engine + 'static, options: DbOptions) -> Result<Self> {
        Self::with_codec(engine, CborCodec, options)
    }
}

impl<C: Codec> Db<C> {
    /// Open a store over `engine` with a caller-provided codec.
    pub fn with_codec(engine: impl Engine + 'static, codec: C, options: DbOptions) -> Result<Self> {
        let engine: Arc<dyn Engine> = Arc::new(engine);
        let types = TypeTable::load(engine.as_ref())?;

        tracing::debug!(
            target: "docdb::db",
            max_cache_size = options.max_cache_size,
            track_closable_allocation = options.track_closable_allocation,
            "opened store"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                engine,
                codec,
                cache: ModelCache::with_max_markers(
                    options.max_cache_size,
                    options.max_cache_markers,
                ),
                types: SharedLock::new(types),
                handler: Handler::new(),
                resource_options: options.resource_options(),
                writes: ExclusiveLock::new(()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    // ─────────────────────────────────────────────
    // TYPES
    // ─────────────────────────────────────────────

    /// Register `M`: assign or load its type tag and install its decoder for
    /// `find_all`. Other operations register on first use.
    pub fn register<M: Model>(&self) -> Result<()> {
        self.tag_of::<M>().map(|_| ())
    }

    pub(crate) fn tag_of<M: Model>(&self) -> Result<TypeTag> {
        self.shared.check_open()?;

        if let Some(tag) = self.shared.types.read(TypeTable::registered_tag::<M>) {
            return Ok(tag);
        }

        let engine = self.shared.engine.as_ref();
        self.shared.types.write(|types| types.register::<M>(engine))
    }

    /// Index names declared on the type of `key`.
    #[must_use]
    pub fn indexes_of<M: Model>(&self, _key: &Key<M>) -> BTreeSet<&'static str> {
        indexes_of::<M>()
    }

    // ─────────────────────────────────────────────
    // KEYS
    // ─────────────────────────────────────────────

    pub fn key_from<M: Model>(&self, model: &M) -> Result<Key<M>> {
        let tag = self.tag_of::<M>()?;
        Ok(Key::from_raw(primary_key(tag, &index::id_encoding(model))))
    }

    pub fn key_by_id<M: Model>(&self, id: impl IntoValues) -> Result<Key<M>> {
        let tag = self.tag_of::<M>()?;
        let id = encode_components(&id.into_values(), Termination::Closed);

        Ok(Key::from_raw(primary_key(tag, &id)))
    }

    // ─────────────────────────────────────────────
    // READS
    // ─────────────────────────────────────────────

    /// Record stored under `key`, from the cache when possible.
    pub fn get<M: Model>(&self, key: &Key<M>) -> Result<Option<Arc<M>>> {
        self.shared.check_open()?;
        self.shared.load(key, None)
    }

    #[must_use]
    pub fn find<M: Model>(&self) -> Finder<'_, M, C> {
        Finder::new(self)
    }

    /// Every record of every registered type, grouped by type in
    /// registration order.
    pub fn find_all(&self) -> Result<AnyCursor<C>> {
        let range = KeyRange::prefix(primary_namespace());
        tracing::trace!(target: "docdb::query", ?range, "resolved scan range for all types");

        let resource = self.shared.open_scan(range, ScanKind::Primary)?;
        Ok(AnyCursor::new(resource, Arc::clone(&self.shared)))
    }

    // ─────────────────────────────────────────────
    // WRITES
    // ─────────────────────────────────────────────

    /// Store `model`, replacing any record with the same id, and bring its
    /// index rows up to date in the same engine write.
    pub fn put<M: Model>(&self, model: M) -> Result<Key<M>> {
        let mut batch = self.batch();
        let key = batch.put(model)?;
        batch.write()?;

        Ok(key)
    }

    /// Remove the record under `key` and all of its index rows. Deleting a
    /// missing key is not an error.
    pub fn delete<M: Model>(&self, key: &Key<M>) -> Result<()> {
        let mut batch = self.batch();
        batch.delete(key)?;
        batch.write()
    }

    /// Start a store batch: puts and deletes applied in one engine write.
    #[must_use]
    pub fn batch(&self) -> Batch<'_, C> {
        Batch::new(self)
    }

    // ─────────────────────────────────────────────
    // LIFECYCLE
    // ─────────────────────────────────────────────

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.shared.cache
    }

    #[must_use]
    pub fn codec(&self) -> &C {
        &self.shared.codec
    }

    /// Cursors opened and not yet closed.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.shared.handler.open_count()
    }

    /// Close the store. Cursors still open are force-closed and reported;
    /// returns how many there were. Later operations fail with
    /// `ResourceClosed`.
    pub fn close(&self) -> Result<usize> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }

        let forced = self.shared.handler.close();
        self.shared.cache.clear();
        tracing::debug!(target: "docdb::db", "closed store");

        forced.map_err(Error::from)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<C: Codec> Clone for Db<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Codec> Debug for Db<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("closed", &self.is_closed())
            .field("open_cursors", &self.open_cursors())
            .field("cache", &self.shared.cache)
            .finish_non_exhaustive()
    }
}
