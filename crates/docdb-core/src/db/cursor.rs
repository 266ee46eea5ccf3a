use crate::{
    cache::AnyModel,
    codec::{CborCodec, Codec},
    db::Shared,
    engine::{EngineCursor, EngineError},
    error::{Error, Result},
    key::{Key, KeyRange, RawKey},
    model::Model,
    resource::{Release, Resource},
};
use std::{
    any::Any,
    fmt::{self, Debug},
    marker::PhantomData,
    sync::Arc,
};

///
/// ScanKind
///
/// Whether a scan walks primary rows or secondary rows that point at them.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ScanKind {
    Primary,
    Secondary,
}

///
/// ScanState
///
/// Engine cursor bounded to one range. Released by closing the cursor.
///

pub(crate) struct ScanState {
    cursor: Box<dyn EngineCursor>,
    range: KeyRange,
    kind: ScanKind,
    started: bool,
}

// One raw row: the primary key and, for primary scans, its bytes.
struct Hit {
    primary: RawKey,
    bytes: Option<Vec<u8>>,
}

impl ScanState {
    pub(crate) fn new(cursor: Box<dyn EngineCursor>, range: KeyRange, kind: ScanKind) -> Self {
        Self {
            cursor,
            range,
            kind,
            started: false,
        }
    }

    fn advance(&mut self) -> std::result::Result<Option<Hit>, EngineError> {
        if self.started {
            self.cursor.next()?;
        } else {
            self.cursor.seek(&self.range.lower)?;
            self.started = true;
        }

        let (Some(key), Some(value)) = (self.cursor.key(), self.cursor.value()) else {
            return Ok(None);
        };
        if !self.range.contains(key) {
            return Ok(None);
        }

        Ok(Some(match self.kind {
            ScanKind::Primary => Hit {
                primary: RawKey::from(key),
                bytes: Some(value.to_vec()),
            },
            ScanKind::Secondary => Hit {
                primary: RawKey::from(value),
                bytes: None,
            },
        }))
    }
}

impl Release for ScanState {
    fn release(&mut self) {
        self.cursor.close();
    }
}

// Pull the next raw hit. `done` marks exhaustion only; a cursor closed
// before that fails every later read with `ResourceClosed`.
fn next_hit(resource: &Resource<ScanState>, done: &mut bool) -> Result<Option<Hit>> {
    if *done {
        return Ok(None);
    }

    let hit = resource
        .with(ScanState::advance)
        .and_then(|advanced| advanced.map_err(Error::from));

    match hit {
        Ok(Some(hit)) => Ok(Some(hit)),
        Ok(None) => {
            *done = true;
            resource.close();
            Ok(None)
        }
        Err(err) => {
            resource.close();
            Err(err)
        }
    }
}

// Iterator over `next`, ending once the cursor reports itself closed.
fn fused<T>(mut next: impl FnMut() -> Result<Option<T>>) -> impl Iterator<Item = Result<T>> {
    let mut closed = false;

    std::iter::from_fn(move || {
        if closed {
            return None;
        }
        let item = next().transpose();
        closed = matches!(&item, Some(Err(err)) if err.is_closed());
        item
    })
}

///
/// Cursor
///
/// Lazy, forward-only result of a typed query. Consumed by `models()` or
/// `entries()`; closes itself when exhausted or dropped. Reading a cursor
/// closed before exhaustion fails with `ResourceClosed`.
///

pub struct Cursor<M: Model, C: Codec = CborCodec> {
    resource: Resource<ScanState>,
    shared: Arc<Shared<C>>,
    done: bool,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model, C: Codec> Cursor<M, C> {
    pub(crate) const fn new(resource: Resource<ScanState>, shared: Arc<Shared<C>>) -> Self {
        Self {
            resource,
            shared,
            done: false,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resource.is_open()
    }

    /// Release the engine cursor now. Later reads fail with
    /// `ResourceClosed`.
    pub fn close(&mut self) {
        self.resource.close();
    }

    /// Next record with its key, skipping secondary rows whose primary row
    /// is gone.
    pub fn next_entry(&mut self) -> Result<Option<(Key<M>, Arc<M>)>> {
        while let Some(hit) = next_hit(&self.resource, &mut self.done)? {
            let key = Key::<M>::from_raw(hit.primary);
            match self.shared.load(&key, hit.bytes)? {
                Some(model) => return Ok(Some((key, model))),
                None => {
                    tracing::trace!(target: "docdb::query", ?key, "skipping stale index row");
                }
            }
        }

        Ok(None)
    }

    /// Remaining records. Decode errors are yielded in place; a closed
    /// cursor yields one `ResourceClosed` and ends.
    pub fn entries(mut self) -> impl Iterator<Item = Result<(Key<M>, Arc<M>)>> {
        fused(move || self.next_entry())
    }

    pub fn models(self) -> impl Iterator<Item = Result<Arc<M>>> {
        self.entries().map(|entry| entry.map(|(_, model)| model))
    }

    pub fn keys(self) -> impl Iterator<Item = Result<Key<M>>> {
        self.entries().map(|entry| entry.map(|(key, _)| key))
    }
}

impl<M: Model, C: Codec> Debug for Cursor<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("type_name", &M::TYPE_NAME)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

///
/// AnyEntry
///
/// One record of unknown static type, from `Db::find_all`.
///

#[derive(Clone)]
pub struct AnyEntry {
    key: RawKey,
    type_name: &'static str,
    model: AnyModel,
}

impl AnyEntry {
    pub(crate) const fn new(key: RawKey, type_name: &'static str, model: AnyModel) -> Self {
        Self {
            key,
            type_name,
            model,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &RawKey {
        &self.key
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn model(&self) -> &(dyn Any + Send + Sync) {
        self.model.as_ref()
    }

    #[must_use]
    pub fn is<M: Model>(&self) -> bool {
        self.model.is::<M>()
    }

    #[must_use]
    pub fn downcast_ref<M: Model>(&self) -> Option<&M> {
        self.model.downcast_ref::<M>()
    }

    #[must_use]
    pub fn downcast<M: Model>(&self) -> Option<Arc<M>> {
        Arc::clone(&self.model).downcast::<M>().ok()
    }

    /// Typed key, if this entry holds an `M`.
    #[must_use]
    pub fn typed_key<M: Model>(&self) -> Option<Key<M>> {
        self.is::<M>().then(|| Key::from_raw(self.key.clone()))
    }
}

impl Debug for AnyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEntry")
            .field("key", &self.key)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

///
/// AnyCursor
///
/// Cursor over every primary row of every registered type, grouped by type
/// tag.
///

pub struct AnyCursor<C: Codec = CborCodec> {
    resource: Resource<ScanState>,
    shared: Arc<Shared<C>>,
    done: bool,
}

impl<C: Codec> AnyCursor<C> {
    pub(crate) const fn new(resource: Resource<ScanState>, shared: Arc<Shared<C>>) -> Self {
        Self {
            resource,
            shared,
            done: false,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.resource.is_open()
    }

    pub fn close(&mut self) {
        self.resource.close();
    }

    pub fn next_entry(&mut self) -> Result<Option<AnyEntry>> {
        while let Some(hit) = next_hit(&self.resource, &mut self.done)? {
            if let Some(entry) = self.shared.load_any(hit.primary, hit.bytes)? {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    pub fn entries(mut self) -> impl Iterator<Item = Result<AnyEntry>> {
        fused(move || self.next_entry())
    }

    pub fn models(self) -> impl Iterator<Item = Result<AnyModel>> {
        self.entries().map(|entry| entry.map(|entry| entry.model))
    }
}

impl<C: Codec> Debug for AnyCursor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCursor")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}
