use crate::{
    engine::{Engine, EngineCursor, EngineError, WriteBatch},
    sync::{DefaultLocking, Locking, SharedLock, Shareable},
};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    ops::Bound,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

type Rows = BTreeMap<Vec<u8>, Vec<u8>>;

///
/// MemoryEngine
///
/// In-process engine over a `BTreeMap`. Cursors re-range from their current
/// key on every step, so they observe writes made while they are open.
///

pub struct MemoryEngine<L: Locking = DefaultLocking> {
    inner: Arc<MemoryInner<L>>,
}

struct MemoryInner<L: Locking> {
    rows: L::RwLock<Rows>,
    open_cursors: AtomicUsize,
}

impl<L: Locking> MemoryEngine<L> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                rows: SharedLock::new(Rows::new()),
                open_cursors: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of cursors opened and not yet closed.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.rows.read(BTreeMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every key currently stored, in byte order.
    #[must_use]
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.rows.read(|rows| rows.keys().cloned().collect())
    }
}

impl<L: Locking> Clone for MemoryEngine<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Locking> Default for MemoryEngine<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Locking> Debug for MemoryEngine<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("locking", &L::NAME)
            .field("rows", &self.len())
            .field("open_cursors", &self.open_cursors())
            .finish()
    }
}

impl<L: Locking> Engine for MemoryEngine<L>
where
    Self: Shareable,
    MemoryCursor<L>: EngineCursor,
{
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.inner.rows.read(|rows| rows.get(key).cloned()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), EngineError> {
        self.inner.rows.write(|rows| {
            for op in batch.into_ops() {
                match op.value {
                    Some(value) => {
                        rows.insert(op.key, value);
                    }
                    None => {
                        rows.remove(&op.key);
                    }
                }
            }
        });

        Ok(())
    }

    fn cursor(&self) -> Result<Box<dyn EngineCursor>, EngineError> {
        self.inner.open_cursors.fetch_add(1, Ordering::AcqRel);

        Ok(Box::new(MemoryCursor {
            inner: Arc::clone(&self.inner),
            current: None,
            closed: false,
        }))
    }
}

///
/// MemoryCursor
///

pub struct MemoryCursor<L: Locking> {
    inner: Arc<MemoryInner<L>>,
    current: Option<(Vec<u8>, Vec<u8>)>,
    closed: bool,
}

impl<L: Locking> MemoryCursor<L> {
    fn position(&mut self, lower: Bound<&[u8]>) {
        self.current = self.inner.rows.read(|rows| {
            rows.range::<[u8], _>((lower, Bound::Unbounded))
                .next()
                .map(|(key, value)| (key.clone(), value.clone()))
        });
    }
}

impl<L: Locking> EngineCursor for MemoryCursor<L>
where
    Self: Shareable,
{
    fn seek(&mut self, key: &[u8]) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::CursorClosed);
        }
        self.position(Bound::Included(key));

        Ok(())
    }

    fn is_valid(&self) -> bool {
        !self.closed && self.current.is_some()
    }

    fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(key, _)| key.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, value)| value.as_slice())
    }

    fn next(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::CursorClosed);
        }
        if let Some((key, _)) = self.current.take() {
            self.position(Bound::Excluded(key.as_slice()));
        }

        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.current = None;
        self.inner.open_cursors.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<L: Locking> Drop for MemoryCursor<L> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.open_cursors.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
