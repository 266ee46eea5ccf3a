//! Module: engine
//! Responsibility: the ordered key-value collaborator the store runs on.
//! Does not own: keyspace layout or row semantics; keys and values are opaque bytes.
//! Boundary: db -> engine. Every write the store performs is one `WriteBatch`.

mod memory;


pub use memory::{MemoryCursor, MemoryEngine};

use crate::sync::Shareable;
use thiserror::Error as ThisError;

///
/// EngineError
///

#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error("engine cursor is closed")]
    CursorClosed,

    #[error("engine failure: {message}")]
    Backend { message: String },
}

impl EngineError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

///
/// WriteOp
///
/// One mechanical row mutation: `Some` value writes, `None` removes.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteOp {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

///
/// WriteBatch
///
/// Ordered list of row mutations applied all-or-nothing. Later ops on the
/// same key win.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp {
            key: key.into(),
            value: Some(value.into()),
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp {
            key: key.into(),
            value: None,
        });
        self
    }

    /// Append every op of `other`, keeping their order.
    pub fn extend(&mut self, other: Self) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

///
/// Engine
///
/// Byte-ordered key-value store with atomic batch writes and forward cursors.
///

pub trait Engine: Shareable {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Apply every op of `batch` atomically.
    fn write(&self, batch: WriteBatch) -> Result<(), EngineError>;

    /// Open a forward cursor. It starts unpositioned; call `seek` first.
    fn cursor(&self) -> Result<Box<dyn EngineCursor>, EngineError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }

    fn delete(&self, key: &[u8]) -> Result<(), EngineError> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(batch)
    }
}

///
/// EngineCursor
///
/// Native forward iterator over the engine keyspace. Holds engine-side state
/// until `close()`; callers must close it exactly once.
///

pub trait EngineCursor: Shareable {
    /// Position on the first key `>= key`.
    fn seek(&mut self, key: &[u8]) -> Result<(), EngineError>;

    fn is_valid(&self) -> bool;

    fn key(&self) -> Option<&[u8]>;

    fn value(&self) -> Option<&[u8]>;

    /// Advance to the next key in byte order.
    fn next(&mut self) -> Result<(), EngineError>;

    fn close(&mut self);
}
