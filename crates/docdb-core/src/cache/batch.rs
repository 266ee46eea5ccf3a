use crate::{
    cache::entry::{AnyModel, Slot},
    key::{Key, RawKey},
    model::{Model, SizedModel},
};
use std::sync::Arc;

pub(crate) enum BatchOp {
    Write { key: RawKey, slot: Slot },
    Clear,
}

///
/// CacheBatch
///
/// Mutations recorded inside `ModelCache::batch`. Nothing is visible until
/// the batch closure returns `Ok`; then every op applies in order under one
/// exclusive lock.
///

#[derive(Default)]
pub struct CacheBatch {
    ops: Vec<BatchOp>,
}

impl CacheBatch {
    pub fn put<M: Model>(&mut self, key: &Key<M>, model: M, size: usize) -> &mut Self {
        self.put_shared(key, Arc::new(model), size)
    }

    pub fn put_sized<M: Model>(&mut self, key: &Key<M>, sized: SizedModel<M>) -> &mut Self {
        self.put(key, sized.model, sized.size)
    }

    pub fn put_shared<M: Model>(&mut self, key: &Key<M>, model: Arc<M>, size: usize) -> &mut Self {
        let model: AnyModel = model;
        self.write(key.raw().clone(), Slot::Present { model, size })
    }

    pub fn delete<M: Model>(&mut self, key: &Key<M>) -> &mut Self {
        self.write(key.raw().clone(), Slot::Deleted)
    }

    pub fn evict<M: Model>(&mut self, key: &Key<M>) -> &mut Self {
        self.write(key.raw().clone(), Slot::Evicted)
    }

    pub fn clear(&mut self) -> &mut Self {
        self.ops.push(BatchOp::Clear);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn write(&mut self, key: RawKey, slot: Slot) -> &mut Self {
        self.ops.push(BatchOp::Write { key, slot });
        self
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
