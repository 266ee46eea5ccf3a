use crate::value::Value;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeSet,
    fmt::{self, Debug, Display},
};

///
/// Model
///
/// A record type the store can persist. The id must be unique per type;
/// index extractors must be pure functions of the record.
///

pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name, persisted in the type table.
    const TYPE_NAME: &'static str;

    /// Secondary indexes maintained for this type.
    const INDEXES: &'static [IndexModel<Self>] = &[];

    /// Ordered primary-id components.
    fn id(&self) -> Vec<Value>;
}

///
/// IndexModel
///
/// Runtime descriptor for one secondary index: a name, the declared field
/// names, and an extractor producing one value per field, in order.
///

pub struct IndexModel<M> {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    extract: fn(&M) -> Vec<Value>,
}

impl<M> IndexModel<M> {
    #[must_use]
    pub const fn new(
        name: &'static str,
        fields: &'static [&'static str],
        extract: fn(&M) -> Vec<Value>,
    ) -> Self {
        Self {
            name,
            fields,
            extract,
        }
    }

    /// Component values of `model` for this index.
    #[must_use]
    pub fn values(&self, model: &M) -> Vec<Value> {
        (self.extract)(model)
    }

    #[must_use]
    pub const fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }
}

impl<M> Clone for IndexModel<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for IndexModel<M> {}

impl<M> Debug for IndexModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexModel")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<M> Display for IndexModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.fields.join(", "))
    }
}

/// Look up an index descriptor by name.
#[must_use]
pub fn index_model<M: Model>(name: &str) -> Option<&'static IndexModel<M>> {
    M::INDEXES.iter().find(|index| index.name == name)
}

/// Names of every index declared on `M`.
#[must_use]
pub fn indexes_of<M: Model>() -> BTreeSet<&'static str> {
    M::INDEXES.iter().map(|index| index.name).collect()
}

///
/// SizedModel
///
/// A record paired with its approximate in-memory cost, for cache accounting.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SizedModel<M> {
    pub model: M,
    pub size: usize,
}

impl<M> SizedModel<M> {
    #[must_use]
    pub const fn new(model: M, size: usize) -> Self {
        Self { model, size }
    }
}
