use std::{
    any::Any,
    fmt::{self, Debug},
    sync::Arc,
};

pub(crate) type AnyModel = Arc<dyn Any + Send + Sync>;

///
/// Slot
///
/// Type-erased state stored per key.
///

#[derive(Clone)]
pub(crate) enum Slot {
    Present { model: AnyModel, size: usize },
    Deleted,
    Evicted,
}

impl Slot {
    pub(crate) const fn size(&self) -> usize {
        match self {
            Self::Present { size, .. } => *size,
            Self::Deleted | Self::Evicted => 0,
        }
    }

    pub(crate) const fn is_marker(&self) -> bool {
        matches!(self, Self::Deleted | Self::Evicted)
    }

    /// Present and Deleted entries answer a lookup without loading.
    pub(crate) const fn is_settled(&self) -> bool {
        matches!(self, Self::Present { .. } | Self::Deleted)
    }

    pub(crate) fn into_entry<M: Send + Sync + 'static>(self) -> Entry<M> {
        match self {
            Self::Present { model, size } => match model.downcast::<M>() {
                Ok(model) => Entry::Present { model, size },
                Err(_) => Entry::Absent,
            },
            Self::Deleted => Entry::Deleted,
            Self::Evicted => Entry::Evicted,
        }
    }

    pub(crate) fn into_any(self) -> Option<AnyModel> {
        match self {
            Self::Present { model, .. } => Some(model),
            Self::Deleted | Self::Evicted => None,
        }
    }
}

///
/// Entry
///
/// What the cache knows about one key. `Deleted` is a negative cache;
/// `Evicted` only says the record left the cache.
///

pub enum Entry<M> {
    Present { model: Arc<M>, size: usize },
    Deleted,
    Evicted,
    Absent,
}

impl<M> Entry<M> {
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Present { size, .. } => *size,
            _ => 0,
        }
    }

    #[must_use]
    pub fn model(&self) -> Option<&Arc<M>> {
        match self {
            Self::Present { model, .. } => Some(model),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_model(self) -> Option<Arc<M>> {
        match self {
            Self::Present { model, .. } => Some(model),
            _ => None,
        }
    }
}

impl<M> Clone for Entry<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Present { model, size } => Self::Present {
                model: Arc::clone(model),
                size: *size,
            },
            Self::Deleted => Self::Deleted,
            Self::Evicted => Self::Evicted,
            Self::Absent => Self::Absent,
        }
    }
}

impl<M> Default for Entry<M> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<M: PartialEq> PartialEq for Entry<M> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Present { model, size },
                Self::Present {
                    model: other_model,
                    size: other_size,
                },
            ) => size == other_size && model == other_model,
            (Self::Deleted, Self::Deleted)
            | (Self::Evicted, Self::Evicted)
            | (Self::Absent, Self::Absent) => true,
            _ => false,
        }
    }
}

impl<M: Debug> Debug for Entry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { model, size } => f
                .debug_struct("Present")
                .field("model", model)
                .field("size", size)
                .finish(),
            Self::Deleted => f.write_str("Deleted"),
            Self::Evicted => f.write_str("Evicted"),
            Self::Absent => f.write_str("Absent"),
        }
    }
}
