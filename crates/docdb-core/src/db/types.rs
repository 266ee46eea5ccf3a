use crate::{
    cache::AnyModel,
    codec::{Codec, CodecError},
    engine::{Engine, EngineCursor},
    error::{Error, Result},
    key::{KeyRange, TypeTag, type_name_from_row_key, type_row_key, types_namespace},
    model::Model,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

/// Decodes the row bytes of one registered type into a shared record.
pub(crate) type Decoder<C> = fn(&C, &[u8]) -> std::result::Result<AnyModel, CodecError>;

fn decode_any<C: Codec, M: Model>(
    codec: &C,
    bytes: &[u8],
) -> std::result::Result<AnyModel, CodecError> {
    let model: AnyModel = Arc::new(codec.decode::<M>(bytes)?);
    Ok(model)
}

///
/// Registration
///
/// Decoder entry for a type registered in this process.
///

pub(crate) struct Registration<C> {
    pub(crate) type_name: &'static str,
    pub(crate) decode: Decoder<C>,
}

impl<C> Clone for Registration<C> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name,
            decode: self.decode,
        }
    }
}

///
/// TypeTable
///
/// Type name <-> tag assignments (persisted as type rows) plus the decoder
/// table for types registered since open.
///

pub(crate) struct TypeTable<C> {
    tags: HashMap<String, TypeTag>,
    names: BTreeMap<TypeTag, String>,
    registered: HashMap<TypeTag, Registration<C>>,
    next: TypeTag,
}

impl<C: Codec> TypeTable<C> {
    /// Read every persisted type row from `engine`.
    pub(crate) fn load(engine: &dyn Engine) -> Result<Self> {
        let mut table = Self {
            tags: HashMap::new(),
            names: BTreeMap::new(),
            registered: HashMap::new(),
            next: 1,
        };

        let range = KeyRange::prefix(types_namespace());
        let mut cursor = engine.cursor()?;
        let scanned = scan_type_rows(cursor.as_mut(), &range, &mut table);
        cursor.close();
        scanned?;

        if !table.names.is_empty() {
            tracing::debug!(target: "docdb::types", types = table.names.len(), "loaded type table");
        }

        Ok(table)
    }

    pub(crate) fn tag_of(&self, type_name: &str) -> Option<TypeTag> {
        self.tags.get(type_name).copied()
    }

    /// Tag of `M` if it was registered in this process.
    pub(crate) fn registered_tag<M: Model>(&self) -> Option<TypeTag> {
        self.tag_of(M::TYPE_NAME)
            .filter(|tag| self.registered.contains_key(tag))
    }

    pub(crate) fn registration(&self, tag: TypeTag) -> Option<&Registration<C>> {
        self.registered.get(&tag)
    }

    /// Assign (or reuse) the tag of `M` and install its decoder. A new
    /// assignment is persisted before it becomes visible.
    pub(crate) fn register<M: Model>(&mut self, engine: &dyn Engine) -> Result<TypeTag> {
        let tag = match self.tag_of(M::TYPE_NAME) {
            Some(tag) => tag,
            None => {
                let tag = self.next;
                engine.put(type_row_key(M::TYPE_NAME).as_bytes(), &tag.to_be_bytes())?;
                self.assign(M::TYPE_NAME.to_string(), tag);

                tracing::debug!(
                    target: "docdb::types",
                    type_name = M::TYPE_NAME,
                    tag,
                    "assigned type tag"
                );
                tag
            }
        };

        self.registered.insert(
            tag,
            Registration {
                type_name: M::TYPE_NAME,
                decode: decode_any::<C, M>,
            },
        );

        Ok(tag)
    }

    fn assign(&mut self, name: String, tag: TypeTag) {
        self.next = self.next.max(tag.saturating_add(1));
        self.names.insert(tag, name.clone());
        self.tags.insert(name, tag);
    }
}

fn scan_type_rows<C: Codec>(
    cursor: &mut dyn EngineCursor,
    range: &KeyRange,
    table: &mut TypeTable<C>,
) -> Result<()> {
    cursor.seek(&range.lower)?;

    while let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
        if !range.contains(key) {
            break;
        }

        let name = type_name_from_row_key(key)
            .ok_or_else(|| Error::corruption("type row", format!("bad key {key:02x?}")))?;
        let tag = <[u8; 4]>::try_from(value)
            .map(TypeTag::from_be_bytes)
            .map_err(|_| Error::corruption("type row", format!("bad tag for '{name}'")))?;
        table.assign(name, tag);

        cursor.next()?;
    }

    Ok(())
}
