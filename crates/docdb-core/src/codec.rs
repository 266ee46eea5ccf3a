//! Module: codec
//! Responsibility: the record <-> bytes boundary.
//! Does not own: key encoding; ids and index components never pass through here.

use crate::{model::Model, sync::Shareable};
use std::{
    error::Error as StdError,
    fmt::{self, Display},
};
use thiserror::Error as ThisError;

///
/// CodecOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CodecOp {
    Encode,
    Decode,
}

impl Display for CodecOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
        })
    }
}

///
/// CodecError
///
/// Opaque codec failure; the collaborator's own error is kept as the source.
///

#[derive(Debug, ThisError)]
#[error("failed to {op} '{type_name}': {source}")]
pub struct CodecError {
    pub type_name: &'static str,
    pub op: CodecOp,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl CodecError {
    pub fn encode<M: Model>(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            type_name: M::TYPE_NAME,
            op: CodecOp::Encode,
            source: source.into(),
        }
    }

    pub fn decode<M: Model>(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            type_name: M::TYPE_NAME,
            op: CodecOp::Decode,
            source: source.into(),
        }
    }
}

///
/// Codec
///
/// Injected record serializer.
///

pub trait Codec: Shareable + 'static {
    fn encode<M: Model>(&self, model: &M) -> Result<Vec<u8>, CodecError>;

    fn decode<M: Model>(&self, bytes: &[u8]) -> Result<M, CodecError>;
}

///
/// CborCodec
///
/// Default codec: CBOR through serde.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CborCodec;

impl Codec for CborCodec {
    fn encode<M: Model>(&self, model: &M) -> Result<Vec<u8>, CodecError> {
        serde_cbor::to_vec(model).map_err(CodecError::encode::<M>)
    }

    fn decode<M: Model>(&self, bytes: &[u8]) -> Result<M, CodecError> {
        serde_cbor::from_slice(bytes).map_err(CodecError::decode::<M>)
    }
}
