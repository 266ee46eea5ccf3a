//! Core runtime for docdb: keyspace encoding, the typed store, the model
//! cache, resource tracking, and the lock families they are built on.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod codec;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod key;
pub mod model;
pub mod resource;
pub mod sync;
pub mod value;

pub use error::{Error, Result};

///
/// Prelude
///
/// Domain vocabulary only: record traits, keys, values, and the store
/// entry points.
///

pub mod prelude {
    pub use crate::{
        codec::{CborCodec, Codec},
        config::DbOptions,
        db::{AnyEntry, Db},
        engine::MemoryEngine,
        key::Key,
        model::{IndexModel, Model},
        value::Value,
    };
}
