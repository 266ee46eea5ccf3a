//! ## Crate layout
//! - `core`: keyspace encoding, typed store, model cache, resource tracking and locks.
//!
//! The `prelude` module mirrors the surface most embedders need: declare
//! records with `Model`, open a `Db` over an engine, and query it.

pub use docdb_core as core;

pub use crate::core::{Error, Result, db};

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        cache::{Entry, ModelCache},
        codec::{CborCodec, Codec},
        config::DbOptions,
        db::{AnyCursor, AnyEntry, Batch, Cursor, Db, Finder},
        engine::{Engine, MemoryEngine},
        key::Key,
        model::{IndexModel, Model, SizedModel},
        resource::{LeakDiagnostic, LeakReporter},
        value::Value,
    };
    pub use serde::{Deserialize, Serialize};
}
