//! Persistence for the editor's script library.
//!
//! # Architecture
//!
//! - [`KeyValueStore`] is the raw backend: [`MemoryStore`] or
//!   [`JsonFileStore`]
//! - [`ScriptLibrary`] keeps every script in one serialized map under
//!   [`STORAGE_KEY`] and exposes it as a [`FileStore`]

mod error;
mod kv;
mod library;

pub use error::{StorageError, StorageResult};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use library::{sort_names, FileStore, ScriptLibrary, STORAGE_KEY};
