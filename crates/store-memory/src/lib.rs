//! Deterministic in-memory store for fieldsearch.
//!
//! Used by the test suites and the command line tool. Sites can be built in
//! code through [`MemoryStore`] or loaded from an XML description with
//! [`MemoryStore::from_xml`].

mod loader;
mod store;

pub use loader::StoreLoadError;
pub use store::MemoryStore;
