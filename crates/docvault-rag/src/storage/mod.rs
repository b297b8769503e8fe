//! Persistent storage for documents and chunks

mod sqlite;

pub use sqlite::ChunkStore;
