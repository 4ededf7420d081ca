#![forbid(unsafe_code)]

pub mod cache;
pub mod document;
pub mod repository;
pub mod sqlite;

pub use cache::{CachedRemoteStore, CachedRepository, DocumentSource, Fetched, Origin};
pub use document::DocumentStore;
pub use repository::{InMemoryRepository, Storage, StorageError};
