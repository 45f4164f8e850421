// Coffer Infrastructure - In-Memory Engine Adapter
// Implements: Driver, Repository over a versioned in-process document store

mod context;
mod document_repository;
mod driver;
mod store;

pub use context::MemoryContext;
pub use document_repository::MemoryDocumentRepository;
pub use driver::{MemoryDriver, MEMORY_ENGINE};
pub use store::Document;
