// Port Layer - Interfaces implemented by storage engines

pub mod driver;
pub mod repository;

// Re-exports
pub use driver::Driver;
pub use repository::Repository;
