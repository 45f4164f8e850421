// Coffer Core - Transaction Coordination & Ports
// NO infrastructure dependencies: concrete storage engines live in infra crates

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{RepositoryBundle, RepositoryProvider, UnitOfWork};
pub use error::{CoreError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
