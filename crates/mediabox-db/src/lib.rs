//! Mediabox Database Layer
//!
//! The `MediaRepository` trait is the narrow persistence interface the lifecycle
//! service depends on. It is implemented for Postgres (sqlx) and in memory.

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;

// Re-exports
pub use memory::InMemoryMediaRepository;
pub use pool::{connect, run_migrations, setup_database};
pub use postgres::PgMediaRepository;
pub use repository::{MediaRepository, MediaTransaction};
