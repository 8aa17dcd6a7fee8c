//! Mediabox Services
//!
//! The media record lifecycle (ingest, rename, folders, safe deletion) and tracing setup
//! shared by the binaries.

pub mod lifecycle;
pub mod telemetry;

pub use lifecycle::MediaLifecycle;
pub use telemetry::init_tracing;
