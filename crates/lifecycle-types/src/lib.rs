//! Common types for the order lifecycle system.
//!
//! Shared data types live here so the storage, notification, core and
//! service crates agree on a single definition of an order, an audit record
//! and the events that flow between them.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Status audit records.
pub mod audit;
/// Event types for inter-service communication.
pub mod events;
/// Order snapshot, lifecycle states and status history.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Configuration validation types for implementation tables.
pub mod validation;

pub use api::*;
pub use audit::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
