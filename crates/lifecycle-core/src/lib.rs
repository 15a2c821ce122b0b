//! Core engine for the order lifecycle system.
//!
//! Status updates go through [`status::OrderStatusService`], which classifies
//! raw status codes into lifecycle states and rejects moves the transition
//! table forbids. Every committed save is announced on the event bus; the
//! [`observer::ChangeObserver`] reacts by appending to the audit log and, for
//! shipped orders, notifying the customer. [`builder::LifecycleBuilder`]
//! assembles all of it from configuration.

pub mod audit;
pub mod builder;
pub mod classifier;
pub mod engine;
pub mod observer;
pub mod repository;
pub mod status;
pub mod transition;

pub use builder::{BuilderError, LifecycleBuilder, LifecycleFactories};
pub use engine::{event_bus::EventBus, EngineError, LifecycleEngine};
pub use repository::{OrderRepository, RepositoryError, StorageOrderRepository};
pub use status::{LocalizedOperationError, OrderStatusService, StatusUpdateError};
