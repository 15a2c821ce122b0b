//! Order store access.
//!
//! [`OrderRepository`] is the capability the status service needs from the
//! order store. [`StorageOrderRepository`] keeps orders in the configured
//! storage backend. Every committed save is queued on a bounded channel that
//! the engine drains into the change observer, and is also announced on the
//! event bus for informational subscribers.

use crate::engine::event_bus::EventBus;
use async_trait::async_trait;
use chrono::Utc;
use lifecycle_storage::StorageService;
use lifecycle_types::{LifecycleEvent, Order, OrderEvent, OrderSavedEvent, StorageKey};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::instrument;

/// Errors that can occur while reading or writing orders.
#[derive(Debug, Error)]
pub enum RepositoryError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Order with increment ID \"{0}\" already exists.")]
	AlreadyExists(String),
}

/// Lookup and persistence of orders by their human-readable reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
	/// Exact-match lookup by increment id.
	async fn find_by_reference(&self, increment_id: &str)
		-> Result<Option<Order>, RepositoryError>;

	/// Persists the order and returns the committed snapshot.
	async fn save(&self, order: Order) -> Result<Order, RepositoryError>;
}

/// Order store on top of [`StorageService`].
///
/// Saves wait for room on the observer queue once it is full, so a stalled
/// consumer slows writers down instead of losing changes.
pub struct StorageOrderRepository {
	storage: Arc<StorageService>,
	event_bus: EventBus,
	saved_tx: mpsc::Sender<OrderSavedEvent>,
	/// Keeps the pre-save read and the write of one save together.
	write_lock: Mutex<()>,
}

impl StorageOrderRepository {
	pub fn new(
		storage: Arc<StorageService>,
		event_bus: EventBus,
		saved_tx: mpsc::Sender<OrderSavedEvent>,
	) -> Self {
		Self {
			storage,
			event_bus,
			saved_tx,
			write_lock: Mutex::new(()),
		}
	}

	/// Inserts a new order, assigning an entity id when it has none.
	///
	/// The existence check, id assignment and write happen under one lock, so
	/// of several concurrent inserts of the same reference exactly one wins.
	#[instrument(skip_all, fields(increment_id = %order.increment_id))]
	pub async fn create(&self, mut order: Order) -> Result<Order, RepositoryError> {
		let saved = {
			let _guard = self.write_lock.lock().await;

			if self
				.storage
				.exists(StorageKey::Orders.as_str(), &order.increment_id)
				.await
				.map_err(|e| RepositoryError::Storage(e.to_string()))?
			{
				return Err(RepositoryError::AlreadyExists(order.increment_id));
			}

			if order.entity_id == 0 {
				order.entity_id = self
					.storage
					.next_sequence(StorageKey::Orders.as_str())
					.await
					.map_err(|e| RepositoryError::Storage(e.to_string()))?;
			}

			self.write_locked(order).await?
		};

		Ok(self.announce(saved).await)
	}

	/// Reads the previous snapshot and writes `order`. Callers hold
	/// `write_lock`.
	async fn write_locked(&self, mut order: Order) -> Result<OrderSavedEvent, RepositoryError> {
		let previous: Option<Order> = self.find_by_reference(&order.increment_id).await?;
		order.updated_at = Utc::now();
		self.storage
			.store(StorageKey::Orders.as_str(), &order.increment_id, &order)
			.await
			.map_err(|e| RepositoryError::Storage(e.to_string()))?;

		Ok(OrderSavedEvent {
			order,
			original_status: previous.map(|previous| previous.status),
		})
	}

	/// Hands a committed save to the observer queue and the event bus.
	async fn announce(&self, saved: OrderSavedEvent) -> Order {
		tracing::debug!(
			increment_id = %saved.order.increment_id,
			status = %saved.order.status,
			original_status = ?saved.original_status,
			"Order saved"
		);

		let order = saved.order.clone();
		self.event_bus
			.publish(LifecycleEvent::Order(OrderEvent::Saved(saved.clone())));
		if let Err(e) = self.saved_tx.send(saved).await {
			tracing::error!(
				increment_id = %e.0.order.increment_id,
				"Observer queue closed; status change not observed"
			);
		}
		order
	}
}

#[async_trait]
impl OrderRepository for StorageOrderRepository {
	async fn find_by_reference(
		&self,
		increment_id: &str,
	) -> Result<Option<Order>, RepositoryError> {
		self.storage
			.retrieve_optional(StorageKey::Orders.as_str(), increment_id)
			.await
			.map_err(|e| RepositoryError::Storage(e.to_string()))
	}

	async fn save(&self, order: Order) -> Result<Order, RepositoryError> {
		let saved = {
			let _guard = self.write_lock.lock().await;
			self.write_locked(order).await?
		};

		Ok(self.announce(saved).await)
	}
}
