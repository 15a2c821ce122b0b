//! Validated order status updates.
//!
//! The service resolves the order, checks the requested move against the
//! transition table, applies state and status together, appends a history
//! entry and saves. It never notifies the customer itself; that happens in
//! the change observer once the save has committed.

use crate::classifier::classify;
use crate::engine::event_bus::EventBus;
use crate::repository::{OrderRepository, RepositoryError};
use crate::transition::{TransitionError, TransitionValidator};
use lifecycle_types::{LifecycleEvent, LifecycleState, OrderEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Why a status update failed.
#[derive(Debug, Error)]
pub enum StatusUpdateError {
	#[error("Order with increment ID \"{0}\" does not exist.")]
	OrderNotFound(String),
	/// Rejected before the service is reached.
	#[error("Status cannot be empty.")]
	EmptyStatus,
	#[error(transparent)]
	InvalidTransition(#[from] TransitionError),
	#[error(transparent)]
	Repository(#[from] RepositoryError),
}

/// The single error kind callers of the status service see.
///
/// Callers distinguish failures by message text only; the underlying cause
/// stays available for logging and tests.
#[derive(Debug, Error)]
#[error("Error updating order status: {source}")]
pub struct LocalizedOperationError {
	#[source]
	source: StatusUpdateError,
}

impl LocalizedOperationError {
	pub fn kind(&self) -> &StatusUpdateError {
		&self.source
	}
}

impl From<StatusUpdateError> for LocalizedOperationError {
	fn from(source: StatusUpdateError) -> Self {
		Self { source }
	}
}

/// A requested status change, built for logging and never persisted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
	pub increment_id: String,
	pub old_status: String,
	pub new_status: String,
	pub from: LifecycleState,
	pub to: LifecycleState,
}

pub struct OrderStatusService {
	repository: Arc<dyn OrderRepository>,
	event_bus: EventBus,
}

impl OrderStatusService {
	pub fn new(repository: Arc<dyn OrderRepository>, event_bus: EventBus) -> Self {
		Self {
			repository,
			event_bus,
		}
	}

	/// Moves the order `increment_id` to `new_status`.
	///
	/// Returns `Ok(true)` on success; every failure is reported as a
	/// [`LocalizedOperationError`] and leaves the order untouched.
	#[instrument(skip_all, fields(increment_id = %increment_id, new_status = %new_status))]
	pub async fn update_status(
		&self,
		increment_id: &str,
		new_status: &str,
		comment: Option<&str>,
	) -> Result<bool, LocalizedOperationError> {
		match self.apply(increment_id, new_status, comment).await {
			Ok(transition) => {
				tracing::info!(
					old_status = %transition.old_status,
					from = %transition.from,
					to = %transition.to,
					"Order status updated"
				);
				self.event_bus
					.publish(LifecycleEvent::Order(OrderEvent::StatusUpdated {
						increment_id: transition.increment_id,
						old_status: transition.old_status,
						new_status: transition.new_status,
					}));
				Ok(true)
			},
			Err(e) => {
				tracing::error!(error = %e, "Error updating order status");
				Err(e.into())
			},
		}
	}

	/// Same contract as [`update_status`](Self::update_status); the name the
	/// HTTP layer uses.
	pub async fn update_order_status(
		&self,
		increment_id: &str,
		new_status: &str,
		comment: Option<&str>,
	) -> Result<bool, LocalizedOperationError> {
		self.update_status(increment_id, new_status, comment).await
	}

	async fn apply(
		&self,
		increment_id: &str,
		new_status: &str,
		comment: Option<&str>,
	) -> Result<StatusTransition, StatusUpdateError> {
		let mut order = self
			.repository
			.find_by_reference(increment_id)
			.await?
			.ok_or_else(|| StatusUpdateError::OrderNotFound(increment_id.to_string()))?;

		let transition = StatusTransition {
			increment_id: order.increment_id.clone(),
			old_status: order.status.clone(),
			new_status: new_status.to_string(),
			from: classify(&order.status),
			to: classify(new_status),
		};
		TransitionValidator::validate(transition.from, transition.to)?;

		order.apply_status(transition.to, new_status);
		let comment = comment.filter(|c| !c.is_empty()).unwrap_or_default();
		order.add_status_history_comment(comment, new_status, false);

		self.repository.save(order).await?;
		Ok(transition)
	}
}
