//! Event types for inter-service communication.
//!
//! Events flow through the engine's event bus so the change observer and any
//! other subscriber can react to committed order mutations.

use crate::{Order, StatusAuditRecord};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
	/// Events from the order store and the status service.
	Order(OrderEvent),
	/// Events from the audit log.
	Audit(AuditEvent),
	/// Events from the notification dispatcher.
	Notification(NotificationEvent),
}

/// Payload delivered after an order save has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSavedEvent {
	/// Post-save snapshot.
	pub order: Order,
	/// Status before the save, `None` when the order was first inserted.
	pub original_status: Option<String>,
}

impl OrderSavedEvent {
	/// Whether the save moved the order to a different status.
	pub fn status_changed(&self) -> bool {
		self.original_status
			.as_deref()
			.is_some_and(|original| original != self.order.status)
	}
}

/// Events related to order persistence and status updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// An order save has committed.
	Saved(OrderSavedEvent),
	/// The status service applied a requested transition.
	StatusUpdated {
		increment_id: String,
		old_status: String,
		new_status: String,
	},
}

/// Events related to the status audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditEvent {
	Recorded { record: StatusAuditRecord },
	WriteFailed { increment_id: String, error: String },
}

/// Events related to customer notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationEvent {
	Sent { increment_id: String },
	Failed { increment_id: String, error: String },
}
