//! Reaction to committed order saves.
//!
//! For every save that changed the status the observer writes one audit
//! record, and when the new status means the order has shipped it asks the
//! dispatcher to notify the customer. Both side effects are attempted
//! independently and neither failure reaches the code that saved the order.

use crate::audit::AuditLog;
use crate::classifier::classify;
use crate::engine::event_bus::EventBus;
use lifecycle_notify::NotificationDispatcher;
use lifecycle_types::{
	AuditEvent, LifecycleEvent, LifecycleState, NotificationEvent, OrderSavedEvent,
	StatusAuditRecord,
};
use std::sync::Arc;
use tracing::instrument;

/// Raw status that counts as shipped even though it classifies as processing.
pub const SHIPPED_STATUS: &str = "shipped";

/// What the observer did for one save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverOutcome {
	/// Insert or same-status save; nothing recorded.
	Unchanged,
	Processed { audited: bool, notified: bool },
}

/// Whether `status` should trigger a shipped notification.
pub fn is_shipped(status: &str) -> bool {
	status == SHIPPED_STATUS || classify(status) == LifecycleState::Complete
}

pub struct ChangeObserver {
	audit_log: Arc<dyn AuditLog>,
	notifier: Arc<dyn NotificationDispatcher>,
	event_bus: EventBus,
}

impl ChangeObserver {
	pub fn new(
		audit_log: Arc<dyn AuditLog>,
		notifier: Arc<dyn NotificationDispatcher>,
		event_bus: EventBus,
	) -> Self {
		Self {
			audit_log,
			notifier,
			event_bus,
		}
	}

	#[instrument(skip_all, fields(increment_id = %event.order.increment_id))]
	pub async fn handle(&self, event: &OrderSavedEvent) -> ObserverOutcome {
		let order = &event.order;
		let original = match event.original_status.as_deref() {
			Some(original) if original != order.status => original,
			_ => return ObserverOutcome::Unchanged,
		};

		let audited = self.record(order.entity_id, &order.increment_id, original, &order.status).await;

		let notified = if is_shipped(&order.status) {
			match self.notifier.notify_shipped(order).await {
				Ok(()) => {
					self.event_bus
						.publish(LifecycleEvent::Notification(NotificationEvent::Sent {
							increment_id: order.increment_id.clone(),
						}));
					true
				},
				Err(e) => {
					tracing::error!(error = %e, "Error sending shipped notification: {}", e);
					self.event_bus
						.publish(LifecycleEvent::Notification(NotificationEvent::Failed {
							increment_id: order.increment_id.clone(),
							error: e.to_string(),
						}));
					false
				},
			}
		} else {
			false
		};

		ObserverOutcome::Processed { audited, notified }
	}

	async fn record(&self, order_id: u64, increment_id: &str, old: &str, new: &str) -> bool {
		let result = match StatusAuditRecord::new(order_id, increment_id, old, new) {
			Ok(record) => self.audit_log.append(record).await,
			Err(e) => Err(e.into()),
		};

		match result {
			Ok(record) => {
				self.event_bus
					.publish(LifecycleEvent::Audit(AuditEvent::Recorded { record }));
				true
			},
			Err(e) => {
				tracing::error!(error = %e, "Error logging order status change: {}", e);
				self.event_bus
					.publish(LifecycleEvent::Audit(AuditEvent::WriteFailed {
						increment_id: increment_id.to_string(),
						error: e.to_string(),
					}));
				false
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audit::{AuditWriteError, MockAuditLog};
	use lifecycle_notify::{MockNotificationDispatcher, NotificationError};
	use lifecycle_types::Order;

	fn event(original: Option<&str>, current: &str) -> OrderSavedEvent {
		OrderSavedEvent {
			order: Order::new(42, "ORD42", classify(current), current, 1)
				.with_customer("kim@example.com", "Kim", "Park"),
			original_status: original.map(str::to_string),
		}
	}

	fn observer(audit_log: MockAuditLog, notifier: MockNotificationDispatcher) -> ChangeObserver {
		ChangeObserver::new(Arc::new(audit_log), Arc::new(notifier), EventBus::new(16))
	}

	fn persisted(record: StatusAuditRecord) -> Result<StatusAuditRecord, AuditWriteError> {
		let created_at = record.created_at;
		Ok(record.persisted(1, created_at))
	}

	#[tokio::test]
	async fn test_unchanged_status_does_nothing() {
		let mut audit_log = MockAuditLog::new();
		audit_log.expect_append().never();
		let mut notifier = MockNotificationDispatcher::new();
		notifier.expect_notify_shipped().never();

		let outcome = observer(audit_log, notifier)
			.handle(&event(Some("complete"), "complete"))
			.await;
		assert_eq!(outcome, ObserverOutcome::Unchanged);
	}

	#[tokio::test]
	async fn test_insert_does_nothing() {
		let mut audit_log = MockAuditLog::new();
		audit_log.expect_append().never();
		let mut notifier = MockNotificationDispatcher::new();
		notifier.expect_notify_shipped().never();

		let outcome = observer(audit_log, notifier).handle(&event(None, "complete")).await;
		assert_eq!(outcome, ObserverOutcome::Unchanged);
	}

	#[tokio::test]
	async fn test_completion_audits_and_notifies() {
		let mut audit_log = MockAuditLog::new();
		audit_log
			.expect_append()
			.withf(|record| {
				record.order_id == 42
					&& record.increment_id == "ORD42"
					&& record.old_status == "processing"
					&& record.new_status == "complete"
					&& record.entity_id.is_none()
			})
			.times(1)
			.returning(persisted);
		let mut notifier = MockNotificationDispatcher::new();
		notifier
			.expect_notify_shipped()
			.withf(|order| order.increment_id == "ORD42")
			.times(1)
			.returning(|_| Ok(()));

		let outcome = observer(audit_log, notifier)
			.handle(&event(Some("processing"), "complete"))
			.await;
		assert_eq!(
			outcome,
			ObserverOutcome::Processed {
				audited: true,
				notified: true
			}
		);
	}

	#[tokio::test]
	async fn test_shipped_status_notifies() {
		let mut audit_log = MockAuditLog::new();
		audit_log.expect_append().times(1).returning(persisted);
		let mut notifier = MockNotificationDispatcher::new();
		notifier.expect_notify_shipped().times(1).returning(|_| Ok(()));

		let outcome = observer(audit_log, notifier)
			.handle(&event(Some("processing"), "shipped"))
			.await;
		assert_eq!(
			outcome,
			ObserverOutcome::Processed {
				audited: true,
				notified: true
			}
		);
	}

	#[tokio::test]
	async fn test_non_shipping_change_only_audits() {
		let mut audit_log = MockAuditLog::new();
		audit_log.expect_append().times(1).returning(persisted);
		let mut notifier = MockNotificationDispatcher::new();
		notifier.expect_notify_shipped().never();

		let outcome = observer(audit_log, notifier)
			.handle(&event(Some("pending"), "processing"))
			.await;
		assert_eq!(
			outcome,
			ObserverOutcome::Processed {
				audited: true,
				notified: false
			}
		);
	}

	#[tokio::test]
	async fn test_notification_failure_is_contained() {
		let mut audit_log = MockAuditLog::new();
		audit_log.expect_append().times(1).returning(persisted);
		let mut notifier = MockNotificationDispatcher::new();
		notifier
			.expect_notify_shipped()
			.times(1)
			.returning(|_| Err(NotificationError::Transport("smtp down".into())));

		let bus = EventBus::new(16);
		let mut receiver = bus.subscribe();
		let observer = ChangeObserver::new(Arc::new(audit_log), Arc::new(notifier), bus);

		let outcome = observer.handle(&event(Some("processing"), "complete")).await;
		assert_eq!(
			outcome,
			ObserverOutcome::Processed {
				audited: true,
				notified: false
			}
		);

		assert!(matches!(
			receiver.recv().await.unwrap(),
			LifecycleEvent::Audit(AuditEvent::Recorded { .. })
		));
		assert!(matches!(
			receiver.recv().await.unwrap(),
			LifecycleEvent::Notification(NotificationEvent::Failed { .. })
		));
	}

	#[tokio::test]
	async fn test_audit_failure_does_not_block_notification() {
		let mut audit_log = MockAuditLog::new();
		audit_log
			.expect_append()
			.times(1)
			.returning(|_| Err(AuditWriteError::Storage("disk full".into())));
		let mut notifier = MockNotificationDispatcher::new();
		notifier.expect_notify_shipped().times(1).returning(|_| Ok(()));

		let outcome = observer(audit_log, notifier)
			.handle(&event(Some("processing"), "complete"))
			.await;
		assert_eq!(
			outcome,
			ObserverOutcome::Processed {
				audited: false,
				notified: true
			}
		);
	}

	#[tokio::test]
	async fn test_invalid_record_is_swallowed() {
		let mut audit_log = MockAuditLog::new();
		audit_log.expect_append().never();
		let mut notifier = MockNotificationDispatcher::new();
		notifier.expect_notify_shipped().never();

		let mut saved = event(Some("pending"), "processing");
		saved.order.entity_id = 0;

		let outcome = observer(audit_log, notifier).handle(&saved).await;
		assert_eq!(
			outcome,
			ObserverOutcome::Processed {
				audited: false,
				notified: false
			}
		);
	}

	#[test]
	fn test_is_shipped() {
		assert!(is_shipped("complete"));
		assert!(is_shipped("shipped"));
		assert!(!is_shipped("processing"));
		assert!(!is_shipped("closed"));
	}
}
