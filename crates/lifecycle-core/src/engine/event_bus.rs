//! Broadcast bus for informational engine events.
//!
//! Delivery is at-most-once: receivers that fall more than `capacity` events
//! behind lose the oldest events and observe a lag error instead. Work that
//! must happen for every save does not go through here.

use lifecycle_types::LifecycleEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Publishing with no subscribers is not an error; the event is dropped.
	pub fn publish(&self, event: LifecycleEvent) {
		if self.sender.send(event).is_err() {
			tracing::trace!("Event published with no subscribers");
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_types::NotificationEvent;

	#[tokio::test]
	async fn test_publish_reaches_every_subscriber() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.clone().subscribe();

		bus.publish(LifecycleEvent::Notification(NotificationEvent::Sent {
			increment_id: "ORD1".into(),
		}));

		for receiver in [&mut first, &mut second] {
			match receiver.recv().await.unwrap() {
				LifecycleEvent::Notification(NotificationEvent::Sent { increment_id }) => {
					assert_eq!(increment_id, "ORD1")
				},
				other => panic!("unexpected event {:?}", other),
			}
		}
	}

	#[test]
	fn test_publish_without_subscribers_is_ok() {
		let bus = EventBus::new(1);
		bus.publish(LifecycleEvent::Notification(NotificationEvent::Sent {
			increment_id: "ORD2".into(),
		}));
	}
}
