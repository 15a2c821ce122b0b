//! Shipment message rendering.
//!
//! Rendering is a pure function of the order, the store view and the sender
//! identity. Nothing here touches global locale or store state.

use crate::NotificationError;
use lifecycle_types::Order;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store view an order belongs to, as exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreContext {
	pub id: u32,
	pub code: String,
	pub name: String,
}

/// A named mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
	pub name: String,
	pub email: String,
}

/// A fully rendered shipment notification, ready for a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentMessage {
	/// Unique per rendered message; repeated deliveries of one message share it.
	pub message_id: String,
	pub template_id: String,
	pub sender: Contact,
	pub recipient: Contact,
	/// Template variables: `order`, `order_id`, `customer_name`, `store`.
	pub vars: serde_json::Map<String, serde_json::Value>,
}

impl ShipmentMessage {
	/// Order reference the message is about.
	pub fn order_id(&self) -> Option<&str> {
		self.vars.get("order_id").and_then(|v| v.as_str())
	}
}

/// Builds the shipment message for `order`.
///
/// The order must carry a customer email; callers check
/// [`Order::has_customer_contact`] first.
pub fn render_shipment(
	order: &Order,
	store: &StoreContext,
	sender: &Contact,
	template_id: &str,
) -> Result<ShipmentMessage, NotificationError> {
	let email = order
		.customer_email
		.clone()
		.ok_or_else(|| NotificationError::Render("order has no customer email".into()))?;
	let customer_name = order.customer_name();

	let mut vars = serde_json::Map::new();
	vars.insert(
		"order".into(),
		serde_json::to_value(order).map_err(|e| NotificationError::Render(e.to_string()))?,
	);
	vars.insert("order_id".into(), order.increment_id.clone().into());
	vars.insert("customer_name".into(), customer_name.clone().into());
	vars.insert(
		"store".into(),
		serde_json::to_value(store).map_err(|e| NotificationError::Render(e.to_string()))?,
	);

	Ok(ShipmentMessage {
		message_id: Uuid::new_v4().to_string(),
		template_id: template_id.to_string(),
		sender: sender.clone(),
		recipient: Contact {
			name: customer_name,
			email,
		},
		vars,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_types::LifecycleState;

	#[test]
	fn test_render_shipment_vars() {
		let order = Order::new(12, "000000012", LifecycleState::Complete, "complete", 1)
			.with_customer("jane@example.com", "Jane", "Doe");
		let store = StoreContext {
			id: 1,
			code: "default".into(),
			name: "Default Store View".into(),
		};
		let sender = Contact {
			name: "Sales Team".into(),
			email: "sales@example.com".into(),
		};

		let message =
			render_shipment(&order, &store, &sender, "sales_email_shipment_template").unwrap();

		assert_eq!(message.template_id, "sales_email_shipment_template");
		assert_eq!(message.recipient.email, "jane@example.com");
		assert_eq!(message.recipient.name, "Jane Doe");
		assert_eq!(message.sender, sender);
		assert_eq!(message.order_id(), Some("000000012"));
		assert_eq!(message.vars["customer_name"], "Jane Doe");
		assert_eq!(message.vars["store"]["code"], "default");
		assert_eq!(message.vars["order"]["status"], "complete");

		let again =
			render_shipment(&order, &store, &sender, "sales_email_shipment_template").unwrap();
		assert_ne!(message.message_id, again.message_id);
	}

	#[test]
	fn test_render_without_email_fails() {
		let order = Order::new(12, "000000012", LifecycleState::Complete, "complete", 1);
		let store = StoreContext {
			id: 1,
			code: "default".into(),
			name: "Default".into(),
		};
		let sender = Contact {
			name: "Sales Team".into(),
			email: "sales@example.com".into(),
		};

		assert!(matches!(
			render_shipment(&order, &store, &sender, "t"),
			Err(NotificationError::Render(_))
		));
	}
}
