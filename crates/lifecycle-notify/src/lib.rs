//! Customer notifications for the order lifecycle system.
//!
//! [`NotificationService`] is the production [`NotificationDispatcher`]: it
//! renders a shipment message for an order and hands it to whichever
//! [`NotificationTransport`] is configured. Transports only move bytes; all
//! recipient, sender and store resolution happens in the service.

use async_trait::async_trait;
use lifecycle_types::{ConfigSchema, ImplementationRegistry, Order};
use std::collections::HashMap;
use thiserror::Error;
use tracing::instrument;

mod message;

pub use message::{render_shipment, Contact, ShipmentMessage, StoreContext};

pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur while notifying a customer.
#[derive(Debug, Error)]
pub enum NotificationError {
	#[error("Store {0} is not configured")]
	StoreNotFound(u32),
	#[error("Render error: {0}")]
	Render(String),
	#[error("Transport error: {0}")]
	Transport(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Boundary the change observer notifies through.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
	/// Tells the customer their order has shipped. Orders without a customer
	/// address are skipped and report success.
	async fn notify_shipped(&self, order: &Order) -> Result<(), NotificationError>;
}

/// Delivery mechanism for rendered messages.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationTransport: Send + Sync {
	/// Returns the configuration schema for this transport.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn send(&self, message: &ShipmentMessage) -> Result<(), NotificationError>;
}

/// Type alias for transport factory functions.
pub type TransportFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationTransport>, NotificationError>;

/// Registry trait for transport implementations.
pub trait TransportRegistry: ImplementationRegistry<Factory = TransportFactory> {}

/// Get all registered transport implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, TransportFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Renders shipment notifications and sends them through a transport.
pub struct NotificationService {
	transport: Box<dyn NotificationTransport>,
	template_id: String,
	sender: Contact,
	stores: HashMap<u32, StoreContext>,
}

impl NotificationService {
	pub fn new(
		transport: Box<dyn NotificationTransport>,
		template_id: impl Into<String>,
		sender: Contact,
		stores: impl IntoIterator<Item = StoreContext>,
	) -> Self {
		Self {
			transport,
			template_id: template_id.into(),
			sender,
			stores: stores.into_iter().map(|store| (store.id, store)).collect(),
		}
	}

	fn store(&self, store_id: u32) -> Result<&StoreContext, NotificationError> {
		self.stores
			.get(&store_id)
			.ok_or(NotificationError::StoreNotFound(store_id))
	}
}

#[async_trait]
impl NotificationDispatcher for NotificationService {
	#[instrument(skip_all, fields(increment_id = %order.increment_id))]
	async fn notify_shipped(&self, order: &Order) -> Result<(), NotificationError> {
		if !order.has_customer_contact() {
			tracing::debug!("No customer email on order, skipping shipped notification");
			return Ok(());
		}

		let store = self.store(order.store_id)?;
		let message = render_shipment(order, store, &self.sender, &self.template_id)?;
		self.transport.send(&message).await?;

		tracing::info!(
			"Shipped notification sent to customer for order #{}",
			order.increment_id
		);
		Ok(())
	}
}
