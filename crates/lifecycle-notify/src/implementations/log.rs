//! Transport that writes notifications to the log instead of sending them.
//!
//! Meant for development and for deployments where another system reads the
//! structured log stream.

use crate::{
	NotificationError, NotificationTransport, ShipmentMessage, TransportFactory,
	TransportRegistry,
};
use async_trait::async_trait;
use lifecycle_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};

/// Logs each message at info level.
pub struct LogTransport {
	/// Also log the rendered template variables.
	include_vars: bool,
}

impl LogTransport {
	pub fn new(include_vars: bool) -> Self {
		Self { include_vars }
	}
}

#[async_trait]
impl NotificationTransport for LogTransport {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogTransportSchema)
	}

	async fn send(&self, message: &ShipmentMessage) -> Result<(), NotificationError> {
		let vars = if self.include_vars {
			serde_json::to_string(&message.vars)
				.map_err(|e| NotificationError::Render(e.to_string()))?
		} else {
			String::new()
		};

		tracing::info!(
			transport = "log",
			message_id = %message.message_id,
			template = %message.template_id,
			from = %message.sender.email,
			to = %message.recipient.email,
			order_id = message.order_id().unwrap_or_default(),
			vars = %vars,
			"Shipment notification"
		);
		Ok(())
	}
}

/// Configuration schema for LogTransport.
pub struct LogTransportSchema;

impl ConfigSchema for LogTransportSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("include_vars", FieldType::Boolean)]).validate(config)
	}
}

/// Factory function to create a log transport from configuration.
///
/// Configuration parameters:
/// - `include_vars`: log template variables too (default false)
pub fn create_transport(
	config: &toml::Value,
) -> Result<Box<dyn NotificationTransport>, NotificationError> {
	LogTransportSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let include_vars = config
		.get("include_vars")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	Ok(Box::new(LogTransport::new(include_vars)))
}

/// Registry for the log transport.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = TransportFactory;

	fn factory() -> Self::Factory {
		create_transport
	}
}

impl TransportRegistry for Registry {}
