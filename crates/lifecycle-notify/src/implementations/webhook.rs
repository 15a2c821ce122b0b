//! Transport that POSTs the rendered message as JSON to an HTTP endpoint.
//!
//! The receiving service owns actual email delivery. Failed attempts are
//! retried with exponential backoff; a non-2xx answer counts as a failure.

use crate::{
	NotificationError, NotificationTransport, ShipmentMessage, TransportFactory,
	TransportRegistry,
};
use async_trait::async_trait;
use lifecycle_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 100;
/// Header carrying the message id so receivers can drop duplicate deliveries.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP webhook transport.
pub struct WebhookTransport {
	client: reqwest::Client,
	url: String,
	retry_attempts: u32,
}

impl WebhookTransport {
	pub fn new(
		url: impl Into<String>,
		timeout: Duration,
		retry_attempts: u32,
	) -> Result<Self, NotificationError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotificationError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			url: url.into(),
			retry_attempts: retry_attempts.max(1),
		})
	}

	async fn post_once(&self, message: &ShipmentMessage) -> Result<(), NotificationError> {
		let response = self
			.client
			.post(&self.url)
			.header(IDEMPOTENCY_HEADER, &message.message_id)
			.json(message)
			.send()
			.await
			.map_err(|e| NotificationError::Transport(e.to_string()))?;

		if response.status().is_success() {
			Ok(())
		} else {
			Err(NotificationError::Transport(format!(
				"webhook responded with {}",
				response.status()
			)))
		}
	}
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookTransportSchema)
	}

	async fn send(&self, message: &ShipmentMessage) -> Result<(), NotificationError> {
		let mut attempt = 0;
		loop {
			match self.post_once(message).await {
				Ok(()) => return Ok(()),
				Err(e) if attempt + 1 >= self.retry_attempts => return Err(e),
				Err(e) => {
					tracing::warn!(
						transport = "webhook",
						attempt = attempt + 1,
						error = %e,
						"Webhook delivery failed, retrying"
					);
					tokio::time::sleep(Duration::from_millis(BASE_BACKOFF_MS << attempt)).await;
					attempt += 1;
				},
			}
		}
	}
}

/// Configuration schema for WebhookTransport.
pub struct WebhookTransportSchema;

impl ConfigSchema for WebhookTransportSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("must be an http(s) URL".to_string()),
				}
			})],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new(
					"retry_attempts",
					FieldType::Integer {
						min: Some(1),
						max: Some(10),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a webhook transport from configuration.
///
/// Configuration parameters:
/// - `url`: endpoint receiving the JSON message (required)
/// - `timeout_seconds`: per-request timeout (default 10)
/// - `retry_attempts`: total attempts per message (default 3)
pub fn create_transport(
	config: &toml::Value,
) -> Result<Box<dyn NotificationTransport>, NotificationError> {
	WebhookTransportSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotificationError::Configuration("url is required".into()))?;
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
	let retry_attempts = config
		.get("retry_attempts")
		.and_then(|v| v.as_integer())
		.map(|v| v as u32)
		.unwrap_or(DEFAULT_RETRY_ATTEMPTS);

	Ok(Box::new(WebhookTransport::new(
		url,
		Duration::from_secs(timeout_seconds),
		retry_attempts,
	)?))
}

/// Registry for the webhook transport.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = TransportFactory;

	fn factory() -> Self::Factory {
		create_transport
	}
}

impl TransportRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Contact;
	use axum::{
		extract::State,
		http::{HeaderMap, StatusCode},
		routing::post,
		Json, Router,
	};
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	};

	fn message() -> ShipmentMessage {
		let mut vars = serde_json::Map::new();
		vars.insert("order_id".into(), "000000031".into());
		ShipmentMessage {
			message_id: "0b7f5a52-6f0e-4d0c-9a53-2f1e6c1d8f31".into(),
			template_id: "sales_email_shipment_template".into(),
			sender: Contact {
				name: "Sales Team".into(),
				email: "sales@example.com".into(),
			},
			recipient: Contact {
				name: "Ana Ruiz".into(),
				email: "ana@example.com".into(),
			},
			vars,
		}
	}

	/// Serves `status` on `/hook` and counts hits.
	async fn spawn_endpoint(status: StatusCode) -> (String, Arc<AtomicUsize>) {
		let hits = Arc::new(AtomicUsize::new(0));
		let app = Router::new()
			.route(
				"/hook",
				post(
					|State((hits, status)): State<(Arc<AtomicUsize>, StatusCode)>,
					 headers: HeaderMap,
					 Json(body): Json<ShipmentMessage>| async move {
						assert_eq!(body.order_id(), Some("000000031"));
						assert_eq!(
							headers.get(IDEMPOTENCY_HEADER).and_then(|v| v.to_str().ok()),
							Some(body.message_id.as_str())
						);
						hits.fetch_add(1, Ordering::SeqCst);
						status
					},
				),
			)
			.with_state((hits.clone(), status));

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		(format!("http://{}/hook", addr), hits)
	}

	#[tokio::test]
	async fn test_posts_message() {
		let (url, hits) = spawn_endpoint(StatusCode::OK).await;
		let transport = WebhookTransport::new(url, Duration::from_secs(5), 3).unwrap();

		transport.send(&message()).await.unwrap();
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_non_success_status_retried_then_fails() {
		let (url, hits) = spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
		let transport = WebhookTransport::new(url, Duration::from_secs(5), 2).unwrap();

		let result = transport.send(&message()).await;
		assert!(matches!(result, Err(NotificationError::Transport(_))));
		assert_eq!(hits.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_schema() {
		let valid: toml::Value =
			toml::from_str("url = \"https://hooks.example.com\"\ntimeout_seconds = 10").unwrap();
		assert!(WebhookTransportSchema.validate(&valid).is_ok());

		let missing: toml::Value = toml::from_str("timeout_seconds = 10").unwrap();
		assert!(WebhookTransportSchema.validate(&missing).is_err());

		let bad_scheme: toml::Value = toml::from_str("url = \"smtp://mail\"").unwrap();
		assert!(matches!(
			create_transport(&bad_scheme),
			Err(NotificationError::Configuration(_))
		));
	}
}
