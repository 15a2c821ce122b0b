//! Configuration for the order lifecycle service.
//!
//! Configuration is TOML. `${VAR}` and `${VAR:-default}` references are
//! substituted from the environment before parsing, and a file may pull in
//! others with `include = ["storage.toml", ...]`. Each top-level section must
//! appear in exactly one file.

mod loader;

pub use loader::ConfigLoader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Only the message; the full error echoes the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	pub notification: NotificationConfig,
	/// HTTP API server; disabled when absent.
	pub api: Option<ApiConfig>,
}

/// Identity and runtime limits of this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
	/// Capacity of the event bus and of the save queue feeding the observer.
	/// Bus subscribers lag past this many events; saves wait when the queue
	/// is full.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
	/// Upper bound on concurrently running observer handlers.
	#[serde(default = "default_max_concurrent_handlers")]
	pub max_concurrent_handlers: usize,
}

fn default_event_capacity() -> usize {
	1024
}

fn default_max_concurrent_handlers() -> usize {
	64
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Implementation name to its raw TOML table.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds between expired-entry sweeps.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Configuration for shipment notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
	/// Which transport implementation to use.
	pub primary: String,
	/// Template identifier handed to the transport.
	#[serde(default = "default_template")]
	pub template: String,
	#[serde(default)]
	pub sender: SenderConfig,
	/// Store views keyed by store id.
	#[serde(default)]
	pub stores: HashMap<String, StoreConfig>,
	/// Transport name to its raw TOML table.
	pub implementations: HashMap<String, toml::Value>,
}

impl NotificationConfig {
	/// Looks up the store view an order was placed in.
	pub fn store(&self, store_id: u32) -> Option<&StoreConfig> {
		self.stores.get(&store_id.to_string())
	}
}

fn default_template() -> String {
	"sales_email_shipment_template".to_string()
}

/// Sender identity of outgoing notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SenderConfig {
	#[serde(default = "default_sender_name")]
	pub name: String,
	#[serde(default = "default_sender_email")]
	pub email: String,
}

impl Default for SenderConfig {
	fn default() -> Self {
		Self {
			name: default_sender_name(),
			email: default_sender_email(),
		}
	}
}

fn default_sender_name() -> String {
	"Sales Team".to_string()
}

fn default_sender_email() -> String {
	"sales@example.com".to_string()
}

/// A store view as exposed to notification templates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
	pub code: String,
	pub name: String,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Substitutes `${VAR}` and `${VAR:-default}` with environment values.
///
/// Inputs above 1MB are rejected before the regex runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;

		ConfigLoader::new(base_dir).load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}
		if self.service.event_capacity == 0 {
			return Err(ConfigError::Validation(
				"event_capacity must be greater than zero".into(),
			));
		}
		if self.service.max_concurrent_handlers == 0 {
			return Err(ConfigError::Validation(
				"max_concurrent_handlers must be greater than zero".into(),
			));
		}

		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if !(1..=86400).contains(&self.storage.cleanup_interval_seconds) {
			return Err(ConfigError::Validation(format!(
				"cleanup_interval_seconds must be between 1 and 86400, got {}",
				self.storage.cleanup_interval_seconds
			)));
		}

		let notification = &self.notification;
		if !notification
			.implementations
			.contains_key(&notification.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary notification transport '{}' not found in implementations",
				notification.primary
			)));
		}
		if notification.template.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Notification template cannot be empty".into(),
			));
		}
		if !notification.sender.email.contains('@') {
			return Err(ConfigError::Validation(format!(
				"Invalid sender email '{}'",
				notification.sender.email
			)));
		}
		for store_id in notification.stores.keys() {
			if store_id.parse::<u32>().is_err() {
				return Err(ConfigError::Validation(format!(
					"Store key '{}' must be a numeric store id",
					store_id
				)));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
