//! Builder for constructing lifecycle engines.
//!
//! Storage backends and notification transports are pluggable; the builder
//! creates every configured implementation through its factory, keeps the
//! primary one and wires the result into a [`LifecycleEngine`].

use crate::engine::{event_bus::EventBus, LifecycleEngine};
use lifecycle_config::Config;
use lifecycle_notify::{
	Contact, NotificationError, NotificationService, NotificationTransport, StoreContext,
};
use lifecycle_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by
/// implementation name.
pub struct LifecycleFactories<SF, TF> {
	pub storage_factories: HashMap<String, SF>,
	pub transport_factories: HashMap<String, TF>,
}

pub struct LifecycleBuilder {
	config: Config,
}

impl LifecycleBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine from the configured implementations.
	pub fn build<SF, TF>(
		self,
		factories: LifecycleFactories<SF, TF>,
	) -> Result<LifecycleEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		TF: Fn(&toml::Value) -> Result<Box<dyn NotificationTransport>, NotificationError>,
	{
		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			} else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipping");
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		// Create notification transports
		let notification = &self.config.notification;
		let mut transport_impls = HashMap::new();
		for (name, config) in &notification.implementations {
			if let Some(factory) = factories.transport_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						transport_impls.insert(name.clone(), implementation);
						let is_primary = &notification.primary == name;
						tracing::info!(component = "notification", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "notification",
							implementation = %name,
							error = %e,
							"Failed to create notification transport"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create notification transport '{}': {}",
							name, e
						)));
					},
				}
			} else {
				tracing::warn!(component = "notification", implementation = %name, "Unknown implementation, skipping");
			}
		}

		let transport = transport_impls.remove(&notification.primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"notification transport '{}'",
				notification.primary
			))
		})?;

		let mut stores = Vec::with_capacity(notification.stores.len());
		for (id, store) in &notification.stores {
			let id = id.parse::<u32>().map_err(|_| {
				BuilderError::Config(format!("Store key '{}' must be a numeric store id", id))
			})?;
			stores.push(StoreContext {
				id,
				code: store.code.clone(),
				name: store.name.clone(),
			});
		}
		if stores.is_empty() {
			tracing::warn!(
				component = "notification",
				"No stores configured - shipped notifications will fail for every order"
			);
		}

		let sender = Contact {
			name: notification.sender.name.clone(),
			email: notification.sender.email.clone(),
		};
		let notifier = Arc::new(NotificationService::new(
			transport,
			notification.template.clone(),
			sender,
			stores,
		));

		let event_bus = EventBus::new(self.config.service.event_capacity);

		tracing::info!(
			service_id = %self.config.service.id,
			template = %notification.template,
			"Lifecycle engine built"
		);
		Ok(LifecycleEngine::new(self.config, storage, notifier, event_bus))
	}
}
