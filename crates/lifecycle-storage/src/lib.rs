//! Storage for the order lifecycle system.
//!
//! Backends implement a byte-level key/value [`StorageInterface`];
//! [`StorageService`] layers typed JSON values, `namespace:id` keys and
//! monotonic sequences on top of whichever backend is configured.

use async_trait::async_trait;
use lifecycle_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes. `None` lets the backend apply its configured TTL.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries and returns how many were dropped.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed storage on top of a backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
	/// Serializes sequence read-modify-write cycles.
	sequence_lock: Mutex<()>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			sequence_lock: Mutex::new(()),
		}
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a value as JSON, overwriting any previous value.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	pub async fn store_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes, ttl)
			.await
	}

	/// Retrieves and deserializes a value. Missing keys are `NotFound`.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve) but maps a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Overwrites an existing value; `NotFound` if the key is absent.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		if !self.exists(namespace, id).await? {
			return Err(StorageError::NotFound);
		}
		self.store(namespace, id, data).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	/// Returns the next value of the named counter, starting at 1.
	///
	/// Counters live under the `sequences` namespace and are never expired
	/// by a configured TTL.
	pub async fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
		let _guard = self.sequence_lock.lock().await;
		let namespace = StorageKey::Sequences.as_str();

		let current: u64 = self
			.retrieve_optional(namespace, name)
			.await?
			.unwrap_or_default();
		let next = current + 1;
		self.store_with_ttl(namespace, name, &next, Some(Duration::ZERO))
			.await?;
		Ok(next)
	}

	/// Removes expired entries from the backend.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;
	use std::sync::Arc;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Snapshot {
		status: String,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_typed_round_trip() {
		let storage = service();
		let snapshot = Snapshot {
			status: "processing".into(),
		};

		storage.store("orders", "ORD1", &snapshot).await.unwrap();
		let loaded: Snapshot = storage.retrieve("orders", "ORD1").await.unwrap();

		assert_eq!(loaded, snapshot);
		assert!(storage.exists("orders", "ORD1").await.unwrap());
	}

	#[tokio::test]
	async fn test_retrieve_optional_missing() {
		let storage = service();
		let loaded: Option<Snapshot> = storage.retrieve_optional("orders", "nope").await.unwrap();
		assert!(loaded.is_none());
	}

	#[tokio::test]
	async fn test_update_requires_existing_key() {
		let storage = service();
		let snapshot = Snapshot {
			status: "new".into(),
		};

		let result = storage.update("orders", "ORD2", &snapshot).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_corrupt_value_is_serialization_error() {
		let storage = service();
		storage.store("orders", "ORD3", &42u64).await.unwrap();

		let result: Result<Snapshot, _> = storage.retrieve("orders", "ORD3").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[tokio::test]
	async fn test_sequences_are_monotonic_under_concurrency() {
		let storage = Arc::new(service());

		let handles: Vec<_> = (0..16)
			.map(|_| {
				let storage = storage.clone();
				tokio::spawn(async move { storage.next_sequence("audit").await.unwrap() })
			})
			.collect();

		let mut ids = Vec::new();
		for handle in handles {
			ids.push(handle.await.unwrap());
		}
		ids.sort_unstable();

		assert_eq!(ids, (1..=16).collect::<Vec<u64>>());
		assert_eq!(storage.next_sequence("other").await.unwrap(), 1);
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
