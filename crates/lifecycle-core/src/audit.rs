//! Append-only status audit log.
//!
//! Records are written once and never updated or deleted. Each append takes
//! the next id from a storage sequence, so ids are strictly increasing in
//! write order. The per-order index is written before the record itself; an
//! append that fails part way leaves at most a skipped id in the index,
//! never a record that cannot be listed.

use async_trait::async_trait;
use chrono::Utc;
use lifecycle_storage::StorageService;
use lifecycle_types::{AuditRecordError, StatusAuditRecord, StorageKey};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur while writing or reading the audit log.
#[derive(Debug, Error)]
pub enum AuditWriteError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid audit record: {0}")]
	InvalidRecord(#[from] AuditRecordError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
	/// Persists `record`, returning it with its assigned id and timestamp.
	async fn append(&self, record: StatusAuditRecord) -> Result<StatusAuditRecord, AuditWriteError>;

	/// All records for one order, oldest first.
	async fn list_for_order(&self, order_id: u64)
		-> Result<Vec<StatusAuditRecord>, AuditWriteError>;
}

/// Audit log kept in the `vendor_order_status_log` storage namespace.
pub struct StorageAuditLog {
	storage: Arc<StorageService>,
	/// Serializes id assignment, record write and index update.
	append_lock: Mutex<()>,
}

impl StorageAuditLog {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			append_lock: Mutex::new(()),
		}
	}

	async fn index(&self, order_id: u64) -> Result<Vec<u64>, AuditWriteError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::OrderStatusLogByOrder.as_str(), &order_id.to_string())
			.await
			.map_err(|e| AuditWriteError::Storage(e.to_string()))?
			.unwrap_or_default())
	}
}

#[async_trait]
impl AuditLog for StorageAuditLog {
	async fn append(&self, record: StatusAuditRecord) -> Result<StatusAuditRecord, AuditWriteError> {
		// Fields are public, so re-check what the constructor enforces
		if record.order_id == 0 {
			return Err(AuditRecordError::InvalidOrderId.into());
		}
		if record.increment_id.trim().is_empty() {
			return Err(AuditRecordError::EmptyIncrementId.into());
		}
		if record.is_persisted() {
			return Err(AuditRecordError::AlreadyPersisted.into());
		}

		let _guard = self.append_lock.lock().await;

		let entity_id = self
			.storage
			.next_sequence(StorageKey::OrderStatusLog.as_str())
			.await
			.map_err(|e| AuditWriteError::Storage(e.to_string()))?;
		let record = record.persisted(entity_id, Utc::now());

		let mut index = self.index(record.order_id).await?;
		index.push(entity_id);
		self.storage
			.store(
				StorageKey::OrderStatusLogByOrder.as_str(),
				&record.order_id.to_string(),
				&index,
			)
			.await
			.map_err(|e| AuditWriteError::Storage(e.to_string()))?;

		self.storage
			.store(
				StorageKey::OrderStatusLog.as_str(),
				&entity_id.to_string(),
				&record,
			)
			.await
			.map_err(|e| AuditWriteError::Storage(e.to_string()))?;

		tracing::debug!(
			entity_id,
			increment_id = %record.increment_id,
			old_status = %record.old_status,
			new_status = %record.new_status,
			"Status change recorded"
		);
		Ok(record)
	}

	async fn list_for_order(
		&self,
		order_id: u64,
	) -> Result<Vec<StatusAuditRecord>, AuditWriteError> {
		let mut records = Vec::new();
		for entity_id in self.index(order_id).await? {
			let record = self
				.storage
				.retrieve_optional::<StatusAuditRecord>(
					StorageKey::OrderStatusLog.as_str(),
					&entity_id.to_string(),
				)
				.await
				.map_err(|e| AuditWriteError::Storage(e.to_string()))?;

			match record {
				Some(record) => records.push(record),
				// Expired under a configured TTL, or its write failed
				None => tracing::debug!(entity_id, "Indexed audit record missing"),
			}
		}
		records.sort_by_key(|record| record.entity_id);
		Ok(records)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_storage::implementations::memory::MemoryStorage;
	use lifecycle_storage::{StorageError, StorageInterface};
	use lifecycle_types::ConfigSchema;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::time::Duration;

	/// Memory backend whose audit record writes can be made to fail.
	struct FlakyRecordStorage {
		inner: MemoryStorage,
		fail_records: Arc<AtomicBool>,
	}

	#[async_trait]
	impl StorageInterface for FlakyRecordStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(
			&self,
			key: &str,
			value: Vec<u8>,
			ttl: Option<Duration>,
		) -> Result<(), StorageError> {
			let record_prefix = format!("{}:", StorageKey::OrderStatusLog.as_str());
			if key.starts_with(&record_prefix) && self.fail_records.load(Ordering::SeqCst) {
				return Err(StorageError::Backend("disk full".into()));
			}
			self.inner.set_bytes(key, value, ttl).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	fn audit_log() -> StorageAuditLog {
		StorageAuditLog::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_append_assigns_monotonic_ids() {
		let log = audit_log();

		let first = log
			.append(StatusAuditRecord::new(1, "ORD1", "pending", "processing").unwrap())
			.await
			.unwrap();
		let second = log
			.append(StatusAuditRecord::new(2, "ORD2", "pending", "holded").unwrap())
			.await
			.unwrap();

		assert_eq!(first.entity_id, Some(1));
		assert_eq!(second.entity_id, Some(2));
		assert!(second.created_at >= first.created_at);
	}

	#[tokio::test]
	async fn test_list_for_order_in_write_order() {
		let log = audit_log();
		for (old, new) in [("pending", "processing"), ("processing", "complete")] {
			log.append(StatusAuditRecord::new(9, "ORD9", old, new).unwrap())
				.await
				.unwrap();
		}
		log.append(StatusAuditRecord::new(10, "ORD10", "pending", "canceled").unwrap())
			.await
			.unwrap();

		let records = log.list_for_order(9).await.unwrap();
		let changes: Vec<_> = records
			.iter()
			.map(|r| (r.old_status.as_str(), r.new_status.as_str()))
			.collect();

		assert_eq!(changes, vec![("pending", "processing"), ("processing", "complete")]);
		assert!(records.iter().all(|r| r.increment_id == "ORD9"));
		assert!(log.list_for_order(404).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_rejects_tampered_record() {
		let log = audit_log();
		let mut record = StatusAuditRecord::new(3, "ORD3", "pending", "processing").unwrap();
		record.order_id = 0;

		assert!(matches!(
			log.append(record).await,
			Err(AuditWriteError::InvalidRecord(AuditRecordError::InvalidOrderId))
		));
	}

	#[tokio::test]
	async fn test_concurrent_appends_keep_unique_ids() {
		let log = Arc::new(audit_log());
		let handles: Vec<_> = (0..10)
			.map(|i| {
				let log = log.clone();
				tokio::spawn(async move {
					log.append(StatusAuditRecord::new(5, "ORD5", "pending", format!("s{}", i)).unwrap())
						.await
						.unwrap()
				})
			})
			.collect();
		for handle in handles {
			handle.await.unwrap();
		}

		let ids: Vec<_> = log
			.list_for_order(5)
			.await
			.unwrap()
			.into_iter()
			.filter_map(|r| r.entity_id)
			.collect();
		assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
	}

	#[tokio::test]
	async fn test_rejects_already_persisted_record() {
		let log = audit_log();
		let record = log
			.append(StatusAuditRecord::new(4, "ORD4", "pending", "processing").unwrap())
			.await
			.unwrap();

		assert!(matches!(
			log.append(record).await,
			Err(AuditWriteError::InvalidRecord(AuditRecordError::AlreadyPersisted))
		));
		assert_eq!(log.list_for_order(4).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_failed_record_write_leaves_listable_log() {
		let fail_records = Arc::new(AtomicBool::new(true));
		let log = StorageAuditLog::new(Arc::new(StorageService::new(Box::new(
			FlakyRecordStorage {
				inner: MemoryStorage::new(),
				fail_records: fail_records.clone(),
			},
		))));

		assert!(matches!(
			log.append(StatusAuditRecord::new(6, "ORD6", "pending", "processing").unwrap())
				.await,
			Err(AuditWriteError::Storage(_))
		));
		assert!(log.list_for_order(6).await.unwrap().is_empty());

		fail_records.store(false, Ordering::SeqCst);
		let record = log
			.append(StatusAuditRecord::new(6, "ORD6", "pending", "processing").unwrap())
			.await
			.unwrap();

		let listed = log.list_for_order(6).await.unwrap();
		assert_eq!(listed, vec![record]);
		assert_eq!(listed[0].entity_id, Some(2));
	}
}
