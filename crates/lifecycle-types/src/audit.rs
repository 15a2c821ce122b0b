//! Status audit record types.
//!
//! Field names follow the `vendor_order_status_log` table layout so persisted
//! records stay compatible with existing data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the audit table / storage namespace.
pub const ORDER_STATUS_LOG_TABLE: &str = "vendor_order_status_log";

/// Errors raised when an audit record fails boundary validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditRecordError {
	#[error("Audit record requires a positive order id")]
	InvalidOrderId,
	#[error("Audit record requires a non-empty increment id")]
	EmptyIncrementId,
	#[error("Audit record has already been persisted")]
	AlreadyPersisted,
}

/// One observed order status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAuditRecord {
	/// Store-assigned, monotonic. `None` until persisted.
	pub entity_id: Option<u64>,
	pub order_id: u64,
	pub increment_id: String,
	pub old_status: String,
	pub new_status: String,
	/// Set by the audit store at write time.
	pub created_at: DateTime<Utc>,
}

impl StatusAuditRecord {
	/// Builds an unpersisted record, rejecting a zero order id or an empty
	/// reference.
	pub fn new(
		order_id: u64,
		increment_id: impl Into<String>,
		old_status: impl Into<String>,
		new_status: impl Into<String>,
	) -> Result<Self, AuditRecordError> {
		let increment_id = increment_id.into();
		if order_id == 0 {
			return Err(AuditRecordError::InvalidOrderId);
		}
		if increment_id.trim().is_empty() {
			return Err(AuditRecordError::EmptyIncrementId);
		}

		Ok(Self {
			entity_id: None,
			order_id,
			increment_id,
			old_status: old_status.into(),
			new_status: new_status.into(),
			created_at: Utc::now(),
		})
	}

	/// Whether the record has been written by an audit store.
	pub fn is_persisted(&self) -> bool {
		self.entity_id.is_some()
	}

	/// Returns the persisted form of this record.
	pub fn persisted(mut self, entity_id: u64, created_at: DateTime<Utc>) -> Self {
		self.entity_id = Some(entity_id);
		self.created_at = created_at;
		self
	}
}
