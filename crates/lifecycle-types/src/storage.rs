//! Storage-related types for the lifecycle service.

use std::str::FromStr;

/// Storage namespaces for the different data collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Orders keyed by increment id
	Orders,
	/// Status audit records keyed by entity id
	OrderStatusLog,
	/// Audit entity ids per order id
	OrderStatusLogByOrder,
	/// Monotonic id counters
	Sequences,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderStatusLog => crate::ORDER_STATUS_LOG_TABLE,
			StorageKey::OrderStatusLogByOrder => "vendor_order_status_log_by_order",
			StorageKey::Sequences => "sequences",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrderStatusLog,
			Self::OrderStatusLogByOrder,
			Self::Sequences,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
