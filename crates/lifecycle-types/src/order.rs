//! Order types for the lifecycle service.
//!
//! The order itself is owned by the commerce platform; this module only
//! models the fields the status pipeline reads and the mutations it requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse lifecycle classification of an order.
///
/// Every raw status code maps to exactly one state. The string codes match the
/// platform's state identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
	New,
	Processing,
	Complete,
	Closed,
	Holded,
	Canceled,
}

impl LifecycleState {
	/// Returns the canonical state code.
	pub fn as_str(&self) -> &'static str {
		match self {
			LifecycleState::New => "new",
			LifecycleState::Processing => "processing",
			LifecycleState::Complete => "complete",
			LifecycleState::Closed => "closed",
			LifecycleState::Holded => "holded",
			LifecycleState::Canceled => "canceled",
		}
	}

	/// Parses an exact state code. Status codes that are not also state
	/// names (e.g. `pending`) return `None`.
	pub fn from_code(code: &str) -> Option<Self> {
		Self::all().find(|state| state.as_str() == code)
	}

	/// Returns an iterator over all states.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::New,
			Self::Processing,
			Self::Complete,
			Self::Closed,
			Self::Holded,
			Self::Canceled,
		]
		.into_iter()
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One entry of an order's own status history trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistoryEntry {
	/// Free-text comment, empty when the change was recorded without one.
	pub comment: String,
	/// Status code the order had when the entry was written.
	pub status: String,
	/// Whether the customer was told about this entry.
	pub is_customer_notified: bool,
	pub created_at: DateTime<Utc>,
}

/// Snapshot of an order as held by the order store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Internal numeric identifier assigned by the store.
	pub entity_id: u64,
	/// Human-readable order reference, unique per store.
	pub increment_id: String,
	/// Coarse lifecycle state.
	pub state: LifecycleState,
	/// Raw status code (e.g. `pending_payment`).
	pub status: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_firstname: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_lastname: Option<String>,
	/// Store view the order was placed in.
	pub store_id: u32,
	/// Append-only status history.
	#[serde(default)]
	pub status_history: Vec<OrderHistoryEntry>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Creates a new order with an empty history.
	pub fn new(
		entity_id: u64,
		increment_id: impl Into<String>,
		state: LifecycleState,
		status: impl Into<String>,
		store_id: u32,
	) -> Self {
		let now = Utc::now();
		Self {
			entity_id,
			increment_id: increment_id.into(),
			state,
			status: status.into(),
			customer_email: None,
			customer_firstname: None,
			customer_lastname: None,
			store_id,
			status_history: Vec::new(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Attaches customer contact details.
	pub fn with_customer(
		mut self,
		email: impl Into<String>,
		firstname: impl Into<String>,
		lastname: impl Into<String>,
	) -> Self {
		self.customer_email = Some(email.into());
		self.customer_firstname = Some(firstname.into());
		self.customer_lastname = Some(lastname.into());
		self
	}

	/// Sets state and status together. The two fields are independent in
	/// storage and must only ever change as a pair.
	pub fn apply_status(&mut self, state: LifecycleState, status: impl Into<String>) {
		self.state = state;
		self.status = status.into();
	}

	/// Appends an entry to the order's status history.
	pub fn add_status_history_comment(
		&mut self,
		comment: impl Into<String>,
		status: impl Into<String>,
		is_customer_notified: bool,
	) -> &OrderHistoryEntry {
		self.status_history.push(OrderHistoryEntry {
			comment: comment.into(),
			status: status.into(),
			is_customer_notified,
			created_at: Utc::now(),
		});
		&self.status_history[self.status_history.len() - 1]
	}

	/// Customer display name, first and last name joined by a space.
	pub fn customer_name(&self) -> String {
		let first = self.customer_firstname.as_deref().unwrap_or_default();
		let last = self.customer_lastname.as_deref().unwrap_or_default();
		format!("{} {}", first, last).trim().to_string()
	}

	/// Whether the order carries an address a notification can be sent to.
	pub fn has_customer_contact(&self) -> bool {
		self.customer_email
			.as_deref()
			.is_some_and(|email| !email.trim().is_empty())
	}
}
