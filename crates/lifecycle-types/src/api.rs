//! Request and response types for the order lifecycle HTTP API.

use crate::{Order, OrderHistoryEntry, StatusAuditRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code returned when a status update is rejected for any reason.
pub const ORDER_STATUS_UPDATE_FAILED: &str = "ORDER_STATUS_UPDATE_FAILED";
/// Error code returned when a referenced order does not exist.
pub const ORDER_NOT_FOUND: &str = "ORDER_NOT_FOUND";

/// Body of `PUT /api/orders/{increment_id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
	/// Requested raw status code
	pub status: String,
	/// Optional history comment
	#[serde(default)]
	pub comment: Option<String>,
}

/// Successful status update acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusResponse {
	pub success: bool,
}

/// Customer block of an order creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRequest {
	pub email: String,
	#[serde(default)]
	pub firstname: String,
	#[serde(default)]
	pub lastname: String,
}

/// Body of `POST /api/orders`, used to seed orders into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	#[serde(rename = "incrementId")]
	pub increment_id: String,
	/// Initial raw status, `pending` when omitted
	#[serde(default)]
	pub status: Option<String>,
	#[serde(rename = "storeId", default = "default_store_id")]
	pub store_id: u32,
	#[serde(default)]
	pub customer: Option<CustomerRequest>,
}

fn default_store_id() -> u32 {
	1
}

/// Public view of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
	#[serde(rename = "entityId")]
	pub entity_id: u64,
	#[serde(rename = "incrementId")]
	pub increment_id: String,
	pub state: String,
	pub status: String,
	#[serde(rename = "storeId")]
	pub store_id: u32,
	#[serde(rename = "customerEmail", skip_serializing_if = "Option::is_none")]
	pub customer_email: Option<String>,
	#[serde(rename = "statusHistory")]
	pub status_history: Vec<OrderHistoryEntry>,
	#[serde(rename = "createdAt")]
	pub created_at: DateTime<Utc>,
	#[serde(rename = "updatedAt")]
	pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
	fn from(order: Order) -> Self {
		Self {
			entity_id: order.entity_id,
			increment_id: order.increment_id,
			state: order.state.as_str().to_string(),
			status: order.status,
			store_id: order.store_id,
			customer_email: order.customer_email,
			status_history: order.status_history,
			created_at: order.created_at,
			updated_at: order.updated_at,
		}
	}
}

/// Audit trail for one order, oldest entry first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusLogResponse {
	#[serde(rename = "incrementId")]
	pub increment_id: String,
	pub entries: Vec<StatusAuditRecord>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Rejected request (400)
	BadRequest { error_type: String, message: String },
	/// Unknown resource (404)
	NotFound { error_type: String, message: String },
	/// Resource already exists (409)
	Conflict { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Rejected status update carrying the localized failure message.
	pub fn status_update_failed(message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: ORDER_STATUS_UPDATE_FAILED.to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::Conflict { error_type, message }
			| APIError::InternalServerError { error_type, message } => (error_type, message),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
