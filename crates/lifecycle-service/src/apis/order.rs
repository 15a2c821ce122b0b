//! Order endpoints.
//!
//! Status updates go through the engine's status service, so the HTTP layer
//! never touches state or status directly. Every rejected update, whatever
//! the cause, is reported as `ORDER_STATUS_UPDATE_FAILED` with the localized
//! message in the body.

use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use lifecycle_core::{
	classifier::classify, LocalizedOperationError, OrderRepository, RepositoryError,
	StatusUpdateError,
};
use lifecycle_types::{
	APIError, CreateOrderRequest, Order, OrderResponse, StatusLogResponse,
	UpdateOrderStatusRequest, UpdateOrderStatusResponse, ORDER_NOT_FOUND,
};
use tracing::{info, warn};

/// Status given to created orders that do not name one.
const DEFAULT_ORDER_STATUS: &str = "pending";

fn internal_error(message: impl Into<String>) -> APIError {
	APIError::InternalServerError {
		error_type: "INTERNAL_ERROR".to_string(),
		message: message.into(),
	}
}

fn not_found(increment_id: &str) -> APIError {
	APIError::NotFound {
		error_type: ORDER_NOT_FOUND.to_string(),
		message: format!("Order with increment ID \"{}\" does not exist.", increment_id),
	}
}

async fn find_order(state: &AppState, increment_id: &str) -> Result<Order, APIError> {
	state
		.engine
		.orders()
		.find_by_reference(increment_id)
		.await
		.map_err(|e| internal_error(e.to_string()))?
		.ok_or_else(|| not_found(increment_id))
}

/// Handles PUT /api/orders/{increment_id}/status.
pub async fn update_order_status(
	Path(increment_id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<UpdateOrderStatusResponse>, APIError> {
	if request.status.trim().is_empty() {
		let error = LocalizedOperationError::from(StatusUpdateError::EmptyStatus);
		return Err(APIError::status_update_failed(error.to_string()));
	}

	match state
		.engine
		.status_service()
		.update_order_status(&increment_id, &request.status, request.comment.as_deref())
		.await
	{
		Ok(success) => Ok(Json(UpdateOrderStatusResponse { success })),
		Err(e) => {
			warn!("Status update failed: {}", e);
			Err(APIError::status_update_failed(e.to_string()))
		},
	}
}

/// Handles GET /api/orders/{increment_id}.
pub async fn get_order(
	Path(increment_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, APIError> {
	let order = find_order(&state, &increment_id).await?;
	Ok(Json(order.into()))
}

/// Handles GET /api/orders/{increment_id}/status-log.
pub async fn get_status_log(
	Path(increment_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<StatusLogResponse>, APIError> {
	let order = find_order(&state, &increment_id).await?;

	let entries = state
		.engine
		.audit_log()
		.list_for_order(order.entity_id)
		.await
		.map_err(|e| internal_error(e.to_string()))?;

	Ok(Json(StatusLogResponse {
		increment_id: order.increment_id,
		entries,
	}))
}

/// Handles POST /api/orders.
///
/// Registers an order in the store; the initial status is classified the
/// same way updates are.
pub async fn create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), APIError> {
	if request.increment_id.trim().is_empty() {
		return Err(APIError::BadRequest {
			error_type: "INVALID_ORDER_REQUEST".to_string(),
			message: "incrementId cannot be empty".to_string(),
		});
	}

	let status = request
		.status
		.filter(|status| !status.trim().is_empty())
		.unwrap_or_else(|| DEFAULT_ORDER_STATUS.to_string());
	let mut order = Order::new(0, request.increment_id, classify(&status), status, request.store_id);
	if let Some(customer) = request.customer {
		order = order.with_customer(customer.email, customer.firstname, customer.lastname);
	}

	match state.engine.orders().create(order).await {
		Ok(order) => {
			info!(increment_id = %order.increment_id, entity_id = order.entity_id, "Order created");
			Ok((StatusCode::CREATED, Json(order.into())))
		},
		Err(RepositoryError::AlreadyExists(increment_id)) => Err(APIError::Conflict {
			error_type: "ORDER_ALREADY_EXISTS".to_string(),
			message: format!("Order with increment ID \"{}\" already exists.", increment_id),
		}),
		Err(e) => Err(internal_error(e.to_string())),
	}
}
