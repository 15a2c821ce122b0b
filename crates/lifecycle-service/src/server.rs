//! HTTP server for the order lifecycle API.

use axum::{
	routing::{get, post, put},
	Router,
};
use lifecycle_config::ApiConfig;
use lifecycle_core::LifecycleEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<LifecycleEngine>,
}

/// Routes under `/api`, with CORS and request tracing.
pub fn router(engine: Arc<LifecycleEngine>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(crate::apis::order::create_order))
				.route("/orders/{increment_id}", get(crate::apis::order::get_order))
				.route(
					"/orders/{increment_id}/status",
					put(crate::apis::order::update_order_status),
				)
				.route(
					"/orders/{increment_id}/status-log",
					get(crate::apis::order::get_status_log),
				),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { engine })
}

pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<LifecycleEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order lifecycle API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
