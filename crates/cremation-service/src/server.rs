//! HTTP server for the cremation tracking API.
//!
//! Routes are nested under `/api`, with an unauthenticated `/health` probe
//! at the root. Every handler returns either JSON or an [`APIError`]
//! rendered as `{ "error", "message" }`.

use axum::{
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
	http::{HeaderName, HeaderValue, Method, StatusCode},
	response::Json,
	routing::get,
	Router,
};
use cremation_config::{ApiConfig, Config, CorsConfig};
use cremation_core::TrackingEngine;
use cremation_types::{
	APIError, ActiveOrderSummary, ActiveOrdersQuery, CreateOrderRequest, CremationSession,
	RecordSessionRequest, ServiceOrder, TimelineResponse, TrackingResponse, UpdateStatusRequest,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Errors raised while setting up the server.
#[derive(Debug, Error)]
pub enum ServerError {
	#[error("Invalid CORS configuration: {0}")]
	Cors(String),
	#[error("Server IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the tracking engine for processing requests.
	pub engine: Arc<TrackingEngine>,
	/// Complete configuration.
	pub config: Config,
}

/// Builds the router with all routes and middleware.
pub fn build_router(state: AppState, api_config: &ApiConfig) -> Result<Router, ServerError> {
	let cors = match &api_config.cors {
		Some(cors) => cors_layer(cors)?,
		None => CorsLayer::permissive(),
	};

	let api = Router::new()
		.route(
			"/service-orders",
			axum::routing::post(handle_create_order),
		)
		.route("/service-orders/active", get(handle_active_orders))
		.route(
			"/service-orders/{id}",
			get(handle_get_order).patch(handle_update_status),
		)
		.route("/service-orders/{id}/timeline", get(handle_get_timeline))
		.route(
			"/service-orders/{id}/cremation-session",
			get(handle_get_cremation_session).put(handle_record_cremation_session),
		)
		.route("/tracking/{folio}", get(handle_tracking));

	Ok(Router::new()
		.route("/health", get(handle_health))
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors)
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state))
}

fn cors_layer(cors: &CorsConfig) -> Result<CorsLayer, ServerError> {
	let origins = cors
		.allowed_origins
		.iter()
		.map(|o| {
			o.parse::<HeaderValue>()
				.map_err(|e| ServerError::Cors(format!("origin '{}': {}", o, e)))
		})
		.collect::<Result<Vec<_>, _>>()?;
	let methods = cors
		.allowed_methods
		.iter()
		.map(|m| {
			m.parse::<Method>()
				.map_err(|e| ServerError::Cors(format!("method '{}': {}", m, e)))
		})
		.collect::<Result<Vec<_>, _>>()?;
	let headers = cors
		.allowed_headers
		.iter()
		.map(|h| {
			h.parse::<HeaderName>()
				.map_err(|e| ServerError::Cors(format!("header '{}': {}", h, e)))
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers))
}

/// Starts the HTTP server for the API.
///
/// Runs until Ctrl+C, then stops accepting connections and lets in-flight
/// requests finish.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<TrackingEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let config = engine.config().clone();
	let app_state = AppState { engine, config };
	let app = build_router(app_state, &api_config)?;

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Cremation tracking API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::warn!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await?;

	Ok(())
}

/// Turns a body extraction failure into the API's error shape.
fn invalid_body(rejection: JsonRejection) -> APIError {
	APIError::BadRequest {
		error_type: "INVALID_REQUEST".to_string(),
		message: rejection.body_text(),
		details: None,
	}
}

/// Handles GET /health requests.
async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"service": state.config.service.id,
	}))
}

/// Handles POST /api/service-orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceOrder>), APIError> {
	let Json(request) = payload.map_err(invalid_body)?;
	match crate::apis::order::create_order(request, &state.engine).await {
		Ok(order) => Ok((StatusCode::CREATED, Json(order))),
		Err(e) => {
			tracing::warn!("Order registration failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/service-orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<ServiceOrder>, APIError> {
	match crate::apis::order::get_order_by_id(&id, &state.engine).await {
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::warn!("Order retrieval failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles PATCH /api/service-orders/{id} requests.
async fn handle_update_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ServiceOrder>, APIError> {
	let Json(request) = payload.map_err(invalid_body)?;
	match crate::apis::order::update_order_status(&id, request, &state.engine).await {
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::warn!("Status change failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/service-orders/active requests.
async fn handle_active_orders(
	State(state): State<AppState>,
	Query(query): Query<ActiveOrdersQuery>,
) -> Result<Json<Vec<ActiveOrderSummary>>, APIError> {
	match crate::apis::order::list_active_orders(query, &state.engine).await {
		Ok(orders) => Ok(Json(orders)),
		Err(e) => {
			tracing::warn!("Active orders listing failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/service-orders/{id}/timeline requests.
async fn handle_get_timeline(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<TimelineResponse>, APIError> {
	match crate::apis::order::get_order_timeline(&id, &state.engine).await {
		Ok(timeline) => Ok(Json(timeline)),
		Err(e) => {
			tracing::warn!("Timeline retrieval failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/service-orders/{id}/cremation-session requests.
async fn handle_get_cremation_session(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<CremationSession>, APIError> {
	match crate::apis::order::get_cremation_session(&id, &state.engine).await {
		Ok(session) => Ok(Json(session)),
		Err(e) => {
			tracing::warn!("Cremation session retrieval failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles PUT /api/service-orders/{id}/cremation-session requests.
async fn handle_record_cremation_session(
	Path(id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<RecordSessionRequest>, JsonRejection>,
) -> Result<Json<CremationSession>, APIError> {
	let Json(request) = payload.map_err(invalid_body)?;
	match crate::apis::order::record_cremation_session(&id, request, &state.engine).await {
		Ok(session) => Ok(Json(session)),
		Err(e) => {
			tracing::warn!("Cremation session recording failed: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles GET /api/tracking/{folio} requests.
async fn handle_tracking(
	Path(folio): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<TrackingResponse>, APIError> {
	match crate::apis::tracking::get_tracking(&folio, &state.engine).await {
		Ok(view) => Ok(Json(view)),
		Err(e) => {
			tracing::warn!("Tracking lookup failed: {}", e);
			Err(APIError::from(e))
		},
	}
}
