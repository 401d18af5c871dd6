//! Service order endpoints.
//!
//! Intake, status transitions, the active orders listing, timeline views
//! and cremation session recording. Each function maps one route onto the
//! tracking engine and leaves HTTP concerns to the server module.

use cremation_core::{OrderStateError, TrackingEngine};
use cremation_types::{
	truncate_id, ActiveOrderSummary, ActiveOrdersQuery, CreateOrderRequest, CremationSession,
	RecordSessionRequest, ServiceOrder, TimelineResponse, UpdateStatusRequest,
};
use tracing::{debug, info};

/// Handles POST /api/service-orders.
pub async fn create_order(
	request: CreateOrderRequest,
	engine: &TrackingEngine,
) -> Result<ServiceOrder, OrderStateError> {
	debug!(pet = %request.pet.name, owner = %request.owner.name, "Registering service order");
	engine.create_order(request).await
}

/// Handles GET /api/service-orders/{id}.
pub async fn get_order_by_id(
	id: &str,
	engine: &TrackingEngine,
) -> Result<ServiceOrder, OrderStateError> {
	engine.get_order(id).await
}

/// Handles PATCH /api/service-orders/{id}.
///
/// Returns the updated order so clients can refresh without a second read.
pub async fn update_order_status(
	id: &str,
	request: UpdateStatusRequest,
	engine: &TrackingEngine,
) -> Result<ServiceOrder, OrderStateError> {
	info!(
		order_id = %truncate_id(id),
		requested = %request.status,
		"Status change requested"
	);
	engine.advance(id, &request.status).await
}

/// Handles GET /api/service-orders/active.
pub async fn list_active_orders(
	query: ActiveOrdersQuery,
	engine: &TrackingEngine,
) -> Result<Vec<ActiveOrderSummary>, OrderStateError> {
	let orders = engine.active_orders(&query).await?;
	Ok(orders.iter().map(ActiveOrderSummary::from).collect())
}

/// Handles GET /api/service-orders/{id}/timeline.
pub async fn get_order_timeline(
	id: &str,
	engine: &TrackingEngine,
) -> Result<TimelineResponse, OrderStateError> {
	engine.timeline(id).await
}

/// Handles PUT /api/service-orders/{id}/cremation-session.
pub async fn record_cremation_session(
	id: &str,
	request: RecordSessionRequest,
	engine: &TrackingEngine,
) -> Result<CremationSession, OrderStateError> {
	engine.record_cremation_session(id, request).await
}

/// Handles GET /api/service-orders/{id}/cremation-session.
///
/// An existing order without a recorded session yields `SessionNotFound`,
/// distinct from a missing order.
pub async fn get_cremation_session(
	id: &str,
	engine: &TrackingEngine,
) -> Result<CremationSession, OrderStateError> {
	let order = engine.get_order(id).await?;
	engine
		.cremation_session(&order.id)
		.await?
		.ok_or(OrderStateError::SessionNotFound(order.id))
}
