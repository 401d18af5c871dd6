//! Public tracking lookup by folio.

use cremation_core::{OrderStateError, TrackingEngine};
use cremation_types::TrackingResponse;

/// Handles GET /api/tracking/{folio}.
pub async fn get_tracking(
	folio: &str,
	engine: &TrackingEngine,
) -> Result<TrackingResponse, OrderStateError> {
	tracing::debug!(folio = %folio, "Tracking lookup");
	engine.tracking(folio).await
}
