//! Lifecycle management for the tracking engine.

use super::{EngineError, TrackingEngine};

impl TrackingEngine {
	/// Performs any initialization required before running.
	///
	/// Reads the stored orders once so a broken storage backend is reported
	/// at startup rather than on the first request.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let orders = self
			.state_machine
			.list_orders()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;
		let active = orders.iter().filter(|o| !o.status.is_terminal()).count();

		tracing::info!(
			service_id = %self.config.service.id,
			orders = orders.len(),
			active,
			"Initialized tracking engine"
		);
		Ok(())
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(service_id = %self.config.service.id, "Shutting down tracking engine");
		Ok(())
	}
}
