//! Event types broadcast by the tracking engine.
//!
//! Events are published on the engine's event bus after a change has been
//! persisted, so subscribers never observe a change that was rolled back.

use crate::{OrderStatus, ServiceOrder};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all tracking events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrackingEvent {
	/// Events about the service order lifecycle.
	Order(OrderEvent),
}

/// Events related to service orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order has been registered.
	Created { order: ServiceOrder },
	/// An order moved one step forward.
	StatusAdvanced {
		order_id: String,
		folio: String,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// A cremation session was attached to an order.
	CremationSessionRecorded { order_id: String },
}
