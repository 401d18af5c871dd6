//! Service order types for the tracking system.
//!
//! This module defines the service order record, the canonical status
//! progression every order walks through, the coarse phase grouping used by
//! the simplified client view, and the timeline step types produced when a
//! status is projected for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a status name is outside the fixed enumeration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Status of a service order.
///
/// Variants are declared in progression order. An order only ever moves to
/// the variant immediately after its current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Waiting for a driver to collect the pet.
	PendingPickup,
	/// Being transported to the crematory.
	InTransit,
	/// Received at the crematory, waiting for a session.
	AtCrematory,
	/// Cremation session in progress.
	Cremating,
	/// Remains are ready to be handed back.
	ReadyForDelivery,
	/// Remains were handed to the owner.
	Delivered,
	/// Paperwork closed. Terminal.
	Completed,
}

impl OrderStatus {
	/// Every status in progression order.
	pub const ALL: [OrderStatus; 7] = [
		OrderStatus::PendingPickup,
		OrderStatus::InTransit,
		OrderStatus::AtCrematory,
		OrderStatus::Cremating,
		OrderStatus::ReadyForDelivery,
		OrderStatus::Delivered,
		OrderStatus::Completed,
	];

	/// Zero-based position of this status in the progression.
	pub fn index(&self) -> usize {
		match self {
			OrderStatus::PendingPickup => 0,
			OrderStatus::InTransit => 1,
			OrderStatus::AtCrematory => 2,
			OrderStatus::Cremating => 3,
			OrderStatus::ReadyForDelivery => 4,
			OrderStatus::Delivered => 5,
			OrderStatus::Completed => 6,
		}
	}

	/// The status immediately after this one, if any.
	pub fn next(&self) -> Option<OrderStatus> {
		Self::ALL.get(self.index() + 1).copied()
	}

	/// Returns true if no further transition is possible.
	pub fn is_terminal(&self) -> bool {
		self.next().is_none()
	}

	/// Wire name as used in JSON payloads.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::PendingPickup => "PENDING_PICKUP",
			OrderStatus::InTransit => "IN_TRANSIT",
			OrderStatus::AtCrematory => "AT_CREMATORY",
			OrderStatus::Cremating => "CREMATING",
			OrderStatus::ReadyForDelivery => "READY_FOR_DELIVERY",
			OrderStatus::Delivered => "DELIVERED",
			OrderStatus::Completed => "COMPLETED",
		}
	}

	/// Display label shown to staff and in public tracking.
	pub fn label(&self) -> &'static str {
		match self {
			OrderStatus::PendingPickup => "Pendiente de recolección",
			OrderStatus::InTransit => "En tránsito",
			OrderStatus::AtCrematory => "En crematorio",
			OrderStatus::Cremating => "En cremación",
			OrderStatus::ReadyForDelivery => "Listo para entrega",
			OrderStatus::Delivered => "Entregado",
			OrderStatus::Completed => "Completado",
		}
	}

	/// Coarse phase this status belongs to.
	pub fn phase(&self) -> StatusPhase {
		match self {
			OrderStatus::PendingPickup => StatusPhase::Pending,
			OrderStatus::Completed => StatusPhase::Completed,
			_ => StatusPhase::Process,
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == trimmed)
			.ok_or_else(|| UnknownStatus(s.to_string()))
	}
}

/// Coarse grouping of [`OrderStatus`] for the simplified client timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusPhase {
	Pending,
	Process,
	Completed,
}

impl StatusPhase {
	/// Every phase in progression order.
	pub const ALL: [StatusPhase; 3] = [
		StatusPhase::Pending,
		StatusPhase::Process,
		StatusPhase::Completed,
	];

	pub fn index(&self) -> usize {
		match self {
			StatusPhase::Pending => 0,
			StatusPhase::Process => 1,
			StatusPhase::Completed => 2,
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			StatusPhase::Pending => "Pendiente",
			StatusPhase::Process => "En proceso",
			StatusPhase::Completed => "Completado",
		}
	}
}

/// Kind of service contracted for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
	/// On-demand service.
	Immediate,
	/// Service redeemed from a pre-paid previsión contract.
	Prevision,
}

/// Reference to a pet owned by the records subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetRef {
	pub id: String,
	pub name: String,
}

/// Reference to a client owned by the records subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
	pub id: String,
	pub name: String,
}

/// A service order tracked through the cremation workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
	/// Unique identifier for this order.
	pub id: String,
	/// Human-readable tracking code. Immutable once assigned.
	pub folio: String,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Immediate or previsión service.
	pub service_type: ServiceType,
	/// Pet this order is for.
	pub pet: PetRef,
	/// Client who owns the pet.
	pub owner: OwnerRef,
	/// Branch (sucursal) the order is scoped to.
	#[serde(rename = "sucursalId", default, skip_serializing_if = "Option::is_none")]
	pub branch_id: Option<String>,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
}

/// Cremation session attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CremationSession {
	pub order_id: String,
	/// Crematory operator in charge of the session.
	pub operator: String,
	pub started_at: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub finished_at: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub certificate_number: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Display state of a single timeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
	Completed,
	Current,
	Upcoming,
}

impl StepState {
	/// Classifies a step at `step` relative to the current position.
	pub fn classify(step: usize, current: usize) -> Self {
		match step.cmp(&current) {
			std::cmp::Ordering::Less => StepState::Completed,
			std::cmp::Ordering::Equal => StepState::Current,
			std::cmp::Ordering::Greater => StepState::Upcoming,
		}
	}
}

/// One step of the detailed status timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStep {
	pub index: usize,
	pub status: OrderStatus,
	pub label: String,
	pub state: StepState,
}

/// One step of the coarse phase timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStep {
	pub index: usize,
	pub phase: StatusPhase,
	pub label: String,
	pub state: StepState,
}
