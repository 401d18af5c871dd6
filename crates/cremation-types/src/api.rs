//! API types for the cremation tracking HTTP API.
//!
//! This module defines the request and response schemas for the service order
//! endpoints and the structured error type every handler returns.

use crate::{
	CremationSession, OrderStatus, OwnerRef, PetRef, PhaseStep, ServiceOrder, ServiceType,
	StatusPhase, TimelineStep,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for registering a new service order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	/// Folio to assign. Generated when absent.
	#[serde(default)]
	pub folio: Option<String>,
	pub service_type: ServiceType,
	pub pet: PetRef,
	pub owner: OwnerRef,
	#[serde(rename = "sucursalId", default)]
	pub branch_id: Option<String>,
}

/// Request body for `PATCH /api/service-orders/{id}`.
///
/// The status is kept as a raw string so unknown names surface as a
/// structured error instead of a body rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
	pub status: String,
}

/// Request body for attaching a cremation session to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSessionRequest {
	pub operator: String,
	/// Defaults to the time the request is processed.
	#[serde(default)]
	pub started_at: Option<u64>,
	#[serde(default)]
	pub finished_at: Option<u64>,
	#[serde(default)]
	pub certificate_number: Option<String>,
	#[serde(default)]
	pub notes: Option<String>,
}

/// Query parameters accepted by the active orders listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveOrdersQuery {
	/// Search-as-you-type filter over folio, pet name and owner name.
	#[serde(default)]
	pub q: Option<String>,
	/// Restrict the listing to a single branch.
	#[serde(default)]
	pub sucursal: Option<String>,
}

/// Name-only projection of a pet or owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
	pub name: String,
}

/// Entry of the active orders listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOrderSummary {
	pub id: String,
	pub folio: String,
	pub status: OrderStatus,
	pub pet: NamedRef,
	pub owner: NamedRef,
	#[serde(rename = "sucursalId", skip_serializing_if = "Option::is_none")]
	pub branch_id: Option<String>,
	pub updated_at: u64,
}

impl From<&ServiceOrder> for ActiveOrderSummary {
	fn from(order: &ServiceOrder) -> Self {
		Self {
			id: order.id.clone(),
			folio: order.folio.clone(),
			status: order.status,
			pet: NamedRef {
				name: order.pet.name.clone(),
			},
			owner: NamedRef {
				name: order.owner.name.clone(),
			},
			branch_id: order.branch_id.clone(),
			updated_at: order.updated_at,
		}
	}
}

/// Response of the public tracking lookup by folio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResponse {
	pub folio: String,
	pub status: OrderStatus,
	pub status_label: String,
	pub phase: StatusPhase,
	pub service_type: ServiceType,
	pub pet: NamedRef,
	/// Cremation session details, once one has been recorded.
	#[serde(rename = "sesionCremacion")]
	pub cremation_session: Option<CremationSession>,
	pub timeline: Vec<TimelineStep>,
	pub created_at: u64,
	pub updated_at: u64,
}

/// Timeline projection of a single order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
	pub order_id: String,
	pub folio: String,
	pub status: OrderStatus,
	pub steps: Vec<TimelineStep>,
	pub phases: Vec<PhaseStep>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Requested resource does not exist (404)
	NotFound { error_type: String, message: String },
	/// Request conflicts with the current state of the resource (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
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
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
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

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::response::IntoResponse;

	#[test]
	fn test_status_codes() {
		let err = APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".into(),
			message: "missing".into(),
		};
		assert_eq!(err.status_code(), 404);

		let err = APIError::Conflict {
			error_type: "INVALID_TRANSITION".into(),
			message: "nope".into(),
			details: None,
		};
		assert_eq!(err.status_code(), 409);
		assert_eq!(err.into_response().status().as_u16(), 409);
	}

	#[test]
	fn test_error_response_omits_empty_details() {
		let err = APIError::BadRequest {
			error_type: "UNKNOWN_STATUS".into(),
			message: "Unknown status: FOO".into(),
			details: None,
		};
		let value = serde_json::to_value(err.to_error_response()).unwrap();
		assert_eq!(value["error"], "UNKNOWN_STATUS");
		assert_eq!(value["message"], "Unknown status: FOO");
		assert!(value.get("details").is_none());
	}

	#[test]
	fn test_create_request_defaults() {
		let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
			"serviceType": "IMMEDIATE",
			"pet": { "id": "p1", "name": "Luna" },
			"owner": { "id": "o1", "name": "Carlos" }
		}))
		.unwrap();
		assert!(request.folio.is_none());
		assert!(request.branch_id.is_none());
		assert_eq!(request.service_type, ServiceType::Immediate);
	}
}
