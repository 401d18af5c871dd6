//! Order state machine implementation.
//!
//! Manages service order persistence and status transitions. Orders move
//! strictly forward through the progression, one step at a time:
//! PendingPickup -> InTransit -> AtCrematory -> Cremating -> ReadyForDelivery
//! -> Delivered -> Completed. Completed is terminal.

use cremation_storage::{StorageError, StorageService};
use cremation_types::{
	current_timestamp, APIError, OrderStatus, ServiceOrder, StorageKey, UnknownStatus,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order state management.
///
/// These errors represent failures in storage operations, rejected
/// transitions, missing orders and invalid input.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error(transparent)]
	UnknownStatus(#[from] UnknownStatus),
	#[error("Folio already in use: {0}")]
	FolioConflict(String),
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Cremation session not allowed while order is {0}")]
	SessionNotAllowed(OrderStatus),
	#[error("No cremation session recorded for order {0}")]
	SessionNotFound(String),
}

impl From<OrderStateError> for APIError {
	fn from(err: OrderStateError) -> Self {
		let message = err.to_string();
		match err {
			OrderStateError::OrderNotFound(_) => APIError::NotFound {
				error_type: "ORDER_NOT_FOUND".to_string(),
				message,
			},
			OrderStateError::SessionNotFound(_) => APIError::NotFound {
				error_type: "SESSION_NOT_FOUND".to_string(),
				message,
			},
			OrderStateError::UnknownStatus(UnknownStatus(status)) => APIError::BadRequest {
				error_type: "UNKNOWN_STATUS".to_string(),
				message,
				details: Some(serde_json::json!({
					"status": status,
					"allowed": OrderStatus::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
				})),
			},
			OrderStateError::Validation(_) => APIError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message,
				details: None,
			},
			OrderStateError::InvalidTransition { from, to } => APIError::Conflict {
				error_type: "INVALID_TRANSITION".to_string(),
				message,
				details: Some(serde_json::json!({
					"from": from,
					"to": to,
					"expected": from.next(),
				})),
			},
			OrderStateError::FolioConflict(_) => APIError::Conflict {
				error_type: "FOLIO_CONFLICT".to_string(),
				message,
				details: None,
			},
			OrderStateError::SessionNotAllowed(status) => APIError::Conflict {
				error_type: "SESSION_NOT_ALLOWED".to_string(),
				message,
				details: Some(serde_json::json!({ "status": status })),
			},
			OrderStateError::Storage(_) => APIError::InternalServerError {
				error_type: "PERSISTENCE_ERROR".to_string(),
				message,
			},
		}
	}
}

/// Maps a storage error for the order `order_id`, turning a miss into
/// `OrderNotFound`.
fn not_found_or_storage(order_id: &str) -> impl FnOnce(StorageError) -> OrderStateError + '_ {
	move |e| match e {
		StorageError::NotFound => OrderStateError::OrderNotFound(order_id.to_string()),
		other => OrderStateError::Storage(other.to_string()),
	}
}

/// Index key for a folio. Folio lookups are case-insensitive.
pub(crate) fn folio_key(folio: &str) -> String {
	folio.trim().to_uppercase()
}

/// Manages order state transitions and persistence
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Updates an order with a closure and persists it
	pub async fn update_order_with<F>(
		&self,
		order_id: &str,
		updater: F,
	) -> Result<ServiceOrder, OrderStateError>
	where
		F: FnOnce(&mut ServiceOrder),
	{
		let mut order = self.get_order(order_id).await?;

		updater(&mut order);

		// Automatically set updated_at timestamp
		order.updated_at = current_timestamp();

		self.storage
			.update(StorageKey::Orders.as_str(), order_id, &order)
			.await
			.map_err(not_found_or_storage(order_id))?;

		Ok(order)
	}

	/// Moves an order to `requested`, which must be the status immediately
	/// after the current one.
	///
	/// Returns the previous status together with the updated order.
	pub async fn advance(
		&self,
		order_id: &str,
		requested: OrderStatus,
	) -> Result<(OrderStatus, ServiceOrder), OrderStateError> {
		let order = self.get_order(order_id).await?;
		let from = order.status;

		if !Self::is_valid_transition(from, requested) {
			return Err(OrderStateError::InvalidTransition {
				from,
				to: requested,
			});
		}

		let updated = self
			.update_order_with(order_id, |o| {
				o.status = requested;
			})
			.await?;

		Ok((from, updated))
	}

	/// Checks if a state transition is valid.
	///
	/// Only the immediate successor is reachable. Same-status, backwards and
	/// skipping transitions are all rejected.
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		to.index() == from.index() + 1
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: &str) -> Result<ServiceOrder, OrderStateError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(not_found_or_storage(order_id))
	}

	/// Stores a new order and its folio index entry.
	///
	/// The index entry is written first and rolled back if the order itself
	/// cannot be stored, so a stored order is always reachable by folio.
	/// Fails with `FolioConflict` if the folio is already indexed.
	pub async fn store_order(&self, order: &ServiceOrder) -> Result<(), OrderStateError> {
		let key = folio_key(&order.folio);
		let taken = self
			.storage
			.exists(StorageKey::OrderByFolio.as_str(), &key)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;
		if taken {
			return Err(OrderStateError::FolioConflict(order.folio.clone()));
		}

		self.storage
			.store(StorageKey::OrderByFolio.as_str(), &key, &order.id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		if let Err(e) = self
			.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
		{
			if let Err(rollback) = self
				.storage
				.remove(StorageKey::OrderByFolio.as_str(), &key)
				.await
			{
				tracing::warn!(folio = %key, "Failed to roll back folio index: {}", rollback);
			}
			return Err(OrderStateError::Storage(e.to_string()));
		}

		Ok(())
	}

	/// Resolves a folio to its order.
	pub async fn find_by_folio(&self, folio: &str) -> Result<ServiceOrder, OrderStateError> {
		let order_id: Option<String> = self
			.storage
			.retrieve_optional(StorageKey::OrderByFolio.as_str(), &folio_key(folio))
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		match order_id {
			Some(id) => self.get_order(&id).await.map_err(|e| match e {
				// Index entry without an order behind it
				OrderStateError::OrderNotFound(_) => {
					OrderStateError::OrderNotFound(folio.to_string())
				},
				other => other,
			}),
			None => Err(OrderStateError::OrderNotFound(folio.to_string())),
		}
	}

	/// Loads every stored order.
	pub async fn list_orders(&self) -> Result<Vec<ServiceOrder>, OrderStateError> {
		self.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use cremation_storage::implementations::memory::MemoryStorage;
	use cremation_storage::StorageInterface;
	use cremation_types::{OwnerRef, PetRef, ServiceType};
	use std::time::Duration;

	fn machine() -> OrderStateMachine {
		OrderStateMachine::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	/// Memory backend whose writes fail for one namespace.
	struct FailingWrites {
		inner: MemoryStorage,
		namespace: &'static str,
	}

	#[async_trait]
	impl StorageInterface for FailingWrites {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(
			&self,
			key: &str,
			value: Vec<u8>,
			ttl: Option<Duration>,
		) -> Result<(), StorageError> {
			if key.starts_with(&format!("{}:", self.namespace)) {
				return Err(StorageError::Backend("disk full".to_string()));
			}
			self.inner.set_bytes(key, value, ttl).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list_keys(prefix).await
		}
	}

	fn machine_failing(namespace: &'static str) -> OrderStateMachine {
		OrderStateMachine::new(Arc::new(StorageService::new(Box::new(FailingWrites {
			inner: MemoryStorage::new(),
			namespace,
		}))))
	}

	fn order(id: &str, folio: &str, status: OrderStatus) -> ServiceOrder {
		ServiceOrder {
			id: id.to_string(),
			folio: folio.to_string(),
			status,
			service_type: ServiceType::Immediate,
			pet: PetRef {
				id: "pet-1".to_string(),
				name: "Max".to_string(),
			},
			owner: OwnerRef {
				id: "owner-1".to_string(),
				name: "Ana López".to_string(),
			},
			branch_id: None,
			created_at: 1,
			updated_at: 1,
		}
	}

	#[tokio::test]
	async fn test_every_adjacent_pair_advances() {
		let sm = machine();
		for (i, pair) in OrderStatus::ALL.windows(2).enumerate() {
			let id = format!("order-{}", i);
			sm.store_order(&order(&id, &format!("CRM-{}", i), pair[0]))
				.await
				.unwrap();

			let (from, updated) = sm.advance(&id, pair[1]).await.unwrap();
			assert_eq!(from, pair[0]);
			assert_eq!(updated.status, pair[1]);
			assert!(updated.updated_at >= updated.created_at);

			let stored = sm.get_order(&id).await.unwrap();
			assert_eq!(stored.status, pair[1]);
		}
	}

	#[tokio::test]
	async fn test_every_non_adjacent_pair_is_rejected() {
		let sm = machine();
		for (i, current) in OrderStatus::ALL.into_iter().enumerate() {
			let id = format!("order-{}", i);
			sm.store_order(&order(&id, &format!("CRM-{}", i), current))
				.await
				.unwrap();

			for requested in OrderStatus::ALL {
				if requested.index() == current.index() + 1 {
					continue;
				}
				let result = sm.advance(&id, requested).await;
				assert!(
					matches!(
						result,
						Err(OrderStateError::InvalidTransition { from, to })
							if from == current && to == requested
					),
					"{} -> {} should be rejected",
					current,
					requested
				);
			}

			// Rejections leave the order untouched
			assert_eq!(sm.get_order(&id).await.unwrap().status, current);
		}
	}

	#[tokio::test]
	async fn test_advance_unknown_order() {
		let sm = machine();
		let result = sm.advance("unknown-id", OrderStatus::InTransit).await;
		assert!(matches!(result, Err(OrderStateError::OrderNotFound(id)) if id == "unknown-id"));
	}

	#[tokio::test]
	async fn test_completed_is_terminal() {
		let sm = machine();
		sm.store_order(&order("done", "CRM-DONE", OrderStatus::Completed))
			.await
			.unwrap();
		for requested in OrderStatus::ALL {
			assert!(sm.advance("done", requested).await.is_err());
		}
	}

	#[tokio::test]
	async fn test_duplicate_folio_rejected_case_insensitively() {
		let sm = machine();
		sm.store_order(&order("a", "CRM-00AB", OrderStatus::PendingPickup))
			.await
			.unwrap();

		let result = sm
			.store_order(&order("b", "crm-00ab", OrderStatus::PendingPickup))
			.await;
		assert!(matches!(result, Err(OrderStateError::FolioConflict(_))));
		assert!(matches!(
			sm.get_order("b").await,
			Err(OrderStateError::OrderNotFound(_))
		));
	}

	#[tokio::test]
	async fn test_failed_order_write_leaves_no_folio_entry() {
		let sm = machine_failing("orders");

		let result = sm
			.store_order(&order("a", "CRM-00AB", OrderStatus::PendingPickup))
			.await;
		assert!(matches!(result, Err(OrderStateError::Storage(_))));

		// Folio is free again and nothing is listed
		assert!(matches!(
			sm.find_by_folio("CRM-00AB").await,
			Err(OrderStateError::OrderNotFound(_))
		));
		assert!(sm.list_orders().await.unwrap().is_empty());
		let indexed = sm
			.storage
			.exists(StorageKey::OrderByFolio.as_str(), "CRM-00AB")
			.await
			.unwrap();
		assert!(!indexed);
	}

	#[tokio::test]
	async fn test_failed_index_write_stores_no_order() {
		let sm = machine_failing("order_by_folio");

		let result = sm
			.store_order(&order("a", "CRM-00AB", OrderStatus::PendingPickup))
			.await;
		assert!(matches!(result, Err(OrderStateError::Storage(_))));
		assert!(sm.list_orders().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_find_by_folio() {
		let sm = machine();
		sm.store_order(&order("a", "CRM-00AB", OrderStatus::InTransit))
			.await
			.unwrap();

		let found = sm.find_by_folio(" crm-00ab ").await.unwrap();
		assert_eq!(found.id, "a");

		let missing = sm.find_by_folio("CRM-FFFF").await;
		assert!(matches!(missing, Err(OrderStateError::OrderNotFound(f)) if f == "CRM-FFFF"));
	}

	#[tokio::test]
	async fn test_list_orders() {
		let sm = machine();
		sm.store_order(&order("a", "CRM-1", OrderStatus::InTransit))
			.await
			.unwrap();
		sm.store_order(&order("b", "CRM-2", OrderStatus::Completed))
			.await
			.unwrap();

		let mut ids: Vec<String> = sm
			.list_orders()
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.id)
			.collect();
		ids.sort();
		assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn test_api_error_mapping() {
		let cases: Vec<(OrderStateError, u16, &str)> = vec![
			(OrderStateError::OrderNotFound("x".into()), 404, "ORDER_NOT_FOUND"),
			(
				OrderStateError::UnknownStatus(UnknownStatus("PROCESS".into())),
				400,
				"UNKNOWN_STATUS",
			),
			(OrderStateError::Validation("bad".into()), 400, "VALIDATION_ERROR"),
			(
				OrderStateError::InvalidTransition {
					from: OrderStatus::PendingPickup,
					to: OrderStatus::Completed,
				},
				409,
				"INVALID_TRANSITION",
			),
			(OrderStateError::FolioConflict("CRM-1".into()), 409, "FOLIO_CONFLICT"),
			(
				OrderStateError::SessionNotAllowed(OrderStatus::InTransit),
				409,
				"SESSION_NOT_ALLOWED",
			),
			(OrderStateError::SessionNotFound("x".into()), 404, "SESSION_NOT_FOUND"),
			(OrderStateError::Storage("disk".into()), 500, "PERSISTENCE_ERROR"),
		];

		for (err, status, code) in cases {
			let api = APIError::from(err);
			assert_eq!(api.status_code(), status);
			assert_eq!(api.to_error_response().error, code);
		}
	}

	#[test]
	fn test_invalid_transition_details() {
		let api = APIError::from(OrderStateError::InvalidTransition {
			from: OrderStatus::InTransit,
			to: OrderStatus::Delivered,
		});
		let details = api.to_error_response().details.unwrap();
		assert_eq!(details["from"], "IN_TRANSIT");
		assert_eq!(details["to"], "DELIVERED");
		assert_eq!(details["expected"], "AT_CREMATORY");
	}
}
