//! Tracking engine that owns the service order workflow.
//!
//! The TrackingEngine is the single entry point used by the HTTP layer. It
//! wraps the order state machine, resolves folios, assembles the timeline
//! and tracking views, publishes events after every persisted change and
//! runs the periodic storage cleanup.

pub mod event_bus;
pub mod lifecycle;

use crate::filter::filter;
use crate::state::{OrderStateError, OrderStateMachine};
use crate::timeline::{project, project_phases};
use cremation_config::Config;
use cremation_storage::StorageService;
use cremation_types::{
	current_timestamp, truncate_id, ActiveOrdersQuery, CreateOrderRequest, CremationSession,
	NamedRef, OrderEvent, OrderStatus, RecordSessionRequest, ServiceOrder, StorageKey,
	TimelineResponse, TrackingEvent, TrackingResponse,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
}

/// Longest folio accepted from clients.
const MAX_FOLIO_LEN: usize = 32;

/// Attempts made to find a free generated folio before giving up.
const FOLIO_ATTEMPTS: usize = 3;

/// Main engine coordinating order intake, transitions and lookups.
#[derive(Clone)]
pub struct TrackingEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Storage service for persisting state.
	pub(crate) storage: Arc<StorageService>,
	/// Order state machine
	pub(crate) state_machine: Arc<OrderStateMachine>,
	/// Event bus for order change notifications.
	pub(crate) event_bus: event_bus::EventBus,
}

impl TrackingEngine {
	/// Creates a new tracking engine over the given storage.
	pub fn new(config: Config, storage: Arc<StorageService>, event_bus: event_bus::EventBus) -> Self {
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		Self {
			config,
			storage,
			state_machine,
			event_bus,
		}
	}

	/// Registers a new order at `PENDING_PICKUP`.
	///
	/// A client-supplied folio is kept as given (trimmed). Otherwise one is
	/// generated from the configured prefix and random hex digits.
	pub async fn create_order(
		&self,
		request: CreateOrderRequest,
	) -> Result<ServiceOrder, OrderStateError> {
		let pet_id = required("pet.id", &request.pet.id)?;
		let pet_name = required("pet.name", &request.pet.name)?;
		let owner_id = required("owner.id", &request.owner.id)?;
		let owner_name = required("owner.name", &request.owner.name)?;
		let branch_id = request
			.branch_id
			.as_deref()
			.map(str::trim)
			.filter(|b| !b.is_empty())
			.map(String::from);

		let client_folio = match request.folio.as_deref() {
			Some(folio) => Some(validate_folio(folio)?),
			None => None,
		};

		let now = current_timestamp();
		let mut order = ServiceOrder {
			id: uuid::Uuid::new_v4().to_string(),
			folio: String::new(),
			status: OrderStatus::PendingPickup,
			service_type: request.service_type,
			pet: cremation_types::PetRef {
				id: pet_id,
				name: pet_name,
			},
			owner: cremation_types::OwnerRef {
				id: owner_id,
				name: owner_name,
			},
			branch_id,
			created_at: now,
			updated_at: now,
		};

		match client_folio {
			Some(folio) => {
				order.folio = folio;
				self.state_machine.store_order(&order).await?;
			},
			None => {
				let mut attempt = 0;
				loop {
					attempt += 1;
					order.folio = self.generate_folio();
					match self.state_machine.store_order(&order).await {
						Ok(()) => break,
						Err(OrderStateError::FolioConflict(folio)) if attempt < FOLIO_ATTEMPTS => {
							tracing::debug!(folio = %folio, "Generated folio already taken, retrying");
						},
						Err(e) => return Err(e),
					}
				}
			},
		}

		tracing::info!(
			order_id = %truncate_id(&order.id),
			folio = %order.folio,
			"Registered service order"
		);
		self.event_bus
			.publish(TrackingEvent::Order(OrderEvent::Created {
				order: order.clone(),
			}));

		Ok(order)
	}

	fn generate_folio(&self) -> String {
		let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
		format!("{}-{}", self.config.service.folio_prefix, &hex[..8])
	}

	/// Advances an order to the status named by `requested`.
	///
	/// The name must be one of the seven wire names; anything else is
	/// rejected with `UnknownStatus` before the order is read.
	pub async fn advance(
		&self,
		order_id: &str,
		requested: &str,
	) -> Result<ServiceOrder, OrderStateError> {
		let requested: OrderStatus = requested.parse()?;
		self.advance_to(order_id, requested).await
	}

	/// Advances an order to `requested`, which must be the next status.
	pub async fn advance_to(
		&self,
		order_id: &str,
		requested: OrderStatus,
	) -> Result<ServiceOrder, OrderStateError> {
		let (from, order) = self.state_machine.advance(order_id, requested).await?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			folio = %order.folio,
			from = %from,
			to = %order.status,
			"Advanced order status"
		);
		self.event_bus
			.publish(TrackingEvent::Order(OrderEvent::StatusAdvanced {
				order_id: order.id.clone(),
				folio: order.folio.clone(),
				from,
				to: order.status,
			}));

		Ok(order)
	}

	/// Gets an order by id.
	pub async fn get_order(&self, order_id: &str) -> Result<ServiceOrder, OrderStateError> {
		self.state_machine.get_order(order_id).await
	}

	/// Gets an order by folio, ignoring case.
	pub async fn find_by_folio(&self, folio: &str) -> Result<ServiceOrder, OrderStateError> {
		self.state_machine.find_by_folio(folio).await
	}

	/// Lists orders that have not reached the terminal status, oldest first.
	pub async fn active_orders(
		&self,
		query: &ActiveOrdersQuery,
	) -> Result<Vec<ServiceOrder>, OrderStateError> {
		let branch = query
			.sucursal
			.as_deref()
			.map(str::trim)
			.filter(|b| !b.is_empty());

		let mut orders: Vec<ServiceOrder> = self
			.state_machine
			.list_orders()
			.await?
			.into_iter()
			.filter(|o| !o.status.is_terminal())
			.filter(|o| branch.is_none_or(|b| o.branch_id.as_deref() == Some(b)))
			.collect();
		orders.sort_by(|a, b| {
			a.created_at
				.cmp(&b.created_at)
				.then_with(|| a.folio.cmp(&b.folio))
		});

		Ok(filter(orders, query.q.as_deref().unwrap_or("")))
	}

	/// Builds the timeline view of an order.
	pub async fn timeline(&self, order_id: &str) -> Result<TimelineResponse, OrderStateError> {
		let order = self.get_order(order_id).await?;
		Ok(TimelineResponse {
			order_id: order.id,
			folio: order.folio,
			status: order.status,
			steps: project(order.status),
			phases: project_phases(order.status),
		})
	}

	/// Builds the public tracking view for a folio.
	pub async fn tracking(&self, folio: &str) -> Result<TrackingResponse, OrderStateError> {
		let order = self.find_by_folio(folio).await?;
		let cremation_session = self.cremation_session(&order.id).await?;

		Ok(TrackingResponse {
			status_label: order.status.label().to_string(),
			phase: order.status.phase(),
			service_type: order.service_type,
			pet: NamedRef {
				name: order.pet.name,
			},
			cremation_session,
			timeline: project(order.status),
			created_at: order.created_at,
			updated_at: order.updated_at,
			status: order.status,
			folio: order.folio,
		})
	}

	/// Attaches a cremation session to an order.
	///
	/// Only orders that have reached `CREMATING` accept a session. Recording
	/// again replaces the previous session.
	pub async fn record_cremation_session(
		&self,
		order_id: &str,
		request: RecordSessionRequest,
	) -> Result<CremationSession, OrderStateError> {
		let operator = required("operator", &request.operator)?;
		let order = self.get_order(order_id).await?;
		if order.status < OrderStatus::Cremating {
			return Err(OrderStateError::SessionNotAllowed(order.status));
		}

		let started_at = request.started_at.unwrap_or_else(current_timestamp);
		if let Some(finished_at) = request.finished_at {
			if finished_at < started_at {
				return Err(OrderStateError::Validation(
					"finishedAt cannot be earlier than startedAt".into(),
				));
			}
		}

		let session = CremationSession {
			order_id: order.id.clone(),
			operator,
			started_at,
			finished_at: request.finished_at,
			certificate_number: non_blank(request.certificate_number),
			notes: non_blank(request.notes),
		};

		self.storage
			.store(StorageKey::CremationSessions.as_str(), &order.id, &session)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			folio = %order.folio,
			operator = %session.operator,
			"Recorded cremation session"
		);
		self.event_bus
			.publish(TrackingEvent::Order(OrderEvent::CremationSessionRecorded {
				order_id: order.id,
			}));

		Ok(session)
	}

	/// Gets the cremation session of an order, if one was recorded.
	pub async fn cremation_session(
		&self,
		order_id: &str,
	) -> Result<Option<CremationSession>, OrderStateError> {
		self.storage
			.retrieve_optional(StorageKey::CremationSessions.as_str(), order_id)
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))
	}

	/// Spawns the periodic storage cleanup task.
	pub fn start_cleanup_task(&self) -> JoinHandle<()> {
		let storage = self.storage.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {}, // No expired entries
				}
			}
		})
	}

	/// Runs background maintenance until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.initialize().await?;
		let cleanup_handle = self.start_cleanup_task();

		let result = tokio::signal::ctrl_c()
			.await
			.map_err(|e| EngineError::Service(format!("Failed to listen for shutdown: {}", e)));

		cleanup_handle.abort();
		self.shutdown().await?;
		result
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}
}

/// Trims a required text field, rejecting blanks.
fn required(field: &str, value: &str) -> Result<String, OrderStateError> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(OrderStateError::Validation(format!(
			"{} cannot be empty",
			field
		)));
	}
	Ok(trimmed.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
}

/// Checks a client-supplied folio and returns it trimmed.
///
/// Folios double as storage ids, so separators are not allowed.
fn validate_folio(folio: &str) -> Result<String, OrderStateError> {
	let folio = required("folio", folio)?;
	if folio.len() > MAX_FOLIO_LEN {
		return Err(OrderStateError::Validation(format!(
			"folio cannot exceed {} characters",
			MAX_FOLIO_LEN
		)));
	}
	if !folio
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
	{
		return Err(OrderStateError::Validation(
			"folio may only contain letters, digits, '-' and '_'".into(),
		));
	}
	Ok(folio)
}
