//! Builder pattern for constructing tracking engines.
//!
//! Storage backends are created from the `[storage.implementations.*]`
//! sections of the configuration through factory functions keyed by
//! implementation name.

use crate::engine::{event_bus::EventBus, TrackingEngine};
use cremation_config::Config;
use cremation_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the engine's event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for the factory functions needed to build a TrackingEngine.
pub struct EngineFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing a TrackingEngine with pluggable storage.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	/// Creates a new EngineBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the TrackingEngine, instantiating every configured storage
	/// implementation and keeping the primary one.
	pub fn build<SF>(self, factories: EngineFactories<SF>) -> Result<TrackingEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(
					component = "storage",
					implementation = %name,
					"No factory registered, skipping"
				);
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					// Validation already happened in the factory
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));

		Ok(TrackingEngine::new(
			self.config,
			storage,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use cremation_config::ConfigBuilder;
	use cremation_storage::implementations::{file, memory};
	use cremation_storage::StorageFactory;

	fn factories() -> EngineFactories<StorageFactory> {
		let mut storage_factories = HashMap::new();
		storage_factories.insert("memory".to_string(), memory::create_storage as StorageFactory);
		storage_factories.insert("file".to_string(), file::create_storage as StorageFactory);
		EngineFactories { storage_factories }
	}

	#[test]
	fn test_build_with_memory_storage() {
		let engine = EngineBuilder::new(ConfigBuilder::new().service_id("sucursal-1").build())
			.build(factories())
			.unwrap();
		assert_eq!(engine.config().service.id, "sucursal-1");
	}

	#[tokio::test]
	async fn test_build_with_file_storage() {
		let dir = tempfile::tempdir().unwrap();
		let mut table = toml::Table::new();
		table.insert(
			"storage_path".to_string(),
			toml::Value::String(dir.path().to_string_lossy().into_owned()),
		);
		let config = ConfigBuilder::new()
			.storage_implementation("file", toml::Value::Table(table))
			.storage_primary("file")
			.build();

		let engine = EngineBuilder::new(config).build(factories()).unwrap();
		engine.initialize().await.unwrap();
	}

	#[test]
	fn test_missing_primary_factory() {
		let config = ConfigBuilder::new()
			.storage_implementation("redis", toml::Value::Table(toml::Table::new()))
			.storage_primary("redis")
			.build();

		let result = EngineBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("redis")));
	}

	#[test]
	fn test_invalid_storage_config() {
		let config = ConfigBuilder::new()
			.storage_implementation("memory", toml::Value::Integer(1))
			.build();

		let result = EngineBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
