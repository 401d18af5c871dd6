//! Main entry point for the cremation tracking service.
//!
//! Loads the configuration, wires the configured storage backend into the
//! tracking engine and serves the HTTP API until interrupted.

use clap::Parser;
use cremation_config::Config;
use cremation_core::{EngineBuilder, EngineFactories, TrackingEngine};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use cremation_storage::StorageFactory;
use std::collections::HashMap;

/// Command-line arguments for the tracking service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "CREMATION_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the tracking service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the tracking engine with the configured storage
/// 5. Runs the engine and API server until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started cremation tracker");

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			engine.initialize().await?;
			let cleanup_handle = engine.start_cleanup_task();

			// Serves until Ctrl+C, draining in-flight requests
			let result = server::start_server(api_config, Arc::clone(&engine)).await;
			tracing::info!("API server finished");

			cleanup_handle.abort();
			engine.shutdown().await?;
			result?;
		},
		None => {
			tracing::warn!("API server disabled, running storage maintenance only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped cremation tracker");
	Ok(())
}

/// Builds the tracking engine with every registered storage backend.
fn build_engine(config: Config) -> Result<TrackingEngine, Box<dyn std::error::Error>> {
	let builder = EngineBuilder::new(config);

	let storage_factories: HashMap<String, StorageFactory> =
		cremation_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();

	Ok(builder.build(EngineFactories { storage_factories })?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use cremation_config::ConfigBuilder;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["cremation-tracker"]);

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from([
			"cremation-tracker",
			"--config",
			"custom.toml",
			"--log-level",
			"debug",
		]);

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[test]
	fn test_build_engine_with_minimal_config() {
		let config = ConfigBuilder::new().service_id("test-crematorio").build();

		let engine = build_engine(config).expect("Failed to build engine");
		assert_eq!(engine.config().service.id, "test-crematorio");
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().expect("Failed to create temp dir");
		let config_path = temp_dir.path().join("test_config.toml");
		let storage_dir = temp_dir.path().join("storage");

		let config_content = format!(
			r#"
[service]
id = "test-file-crematorio"

[storage]
primary = "file"
cleanup_interval_seconds = 120
[storage.implementations.file]
storage_path = "{}"

[api]
enabled = true
port = 3100
"#,
			storage_dir.display()
		);

		std::fs::write(&config_path, config_content).expect("Failed to write config");

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.expect("Failed to load config");
		assert_eq!(config.service.id, "test-file-crematorio");
		assert_eq!(config.api.as_ref().map(|a| a.port), Some(3100));

		let engine = build_engine(config).expect("Failed to build engine");
		engine.initialize().await.expect("Failed to initialize");
	}
}
