//! File-based storage backend.
//!
//! Each key is stored as one `.bin` file under the configured directory. Files
//! start with a fixed header carrying the expiry time so the periodic cleanup
//! task can drop expired entries without deserializing payloads.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use cremation_types::{
	current_timestamp, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey,
	ValidationError,
};
use uuid::Uuid;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Fixed-size file header.
///
/// Binary layout (32 bytes total):
/// - [0-3]: Magic bytes "CRMS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-31]: Reserved
#[derive(Debug, Clone, PartialEq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"CRMS";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	/// Creates a new header; a zero TTL never expires.
	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			current_timestamp().saturating_add(ttl.as_secs())
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}

		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing file header".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && current_timestamp() >= self.expires_at
	}
}

/// TTL configuration per storage namespace.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Reads `ttl_<namespace>` entries (seconds) from the backend table.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all() {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.and_then(|v| u64::try_from(v).ok())
				{
					ttls.insert(storage_key, Duration::from_secs(ttl_value));
				}
			}
		}

		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for different storage keys.
	ttl_config: TtlConfig,
}

/// Maps a key or key prefix to its on-disk spelling.
fn sanitize(key: &str) -> String {
	key.replace(['/', ':'], "_")
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.bin", sanitize(key)))
	}

	/// Unique sibling path for an in-flight write. Never matches `.bin`.
	fn temp_path_for(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}.tmp", sanitize(key), Uuid::new_v4().simple()))
	}

	/// Gets the TTL for a key based on its namespace ("orders:123" -> "orders").
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");

		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Collects the file stems of every `.bin` file in the base directory.
	async fn stored_stems(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut stems = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				stems.push((stem.to_string(), path.clone()));
			}
		}

		Ok(stems)
	}

	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;

		for (_, path) in self.stored_stems().await? {
			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
					continue;
				},
			};

			let Ok(header) = FileHeader::deserialize(&data) else {
				tracing::debug!("Skipping file {:?}: no valid header", path);
				continue;
			};

			if header.is_expired() {
				match fs::remove_file(&path).await {
					Ok(()) => removed += 1,
					Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
				}
			}
		}

		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}

		Ok(data[FileHeader::SIZE..].to_vec())
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let header = FileHeader::new(ttl);

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		// Each write gets its own temp file; the rename is the commit point
		let temp_path = self.temp_path_for(key);
		if let Err(e) = fs::write(&temp_path, file_data).await {
			let _ = fs::remove_file(&temp_path).await;
			return Err(StorageError::Backend(e.to_string()));
		}

		if let Err(e) = fs::rename(&temp_path, &path).await {
			let _ = fs::remove_file(&temp_path).await;
			return Err(StorageError::Backend(e.to_string()));
		}

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		// Expired entries count as absent even before cleanup removes them
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let safe_prefix = sanitize(prefix);

		Ok(self
			.stored_stems()
			.await?
			.into_iter()
			.filter_map(|(stem, _)| {
				stem.strip_prefix(&safe_prefix)
					.map(|rest| format!("{}{}", prefix, rest))
			})
			.collect())
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];

		for storage_key in StorageKey::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_orders`, `ttl_order_by_folio`, `ttl_cremation_sessions`: TTL in seconds (default: 0, never)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage_in(dir: &TempDir) -> FileStorage {
		FileStorage::new(dir.path().to_path_buf(), TtlConfig::default())
	}

	#[test]
	fn test_header_layout() {
		let header = FileHeader::new(Duration::ZERO);
		let bytes = header.serialize();
		assert_eq!(&bytes[0..4], b"CRMS");
		assert_eq!(FileHeader::deserialize(&bytes).unwrap(), header);
		assert!(!header.is_expired());
	}

	#[test]
	fn test_header_rejects_foreign_files() {
		assert!(FileHeader::deserialize(b"short").is_err());
		assert!(FileHeader::deserialize(&[7u8; 32]).is_err());
	}

	#[tokio::test]
	async fn test_set_get_delete() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes("orders:abc", b"{}".to_vec(), None)
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("orders:abc").await.unwrap(), b"{}".to_vec());
		assert!(storage.exists("orders:abc").await.unwrap());

		storage.delete("orders:abc").await.unwrap();
		assert!(!storage.exists("orders:abc").await.unwrap());
		assert!(matches!(
			storage.get_bytes("orders:abc").await,
			Err(StorageError::NotFound)
		));
		// Deleting twice is fine
		storage.delete("orders:abc").await.unwrap();
	}

	#[tokio::test]
	async fn test_list_keys_restores_original_prefix() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir);

		storage.set_bytes("orders:a1", vec![1], None).await.unwrap();
		storage.set_bytes("orders:b2", vec![2], None).await.unwrap();
		storage
			.set_bytes("order_by_folio:CRM-1", vec![3], None)
			.await
			.unwrap();

		let mut keys = storage.list_keys("orders:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:a1".to_string(), "orders:b2".to_string()]);
	}

	#[tokio::test]
	async fn test_list_keys_on_missing_directory() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("nope"), TtlConfig::default());
		assert!(storage.list_keys("orders:").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_cleanup_removes_expired_entries() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir);

		storage.set_bytes("orders:keep", vec![1], None).await.unwrap();

		// Write an already-expired entry by hand
		let expired = FileHeader {
			version: FileHeader::VERSION,
			expires_at: 1,
		};
		let mut data = expired.serialize().to_vec();
		data.push(9);
		std::fs::write(storage.get_file_path("orders:gone"), data).unwrap();

		assert!(matches!(
			storage.get_bytes("orders:gone").await,
			Err(StorageError::NotFound)
		));
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(storage.exists("orders:keep").await.unwrap());
		assert!(!storage.exists("orders:gone").await.unwrap());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_writes_to_same_key() {
		let dir = TempDir::new().unwrap();
		let storage = std::sync::Arc::new(storage_in(&dir));

		for round in 0..50u8 {
			let handles: Vec<_> = (0..4u8)
				.map(|writer| {
					let storage = std::sync::Arc::clone(&storage);
					tokio::spawn(async move {
						storage
							.set_bytes("orders:x", vec![round, writer], None)
							.await
					})
				})
				.collect();

			for handle in handles {
				handle.await.unwrap().unwrap();
			}
			let stored = storage.get_bytes("orders:x").await.unwrap();
			assert_eq!(stored[0], round);
		}

		// No temp files are left behind
		let leftovers = std::fs::read_dir(dir.path())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.path().extension() == Some(std::ffi::OsStr::new("tmp")))
			.count();
		assert_eq!(leftovers, 0);
		assert_eq!(storage.list_keys("orders:").await.unwrap(), vec!["orders:x"]);
	}

	#[tokio::test]
	async fn test_exists_ignores_expired_entries() {
		let dir = TempDir::new().unwrap();
		let storage = storage_in(&dir);

		let expired = FileHeader {
			version: FileHeader::VERSION,
			expires_at: 1,
		};
		let mut data = expired.serialize().to_vec();
		data.extend_from_slice(b"\"order-1\"");
		std::fs::write(storage.get_file_path("order_by_folio:CRM-OLD"), data).unwrap();

		assert!(!storage.exists("order_by_folio:CRM-OLD").await.unwrap());
		// The file itself is still there until cleanup runs
		assert!(storage.get_file_path("order_by_folio:CRM-OLD").exists());
	}

	#[test]
	fn test_ttl_from_config() {
		let config: toml::Value = toml::from_str("ttl_cremation_sessions = 60").unwrap();
		let storage = FileStorage::new(PathBuf::from("."), TtlConfig::from_config(&config));
		assert_eq!(
			storage.get_ttl_for_key("cremation_sessions:1"),
			Duration::from_secs(60)
		);
		assert_eq!(storage.get_ttl_for_key("orders:1"), Duration::ZERO);
	}

	#[test]
	fn test_schema_rejects_negative_ttl() {
		let config: toml::Value = toml::from_str("ttl_orders = -5").unwrap();
		assert!(create_storage(&config).is_err());
	}
}
