//! Multi-file configuration loading.
//!
//! A file may pull in others through `include`, given as a string or an
//! array of strings. Included files may include further files; relative
//! paths resolve against the directory of the file that names them. Every
//! top-level section must come from exactly one file, and a file may not
//! include itself, directly or through another file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

type MergeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ConfigError>> + Send + 'a>>;

/// Loads a configuration file together with everything it includes.
pub struct ConfigLoader {
	/// Directory the top-level file is resolved against.
	base_path: PathBuf,
	/// Files currently being merged, outermost first.
	include_chain: Vec<PathBuf>,
	/// File each top-level section came from.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			include_chain: Vec::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads `config_path` and its includes into a validated [`Config`].
	pub async fn load_config(&mut self, config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let root = locate(&self.base_path, config_path.as_ref())?;

		let mut merged = toml::Table::new();
		self.merge_file(root, &mut merged).await?;

		let config: Config = toml::Value::Table(merged).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Merges the sections of `path` into `merged`, then follows its includes.
	fn merge_file<'a>(&'a mut self, path: PathBuf, merged: &'a mut toml::Table) -> MergeFuture<'a> {
		Box::pin(async move {
			let canonical = path.canonicalize().map_err(|e| {
				ConfigError::Io(std::io::Error::new(
					std::io::ErrorKind::NotFound,
					format!("Cannot resolve path {}: {}", path.display(), e),
				))
			})?;

			if self.include_chain.contains(&canonical) {
				let chain = self
					.include_chain
					.iter()
					.map(|p| p.display().to_string())
					.collect::<Vec<_>>()
					.join(" -> ");
				return Err(ConfigError::Validation(format!(
					"Circular include detected: {} was already loaded ({} -> {})",
					canonical.display(),
					chain,
					canonical.display()
				)));
			}

			let content = resolve_env_vars(&tokio::fs::read_to_string(&canonical).await?)?;
			let mut table: toml::Table = toml::from_str(&content)?;
			let includes = match table.remove("include") {
				Some(value) => include_paths(value)?,
				None => Vec::new(),
			};

			for (section, value) in table {
				if let Some(existing) = self
					.section_sources
					.insert(section.clone(), canonical.clone())
				{
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						section,
						existing.display(),
						canonical.display()
					)));
				}
				merged.insert(section, value);
			}

			let dir = canonical
				.parent()
				.map(Path::to_path_buf)
				.unwrap_or_default();
			self.include_chain.push(canonical);
			for include in includes {
				let resolved = locate(&dir, &include)?;
				self.merge_file(resolved, merged).await?;
			}
			self.include_chain.pop();

			Ok(())
		})
	}
}

/// Reads an `include` value: one path or an array of paths.
fn include_paths(value: toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

/// Resolves `path` against `dir` and checks that the file exists.
fn locate(dir: &Path, path: &Path) -> Result<PathBuf, ConfigError> {
	let resolved = if path.is_absolute() {
		path.to_path_buf()
	} else {
		dir.join(path)
	};

	if !resolved.exists() {
		return Err(ConfigError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("Configuration file not found: {}", resolved.display()),
		)));
	}

	Ok(resolved)
}
