//! Multi-file configuration loading.
//!
//! A file's `include` entry (a string or an array of strings) names further
//! files relative to the including file. Includes may nest. Top-level
//! sections are merged as-is and must not repeat across files.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a root configuration file together with everything it includes.
pub struct ConfigLoader {
	/// Base path for resolving the root file
	base_path: PathBuf,
	/// Canonical paths already read, for cycle detection
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads, merges and validates the configuration rooted at `config_path`.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let root = resolve_path(&self.base_path, config_path.as_ref())?;
		let mut combined = toml::Table::new();
		let mut pending = vec![root];

		while let Some(path) = pending.pop() {
			let content = self.load_file(&path).await?;
			let mut table: toml::Table = toml::from_str(&content)?;
			let includes = extract_includes(table.remove("include"))?;

			for (section, value) in table {
				if let Some(existing) = self.section_sources.get(&section) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						section,
						existing.display(),
						path.display()
					)));
				}
				self.section_sources.insert(section.clone(), path.clone());
				combined.insert(section, value);
			}

			let include_base = path.parent().unwrap_or(&self.base_path).to_path_buf();
			for include in includes.iter().rev() {
				pending.push(resolve_path(&include_base, include)?);
			}
		}

		let config: Config = toml::Value::Table(combined).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a file once and resolves its environment references.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}
}

fn extract_includes(value: Option<toml::Value>) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

fn resolve_path(base: &Path, path: &Path) -> Result<PathBuf, ConfigError> {
	let resolved = if path.is_absolute() {
		path.to_path_buf()
	} else {
		base.join(path)
	};

	if !resolved.exists() {
		return Err(ConfigError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("Configuration file not found: {}", resolved.display()),
		)));
	}

	Ok(resolved)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const SERVICE: &str = r#"
[service]
id = "order-lifecycle-test"
"#;

	const STORAGE: &str = r#"
[storage]
primary = "memory"
cleanup_interval_seconds = 60
[storage.implementations.memory]
"#;

	const NOTIFICATION: &str = r#"
[notification]
primary = "log"
[notification.implementations.log]
[notification.stores.1]
code = "default"
name = "Default Store View"
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{}{}{}", SERVICE, STORAGE, NOTIFICATION)).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.service.id, "order-lifecycle-test");
		assert_eq!(config.storage.cleanup_interval_seconds, 60);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = [\"storage.toml\", \"notification.toml\"]\n{}", SERVICE);

		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();
		fs::write(temp_dir.path().join("notification.toml"), NOTIFICATION).unwrap();

		let config = Config::from_file(temp_dir.path().join("main.toml").to_str().unwrap())
			.await
			.unwrap();

		assert_eq!(config.service.id, "order-lifecycle-test");
		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.notification.store(1).unwrap().name, "Default Store View");
	}

	#[tokio::test]
	async fn test_nested_include_relative_to_including_file() {
		let temp_dir = TempDir::new().unwrap();
		fs::create_dir(temp_dir.path().join("parts")).unwrap();

		let main = format!("include = \"parts/storage.toml\"\n{}", SERVICE);
		let storage = format!("include = \"notification.toml\"\n{}", STORAGE);

		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("parts/storage.toml"), storage).unwrap();
		fs::write(temp_dir.path().join("parts/notification.toml"), NOTIFICATION).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.notification.primary, "log");
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = [\"duplicate.toml\"]\n{}", SERVICE);

		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), SERVICE).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error = loader.load_config("main.toml").await.unwrap_err();

		assert!(error.to_string().contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config = format!("include = [\"self.toml\"]\n{}", SERVICE);
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error = loader.load_config("self.toml").await.unwrap_err();

		assert!(error.to_string().contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = \"absent.toml\"\n{}", SERVICE);
		fs::write(temp_dir.path().join("main.toml"), main).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Io(_))
		));
	}

	#[tokio::test]
	async fn test_include_must_be_strings() {
		let temp_dir = TempDir::new().unwrap();
		let main = format!("include = [1]\n{}", SERVICE);
		fs::write(temp_dir.path().join("main.toml"), main).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Validation(_))
		));
	}
}
