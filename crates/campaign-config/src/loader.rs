//! Multi-file configuration loading.
//!
//! A root file may list other files under `include`. Included files are
//! merged section by section; a top-level section defined twice is an error.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
	/// Directory relative includes are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, to stop include cycles.
	loaded_files: HashSet<PathBuf>,
	/// Section name to the file that defined it.
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

	/// Loads a configuration file and all of its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let main_content = self.load_file(&config_path).await?;
		let main_toml: toml::Value = toml::from_str(&main_content)?;

		let includes = extract_includes(&main_toml)?;
		if includes.is_empty() {
			return main_content.parse();
		}

		let combined = self.combine(main_toml, includes, config_path).await?;
		let combined_str = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined_str.parse()
	}

	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	async fn combine(
		&mut self,
		mut main_toml: toml::Value,
		includes: Vec<PathBuf>,
		main_path: PathBuf,
	) -> Result<toml::Value, ConfigError> {
		let main_table = main_toml.as_table_mut().ok_or_else(|| {
			ConfigError::Validation("Configuration root must be a table".into())
		})?;
		main_table.remove("include");
		for key in main_table.keys() {
			self.section_sources.insert(key.clone(), main_path.clone());
		}

		for include in includes {
			let resolved = self.resolve_path(&include)?;
			let content = self.load_file(&resolved).await?;
			let include_toml: toml::Value = toml::from_str(&content)?;
			let Some(include_table) = include_toml.as_table() else {
				continue;
			};

			for (key, value) in include_table {
				if key == "include" {
					return Err(ConfigError::Validation(format!(
						"Nested include in {} is not supported",
						resolved.display()
					)));
				}
				if let Some(existing) = self.section_sources.get(key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing.display(),
						resolved.display()
					)));
				}
				self.section_sources.insert(key.clone(), resolved.clone());
				main_table.insert(key.clone(), value.clone());
			}
		}

		Ok(main_toml)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// Reads `include`, given either as one path or as an array of paths.
fn extract_includes(toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match toml.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::BASE_CONFIG;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, BASE_CONFIG).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.app.id, "campaigns-test");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main = r#"
include = ["network.toml", "wallet.toml"]

[app]
id = "split-config"

[contract]
address = "0xec8a14c5ddc18c63c4da7d46893fa7d39aefd459"
"#;
		let network = r#"
[network]
chain_id = 545
name = "Flow EVM Testnet"
rpc_urls = ["https://testnet.evm.nodes.onflow.org"]
[network.native_currency]
name = "FLOW"
symbol = "FLOW"
decimals = 18
"#;
		let wallet = r#"
[wallet]
primary = "json_rpc"
[wallet.implementations.json_rpc]
rpc_url = "https://testnet.evm.nodes.onflow.org"

[transactions]
poll_interval_ms = 500
"#;

		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("network.toml"), network).unwrap();
		fs::write(temp_dir.path().join("wallet.toml"), wallet).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.app.id, "split-config");
		assert_eq!(config.network.name, "Flow EVM Testnet");
		assert_eq!(config.transactions.poll_interval_ms, 500);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		let main = "include = [\"duplicate.toml\"]\n\n[app]\nid = \"one\"\n";
		let duplicate = "[app]\nid = \"two\"\n";

		fs::write(temp_dir.path().join("main.toml"), main).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'app'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config = "include = [\"self.toml\"]\n\n[app]\nid = \"loop\"\n";
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("self.toml").await.unwrap_err();
		assert!(err.to_string().contains("already loaded"));
	}

	#[tokio::test]
	async fn test_from_file_reads_single_file() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(temp_dir.path().join("campaigns.toml"), BASE_CONFIG).unwrap();

		let path = temp_dir.path().join("campaigns.toml");
		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		assert_eq!(
			config.contract.address.to_string().to_lowercase(),
			"0xec8a14c5ddc18c63c4da7d46893fa7d39aefd459"
		);
	}
}
