//! Asset upload for campaign images.
//!
//! Campaign images are pinned to content-addressed storage before the
//! campaign is created; the registry only stores the resulting URI. Upload
//! failures are reported as-is and never retried.

use async_trait::async_trait;
use campaign_types::{ConfigSchema, ImplementationRegistry};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod pinata;
}

#[derive(Debug, Error)]
pub enum UploadError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Upload rejected ({status}): {message}")]
	Rejected { status: u16, message: String },
	#[error("Invalid upload response: {0}")]
	InvalidResponse(String),
	#[error("Cannot read {path}: {message}")]
	Io { path: String, message: String },
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Pins a file and returns the URI under which it is served.
#[async_trait]
pub trait UploadInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<String, UploadError>;
}

pub type UploadFactory = fn(&toml::Value) -> Result<Box<dyn UploadInterface>, UploadError>;

pub trait UploadRegistry: ImplementationRegistry<Factory = UploadFactory> {}

pub fn get_all_implementations() -> Vec<(&'static str, UploadFactory)> {
	use implementations::pinata;

	vec![(pinata::Registry::NAME, pinata::Registry::factory())]
}

/// Front for the configured upload backend.
pub struct UploadService {
	implementations: HashMap<String, Arc<dyn UploadInterface>>,
	primary: String,
}

impl UploadService {
	pub fn new(
		implementations: HashMap<String, Arc<dyn UploadInterface>>,
		primary: String,
	) -> Self {
		Self {
			implementations,
			primary,
		}
	}

	fn primary(&self) -> Result<&Arc<dyn UploadInterface>, UploadError> {
		self.implementations.get(&self.primary).ok_or_else(|| {
			UploadError::Configuration(format!("Upload backend '{}' not configured", self.primary))
		})
	}

	pub async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<String, UploadError> {
		if contents.is_empty() {
			return Err(UploadError::Io {
				path: file_name.to_string(),
				message: "file is empty".to_string(),
			});
		}
		let uri = self.primary()?.upload(file_name, contents).await?;
		tracing::info!(backend = %self.primary, file = file_name, uri = %uri, "Asset uploaded");
		Ok(uri)
	}

	/// Reads `path` and uploads it under its file name.
	pub async fn upload_file(&self, path: &Path) -> Result<String, UploadError> {
		let io_error = |e: std::io::Error| UploadError::Io {
			path: path.display().to_string(),
			message: e.to_string(),
		};
		let contents = tokio::fs::read(path).await.map_err(io_error)?;
		let file_name = path
			.file_name()
			.and_then(|name| name.to_str())
			.unwrap_or("upload");
		self.upload(file_name, contents).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use campaign_types::{Schema, SchemaError};
	use std::io::Write;
	use std::sync::Mutex;

	#[derive(Default)]
	struct RecordingUpload {
		seen: Mutex<Vec<(String, usize)>>,
	}

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	#[async_trait]
	impl UploadInterface for RecordingUpload {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<String, UploadError> {
			self.seen
				.lock()
				.unwrap()
				.push((file_name.to_string(), contents.len()));
			Ok(format!("https://gateway.test/ipfs/{}", file_name))
		}
	}

	fn service(backend: Arc<RecordingUpload>) -> UploadService {
		let mut implementations: HashMap<String, Arc<dyn UploadInterface>> = HashMap::new();
		implementations.insert("recording".to_string(), backend);
		UploadService::new(implementations, "recording".to_string())
	}

	#[tokio::test]
	async fn test_upload_file_uses_file_name() {
		let backend = Arc::new(RecordingUpload::default());
		let service = service(backend.clone());

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("banner.png");
		std::fs::File::create(&path)
			.unwrap()
			.write_all(b"\x89PNG")
			.unwrap();

		let uri = service.upload_file(&path).await.unwrap();
		assert_eq!(uri, "https://gateway.test/ipfs/banner.png");
		assert_eq!(
			backend.seen.lock().unwrap().as_slice(),
			&[("banner.png".to_string(), 4)]
		);
	}

	#[tokio::test]
	async fn test_empty_and_missing_files_fail_locally() {
		let backend = Arc::new(RecordingUpload::default());
		let service = service(backend.clone());

		assert!(matches!(
			service.upload("empty.png", vec![]).await,
			Err(UploadError::Io { .. })
		));
		assert!(matches!(
			service.upload_file(Path::new("/nonexistent/image.png")).await,
			Err(UploadError::Io { .. })
		));
		assert!(backend.seen.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_unknown_primary_is_configuration_error() {
		let service = UploadService::new(HashMap::new(), "pinata".to_string());
		assert!(matches!(
			service.upload("a.png", vec![1]).await,
			Err(UploadError::Configuration(_))
		));
	}
}
