//! Pinata pinning backend.
//!
//! Files are posted as multipart form data to the pinning API with a bearer
//! JWT. The returned content hash is served through the configured dedicated
//! gateway as `https://{gateway}/ipfs/{hash}`.

use crate::{UploadError, UploadFactory, UploadInterface, UploadRegistry};
use async_trait::async_trait;
use campaign_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SchemaError, SecretString,
};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.pinata.cloud";

#[derive(Debug, Deserialize)]
struct PinResponse {
	#[serde(rename = "IpfsHash")]
	ipfs_hash: String,
}

pub struct PinataUpload {
	client: reqwest::Client,
	api_url: String,
	gateway: String,
	jwt: SecretString,
}

impl PinataUpload {
	pub fn new(
		api_url: &str,
		gateway: &str,
		jwt: SecretString,
		timeout: Duration,
	) -> Result<Self, UploadError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| UploadError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			api_url: api_url.trim_end_matches('/').to_string(),
			gateway: gateway
				.trim_start_matches("https://")
				.trim_end_matches('/')
				.to_string(),
			jwt,
		})
	}

	fn content_uri(&self, hash: &str) -> String {
		format!("https://{}/ipfs/{}", self.gateway, hash)
	}
}

#[async_trait]
impl UploadInterface for PinataUpload {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(PinataUploadSchema)
	}

	async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<String, UploadError> {
		let part = Part::bytes(contents).file_name(file_name.to_string());
		let form = Form::new().part("file", part);
		let url = format!("{}/pinning/pinFileToIPFS", self.api_url);

		let response = self
			.jwt
			.with_exposed(|jwt| self.client.post(&url).bearer_auth(jwt))
			.multipart(form)
			.send()
			.await
			.map_err(|e| UploadError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			tracing::warn!(status = status.as_u16(), "Pinning request rejected");
			return Err(UploadError::Rejected {
				status: status.as_u16(),
				message,
			});
		}

		let pinned: PinResponse = response
			.json()
			.await
			.map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
		if pinned.ipfs_hash.is_empty() {
			return Err(UploadError::InvalidResponse("empty IpfsHash".to_string()));
		}
		Ok(self.content_uri(&pinned.ipfs_hash))
	}
}

pub struct PinataUploadSchema;

impl PinataUploadSchema {
	pub fn validate_config(config: &toml::Value) -> Result<(), SchemaError> {
		Self.validate(config)
	}
}

impl ConfigSchema for PinataUploadSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let non_empty = |value: &toml::Value| match value.as_str() {
			Some(s) if !s.trim().is_empty() => Ok(()),
			_ => Err("must not be empty".to_string()),
		};
		let schema = Schema::new(
			vec![
				Field::new("jwt", FieldType::String).with_validator(non_empty),
				Field::new("gateway", FieldType::String).with_validator(non_empty),
			],
			vec![
				Field::new("api_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("api_url must be an http(s) URL".to_string()),
					}
				}),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Builds a Pinata backend from `[upload.implementations.pinata]`.
pub fn create_upload(config: &toml::Value) -> Result<Box<dyn UploadInterface>, UploadError> {
	PinataUploadSchema::validate_config(config)
		.map_err(|e| UploadError::Configuration(e.to_string()))?;

	let str_field = |name: &str| config.get(name).and_then(|v| v.as_str());
	let jwt = str_field("jwt")
		.map(SecretString::from)
		.ok_or_else(|| UploadError::Configuration("jwt is required".to_string()))?;
	let gateway = str_field("gateway")
		.ok_or_else(|| UploadError::Configuration("gateway is required".to_string()))?;
	let api_url = str_field("api_url").unwrap_or(DEFAULT_API_URL);
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|secs| Duration::from_secs(secs as u64))
		.unwrap_or(Duration::from_secs(60));

	Ok(Box::new(PinataUpload::new(api_url, gateway, jwt, timeout)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "pinata";
	type Factory = UploadFactory;

	fn factory() -> Self::Factory {
		create_upload
	}
}

impl UploadRegistry for Registry {}
