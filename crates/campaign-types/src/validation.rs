//! Schema checks for implementation-specific configuration tables.
//!
//! Pluggable implementations (wallet providers, uploaders) receive their
//! configuration as raw TOML. Each one declares a [`Schema`] so malformed
//! tables are rejected before the implementation is constructed.

use thiserror::Error;

/// Errors raised while checking a configuration table.
#[derive(Debug, Error)]
pub enum SchemaError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

/// Accepted shape of a field.
#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	Array(Box<FieldType>),
}

/// Extra check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), SchemaError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| SchemaError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Checks presence and type of every declared field.
	pub fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let table = config.as_table().ok_or_else(|| SchemaError::TypeMismatch {
			field: "root".to_string(),
			expected: "table",
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| SchemaError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn check_type(name: &str, value: &toml::Value, expected: &FieldType) -> Result<(), SchemaError> {
	let mismatch = |expected: &'static str| SchemaError::TypeMismatch {
		field: name.to_string(),
		expected,
		actual: value.type_str().to_string(),
	};

	match expected {
		FieldType::String if !value.is_str() => Err(mismatch("string")),
		FieldType::Boolean if !value.is_bool() => Err(mismatch("boolean")),
		FieldType::Integer { min, max } => {
			let int_val = value.as_integer().ok_or_else(|| mismatch("integer"))?;
			if min.is_some_and(|min| int_val < min) || max.is_some_and(|max| int_val > max) {
				return Err(SchemaError::InvalidValue {
					field: name.to_string(),
					message: format!("Value {} is out of range", int_val),
				});
			}
			Ok(())
		},
		FieldType::Array(inner) => {
			let items = value.as_array().ok_or_else(|| mismatch("array"))?;
			for (i, item) in items.iter().enumerate() {
				check_type(&format!("{}[{}]", name, i), item, inner)?;
			}
			Ok(())
		},
		_ => Ok(()),
	}
}

/// Implemented by every pluggable implementation's configuration schema.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("rpc_url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http") => Ok(()),
					_ => Err("rpc_url must be an http(s) URL".to_string()),
				}
			})],
			vec![Field::new(
				"poll_interval_ms",
				FieldType::Integer {
					min: Some(100),
					max: None,
				},
			)],
		)
	}

	#[test]
	fn test_valid_table() {
		let config: toml::Value = toml::from_str(
			r#"
rpc_url = "http://localhost:8545"
poll_interval_ms = 500
"#,
		)
		.unwrap();
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_and_mistyped_fields() {
		let missing: toml::Value = toml::from_str("poll_interval_ms = 500").unwrap();
		assert!(matches!(
			schema().validate(&missing),
			Err(SchemaError::MissingField(f)) if f == "rpc_url"
		));

		let mistyped: toml::Value = toml::from_str("rpc_url = 5").unwrap();
		assert!(matches!(
			schema().validate(&mistyped),
			Err(SchemaError::TypeMismatch { .. })
		));
	}

	#[test]
	fn test_custom_validator_and_bounds() {
		let bad_url: toml::Value = toml::from_str(r#"rpc_url = "ftp://x""#).unwrap();
		assert!(matches!(
			schema().validate(&bad_url),
			Err(SchemaError::InvalidValue { .. })
		));

		let too_fast: toml::Value = toml::from_str(
			r#"
rpc_url = "http://localhost:8545"
poll_interval_ms = 10
"#,
		)
		.unwrap();
		assert!(schema().validate(&too_fast).is_err());
	}
}
