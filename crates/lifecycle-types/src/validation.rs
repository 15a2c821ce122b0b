//! Schema checks for implementation-specific TOML tables.
//!
//! Each pluggable implementation (storage backend, notification transport)
//! receives an untyped `toml::Value` and describes the shape it expects with a
//! [`Schema`]. Failures name the full dotted path of the offending field.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path with the name of the enclosing table.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(field) => {
				ValidationError::MissingField(format!("{}.{}", parent, field))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	Array(Box<FieldType>),
	Table(Schema),
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Boolean => "boolean",
			FieldType::Array(_) => "array",
			FieldType::Table(_) => "table",
		}
	}

	fn check(&self, field: &str, value: &toml::Value) -> Result<(), ValidationError> {
		let mismatch = || ValidationError::TypeMismatch {
			field: field.to_string(),
			expected: self.name().to_string(),
			actual: value.type_str().to_string(),
		};

		match self {
			FieldType::String => value.as_str().map(|_| ()).ok_or_else(mismatch),
			FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
			FieldType::Integer { min, max } => {
				let int_val = value.as_integer().ok_or_else(mismatch)?;
				if let Some(min) = min.filter(|min| int_val < *min) {
					return Err(ValidationError::InvalidValue {
						field: field.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min),
					});
				}
				if let Some(max) = max.filter(|max| int_val > *max) {
					return Err(ValidationError::InvalidValue {
						field: field.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max),
					});
				}
				Ok(())
			},
			FieldType::Array(inner) => value
				.as_array()
				.ok_or_else(mismatch)?
				.iter()
				.enumerate()
				.try_for_each(|(i, item)| inner.check(&format!("{}[{}]", field, i), item)),
			FieldType::Table(schema) => {
				if !value.is_table() {
					return Err(mismatch());
				}
				schema.validate(value).map_err(|e| e.nested_in(field))
			},
		}
	}
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field with its expected type.
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

	/// Adds a custom check; the returned message becomes an `InvalidValue`.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		self.field_type.check(&self.name, value)?;
		match &self.validator {
			Some(validator) => validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// Required and optional fields of one TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a table against this schema. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
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

/// Implemented by every pluggable implementation to validate its own table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn webhook_schema() -> Schema {
		Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http") => Ok(()),
					_ => Err("url must be http(s)".to_string()),
				}
			})],
			vec![
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
				Field::new(
					"headers",
					FieldType::Table(Schema::new(vec![Field::new("x-api-key", FieldType::String)], vec![])),
				),
			],
		)
	}

	#[test]
	fn test_valid_table() {
		let config: toml::Value = toml::from_str(
			r#"
			url = "https://hooks.example.com/shipped"
			timeout_seconds = 5
			"#,
		)
		.unwrap();
		assert!(webhook_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required_field() {
		let config: toml::Value = toml::from_str("timeout_seconds = 5").unwrap();
		assert_eq!(
			webhook_schema().validate(&config),
			Err(ValidationError::MissingField("url".to_string()))
		);
	}

	#[test]
	fn test_bounds_and_custom_validator() {
		let config: toml::Value =
			toml::from_str("url = \"https://x\"\ntimeout_seconds = 0").unwrap();
		assert!(matches!(
			webhook_schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "timeout_seconds"
		));

		let config: toml::Value = toml::from_str("url = \"ftp://x\"").unwrap();
		assert!(matches!(
			webhook_schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "url"
		));
	}

	#[test]
	fn test_nested_error_carries_path() {
		let config: toml::Value =
			toml::from_str("url = \"https://x\"\n[headers]\nx-api-key = 5").unwrap();
		assert!(matches!(
			webhook_schema().validate(&config),
			Err(ValidationError::TypeMismatch { field, .. }) if field == "headers.x-api-key"
		));
	}
}
