//! Argument values passed by the scripting host.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// A single argument as received from the scripting host.
///
/// Binary payloads travel as base64 on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum HostValue {
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl HostValue {
	/// Returns the contained string, if this is a string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			HostValue::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the contained number, if this is a number.
	pub fn as_number(&self) -> Option<f64> {
		match self {
			HostValue::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			HostValue::Bytes(b) => Some(b),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, HostValue::Null)
	}

	pub fn is_nullish(&self) -> bool {
		matches!(self, HostValue::Null | HostValue::Undefined)
	}

	/// Host-facing type name used in argument error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			HostValue::Undefined => "undefined",
			HostValue::Null => "null",
			HostValue::Bool(_) => "boolean",
			HostValue::Number(_) => "number",
			HostValue::String(_) => "string",
			HostValue::Bytes(_) => "buffer",
		}
	}
}

impl From<&str> for HostValue {
	fn from(value: &str) -> Self {
		HostValue::String(value.to_string())
	}
}

impl From<String> for HostValue {
	fn from(value: String) -> Self {
		HostValue::String(value)
	}
}

impl From<f64> for HostValue {
	fn from(value: f64) -> Self {
		HostValue::Number(value)
	}
}

impl From<bool> for HostValue {
	fn from(value: bool) -> Self {
		HostValue::Bool(value)
	}
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(HostValue::Null)
	}
}

mod base64_bytes {
	use super::Engine;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		base64::engine::general_purpose::STANDARD
			.decode(encoded)
			.map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bytes_travel_as_base64() {
		let value = HostValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
		let json = serde_json::to_value(&value).unwrap();
		assert_eq!(json["type"], "bytes");
		assert_eq!(json["value"], "3q2+7w==");
	}

	#[test]
	fn test_wire_shape_parses() {
		let json = r#"[{"type": "null"}, {"type": "string", "value": "send('hi');"}]"#;
		let args: Vec<HostValue> = serde_json::from_str(json).unwrap();
		assert!(args[0].is_null());
		assert_eq!(args[1].as_str(), Some("send('hi');"));
	}

	#[test]
	fn test_option_maps_to_null() {
		assert_eq!(HostValue::from(None::<&str>), HostValue::Null);
		assert_eq!(HostValue::from(Some("x")), HostValue::String("x".into()));
	}

	#[test]
	fn test_type_names() {
		assert_eq!(HostValue::Undefined.type_name(), "undefined");
		assert_eq!(HostValue::Number(1.0).type_name(), "number");
		assert!(HostValue::Undefined.is_nullish());
	}
}
