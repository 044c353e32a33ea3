//! Rejection payloads presented to the scripting host.

use serde::{Deserialize, Serialize};

/// A failed operation, translated for the host.
///
/// `name` classifies the failure (e.g. `"InvalidOperation"`, `"TypeError"`),
/// `code` carries the native error code when the engine reported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub name: String,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<i32>,
}

impl ErrorPayload {
	pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			message: message.into(),
			code: None,
		}
	}

	pub fn with_code(mut self, code: i32) -> Self {
		self.code = Some(code);
		self
	}
}

impl std::fmt::Display for ErrorPayload {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.name, self.message)
	}
}
