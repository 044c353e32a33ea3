//! Named notifications delivered to the scripting host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named signal, either forwarded from the engine or raised by a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
	/// Signal name (e.g. `"detached"`, `"message"`)
	pub name: String,
	/// Signal arguments; `Null` when the signal carries none
	#[serde(default)]
	pub params: Value,
}

impl SignalEvent {
	pub fn new(name: impl Into<String>, params: Value) -> Self {
		Self {
			name: name.into(),
			params,
		}
	}

	/// A signal with no arguments.
	pub fn bare(name: impl Into<String>) -> Self {
		Self::new(name, Value::Null)
	}
}
