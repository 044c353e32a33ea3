//! Configuration for the scripting thread.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default poll interval for liveness monitors, in milliseconds.
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 50;

/// Default broadcast capacity for event sinks.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

const ENV_THREAD_NAME: &str = "SONDE_THREAD_NAME";
const ENV_MONITOR_INTERVAL_MS: &str = "SONDE_MONITOR_INTERVAL_MS";

/// Settings for a [`ScriptThread`](crate::ScriptThread).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
	/// OS thread name of the scripting thread
	pub thread_name: String,

	/// How often liveness monitors re-check their predicate
	pub monitor_interval_ms: u64,

	/// Buffered events per subscriber before it starts lagging
	pub event_capacity: usize,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			thread_name: "sonde-script".to_string(),
			monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
			event_capacity: DEFAULT_EVENT_CAPACITY,
		}
	}
}

impl RuntimeConfig {
	/// Creates new default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Default settings with `SONDE_THREAD_NAME` and
	/// `SONDE_MONITOR_INTERVAL_MS` applied when set.
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Ok(name) = std::env::var(ENV_THREAD_NAME) {
			if !name.is_empty() {
				config.thread_name = name;
			}
		}
		if let Ok(raw) = std::env::var(ENV_MONITOR_INTERVAL_MS) {
			match raw.parse::<u64>() {
				Ok(ms) if ms > 0 => config.monitor_interval_ms = ms,
				_ => tracing::warn!(value = %raw, "ignoring invalid {ENV_MONITOR_INTERVAL_MS}"),
			}
		}
		config
	}

	/// Sets the scripting thread name.
	pub fn thread_name(mut self, name: impl Into<String>) -> Self {
		self.thread_name = name.into();
		self
	}

	/// Sets the monitor poll interval.
	pub fn monitor_interval(mut self, interval: Duration) -> Self {
		self.monitor_interval_ms = interval.as_millis().max(1) as u64;
		self
	}

	/// Sets the event broadcast capacity.
	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.event_capacity = capacity.max(1);
		self
	}

	pub fn monitor_interval_duration(&self) -> Duration {
		Duration::from_millis(self.monitor_interval_ms.max(1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = RuntimeConfig::new();
		assert_eq!(config.thread_name, "sonde-script");
		assert_eq!(config.monitor_interval_duration(), Duration::from_millis(50));
		assert_eq!(config.event_capacity, 256);
	}

	#[test]
	fn test_partial_config_fills_defaults() {
		let config: RuntimeConfig = serde_json::from_str(r#"{"monitorIntervalMs": 5}"#).unwrap();
		assert_eq!(config.monitor_interval_ms, 5);
		assert_eq!(config.thread_name, "sonde-script");
	}

	#[test]
	fn test_builder_clamps_zero() {
		let config = RuntimeConfig::new()
			.monitor_interval(Duration::ZERO)
			.event_capacity(0);
		assert_eq!(config.monitor_interval_ms, 1);
		assert_eq!(config.event_capacity, 1);
	}
}
