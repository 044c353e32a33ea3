//! Host argument validation for session calls.
//!
//! Arguments are checked synchronously, before any native call is issued; a
//! bad argument never produces a promise.

use sonde_protocol::HostValue;
use sonde_runtime::{Error, Result};

/// Arguments of `createScript(name: string | null, source: string)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateScriptArgs {
	pub name: Option<String>,
	pub source: String,
}

impl CreateScriptArgs {
	pub fn from_host(args: &[HostValue]) -> Result<Self> {
		let bad = || Error::InvalidArgument("expected string|null and string".into());

		let [name, source, ..] = args else {
			return Err(bad());
		};
		let name = match name {
			HostValue::String(name) => Some(name.clone()),
			HostValue::Null => None,
			_ => return Err(bad()),
		};
		let source = source.as_str().ok_or_else(bad)?.to_string();

		Ok(Self { name, source })
	}
}

/// Arguments of `enableDebugger(port: number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableDebuggerArgs {
	pub port: u16,
}

impl EnableDebuggerArgs {
	/// The port is truncated toward zero and wrapped into the 16-bit range.
	pub fn from_host(args: &[HostValue]) -> Result<Self> {
		let port = args
			.first()
			.and_then(HostValue::as_number)
			.ok_or_else(|| Error::InvalidArgument("expected port number".into()))?;

		Ok(Self {
			port: port.trunc() as i64 as u16,
		})
	}
}
