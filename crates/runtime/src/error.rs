//! Error types for the sonde runtime.

use sonde_protocol::ErrorPayload;
use thiserror::Error;

use crate::native::{ErrorCode, NativeError};

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the bridge.
///
/// Argument errors are returned synchronously, before any native call is made.
/// Everything else arrives as the rejection of an operation's promise.
#[derive(Debug, Error)]
pub enum Error {
	/// Invalid argument provided by the host.
	#[error("Bad argument, {0}")]
	InvalidArgument(String),

	/// The engine reported a failure for a native call.
	#[error("{message}")]
	Native { code: ErrorCode, message: String },

	/// A native call completed without the result the operation expected.
	#[error("Missing result: expected {0}")]
	MissingResult(&'static str),

	/// The engine dropped an operation's completion without invoking it.
	#[error("Operation abandoned by the engine before completion")]
	Abandoned,

	/// A promise was dropped before anything settled it.
	#[error("Internal error: promise was dropped without being settled")]
	Unsettled,

	/// The scripting runtime is shut down.
	#[error("Scripting runtime is closed")]
	RuntimeClosed,

	/// Waiting for an event timed out.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// The source of an event stream or waiter was dropped.
	#[error("Event source closed")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl From<NativeError> for Error {
	fn from(err: NativeError) -> Self {
		Error::Native {
			code: err.code,
			message: err.message,
		}
	}
}

impl Error {
	/// Returns the native error code if the engine reported this error.
	pub fn code(&self) -> Option<ErrorCode> {
		match self {
			Error::Native { code, .. } => Some(*code),
			_ => None,
		}
	}

	pub fn is_native(&self) -> bool {
		matches!(self, Error::Native { .. })
	}

	/// Returns true if the native object went away underneath the call
	/// (e.g. the session detached).
	pub fn is_resource_invalidated(&self) -> bool {
		matches!(
			self,
			Error::Native {
				code: ErrorCode::InvalidOperation | ErrorCode::ProcessNotFound,
				..
			}
		)
	}

	/// Translates this error for presentation to the scripting host.
	pub fn to_payload(&self) -> ErrorPayload {
		match self {
			Error::InvalidArgument(_) => ErrorPayload::new("TypeError", self.to_string()),
			Error::Native { code, message } => {
				ErrorPayload::new(code.name(), message.clone()).with_code(code.as_raw())
			}
			_ => ErrorPayload::new("Error", self.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_native_error_translation() {
		let err: Error = NativeError::new(ErrorCode::InvalidArgument, "invalid source").into();
		assert_eq!(err.to_string(), "invalid source");
		assert_eq!(err.code(), Some(ErrorCode::InvalidArgument));

		let payload = err.to_payload();
		assert_eq!(payload.name, "InvalidArgumentError");
		assert_eq!(payload.message, "invalid source");
		assert_eq!(payload.code, Some(5));
	}

	#[test]
	fn test_argument_error_is_type_error() {
		let err = Error::InvalidArgument("expected port number".into());
		assert_eq!(err.to_string(), "Bad argument, expected port number");
		assert_eq!(err.to_payload().name, "TypeError");
		assert!(err.to_payload().code.is_none());
	}

	#[test]
	fn test_detached_session_is_resource_invalidated() {
		let err: Error = NativeError::new(ErrorCode::InvalidOperation, "session is detached").into();
		assert!(err.is_resource_invalidated());
		assert!(!Error::Abandoned.is_resource_invalidated());
	}
}
