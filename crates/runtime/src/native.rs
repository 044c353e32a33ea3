//! The native object model consumed from the instrumentation engine.
//!
//! Engine objects are reference counted on the engine's side. The bridge never
//! touches those counts directly; it goes through [`NativeHandle::acquire`] and
//! [`NativeHandle::release`], which must be the engine's own thread-safe
//! primitives. Cloning a handle value copies the pointer and takes no reference.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Identity of a native object, stable for as long as the object is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub usize);

impl fmt::Display for NativeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}

/// A reference-counted engine object (session, script, ...).
pub trait NativeHandle: Clone + Send + Sync + 'static {
	/// Engine type name, for diagnostics.
	const TYPE_NAME: &'static str;

	fn native_id(&self) -> NativeId;

	/// Takes one strong reference.
	fn acquire(&self);

	/// Drops one strong reference. The handle must not be used by the caller
	/// afterwards unless it still owns another reference.
	fn release(&self);
}

/// Exactly one owned strong reference to a native object.
///
/// The reference is released once, on [`release`](Self::release) or on drop,
/// whichever comes first.
pub struct StrongRef<H: NativeHandle> {
	handle: H,
	released: bool,
}

impl<H: NativeHandle> StrongRef<H> {
	/// Acquires a new reference to `handle`.
	pub fn retain(handle: &H) -> Self {
		handle.acquire();
		tracing::trace!(kind = H::TYPE_NAME, id = %handle.native_id(), "acquired native reference");
		Self {
			handle: handle.clone(),
			released: false,
		}
	}

	/// Takes over a reference the engine already transferred to the caller.
	pub fn adopt(handle: H) -> Self {
		Self {
			handle,
			released: false,
		}
	}

	pub fn handle(&self) -> &H {
		&self.handle
	}

	pub fn native_id(&self) -> NativeId {
		self.handle.native_id()
	}

	pub fn is_released(&self) -> bool {
		self.released
	}

	/// Releases the reference now. Later calls and the eventual drop are no-ops.
	pub fn release(&mut self) {
		if std::mem::replace(&mut self.released, true) {
			return;
		}
		tracing::trace!(kind = H::TYPE_NAME, id = %self.handle.native_id(), "releasing native reference");
		self.handle.release();
	}
}

impl<H: NativeHandle> Drop for StrongRef<H> {
	fn drop(&mut self) {
		self.release();
	}
}

impl<H: NativeHandle> fmt::Debug for StrongRef<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StrongRef")
			.field("kind", &H::TYPE_NAME)
			.field("id", &self.handle.native_id())
			.field("released", &self.released)
			.finish()
	}
}

/// Opaque completion payload handed to an operation's completion callback,
/// later passed back to the matching `*_finish` call.
pub struct AsyncResult {
	payload: Box<dyn Any + Send>,
}

impl AsyncResult {
	pub fn new<T: Send + 'static>(payload: T) -> Self {
		Self {
			payload: Box::new(payload),
		}
	}

	/// Recovers the payload, or gives the result back if it holds another type.
	pub fn downcast<T: 'static>(self) -> std::result::Result<T, Self> {
		match self.payload.downcast::<T>() {
			Ok(value) => Ok(*value),
			Err(payload) => Err(Self { payload }),
		}
	}

	/// Recovers the payload, reporting a malformed result as
	/// [`Error::MissingResult`](crate::Error::MissingResult).
	pub fn take<T: 'static>(self) -> crate::Result<T> {
		self.downcast::<T>()
			.map_err(|_| crate::Error::MissingResult(std::any::type_name::<T>()))
	}
}

impl fmt::Debug for AsyncResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AsyncResult").finish_non_exhaustive()
	}
}

/// Error codes of the engine's error domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	ServerNotRunning,
	ExecutableNotFound,
	ExecutableNotSupported,
	ProcessNotFound,
	ProcessNotResponding,
	InvalidArgument,
	InvalidOperation,
	PermissionDenied,
	AddressInUse,
	TimedOut,
	NotSupported,
	Protocol,
	Transport,
	Unknown(i32),
}

impl ErrorCode {
	pub fn from_raw(code: i32) -> Self {
		match code {
			0 => Self::ServerNotRunning,
			1 => Self::ExecutableNotFound,
			2 => Self::ExecutableNotSupported,
			3 => Self::ProcessNotFound,
			4 => Self::ProcessNotResponding,
			5 => Self::InvalidArgument,
			6 => Self::InvalidOperation,
			7 => Self::PermissionDenied,
			8 => Self::AddressInUse,
			9 => Self::TimedOut,
			10 => Self::NotSupported,
			11 => Self::Protocol,
			12 => Self::Transport,
			other => Self::Unknown(other),
		}
	}

	pub fn as_raw(self) -> i32 {
		match self {
			Self::ServerNotRunning => 0,
			Self::ExecutableNotFound => 1,
			Self::ExecutableNotSupported => 2,
			Self::ProcessNotFound => 3,
			Self::ProcessNotResponding => 4,
			Self::InvalidArgument => 5,
			Self::InvalidOperation => 6,
			Self::PermissionDenied => 7,
			Self::AddressInUse => 8,
			Self::TimedOut => 9,
			Self::NotSupported => 10,
			Self::Protocol => 11,
			Self::Transport => 12,
			Self::Unknown(code) => code,
		}
	}

	/// Host-facing classification name.
	pub fn name(self) -> &'static str {
		match self {
			Self::ServerNotRunning => "ServerNotRunningError",
			Self::ExecutableNotFound => "ExecutableNotFoundError",
			Self::ExecutableNotSupported => "ExecutableNotSupportedError",
			Self::ProcessNotFound => "ProcessNotFoundError",
			Self::ProcessNotResponding => "ProcessNotRespondingError",
			Self::InvalidArgument => "InvalidArgumentError",
			Self::InvalidOperation => "InvalidOperationError",
			Self::PermissionDenied => "PermissionDeniedError",
			Self::AddressInUse => "AddressInUseError",
			Self::TimedOut => "TimedOutError",
			Self::NotSupported => "NotSupportedError",
			Self::Protocol => "ProtocolError",
			Self::Transport => "TransportError",
			Self::Unknown(_) => "Error",
		}
	}
}

/// An error reported by the engine for a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NativeError {
	pub code: ErrorCode,
	pub message: String,
}

impl NativeError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}
}
