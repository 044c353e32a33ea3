//! Call shapes consumed from the instrumentation engine.
//!
//! Each asynchronous engine call is split the way the engine exposes it: a
//! `begin` method that takes a [`Completion`] and returns immediately, and a
//! matching `*_finish` method that decodes the [`AsyncResult`] later handed to
//! that completion. The completion may be invoked from any engine thread.
//!
//! Implementations wrap the engine's own objects; handle values are plain
//! pointers and carry no reference of their own (see [`NativeHandle`]).

use sonde_runtime::{AsyncResult, Completion, NativeError, NativeHandle, StrongRef};

use crate::events::SignalForwarder;

/// An attached session with a target process.
pub trait NativeSession: NativeHandle {
	type Script: NativeScript;

	fn pid(&self) -> u32;

	/// Whether the session has reached its terminal detached state.
	///
	/// An error means the engine no longer recognizes the session.
	fn is_detached(&self) -> Result<bool, NativeError>;

	/// Routes the session's engine signals into `forwarder`.
	fn connect_signals(&self, forwarder: SignalForwarder) {
		let _ = forwarder;
	}

	fn detach(&self, completion: Completion);
	fn detach_finish(&self, result: AsyncResult) -> Result<(), NativeError>;

	fn create_script(&self, name: Option<&str>, source: &str, completion: Completion);

	/// Transfers one strong reference to the new script to the caller.
	///
	/// `Ok(None)` means the engine completed without producing a script.
	fn create_script_finish(
		&self,
		result: AsyncResult,
	) -> Result<Option<StrongRef<Self::Script>>, NativeError>;

	fn enable_debugger(&self, port: u16, completion: Completion);
	fn enable_debugger_finish(&self, result: AsyncResult) -> Result<(), NativeError>;

	fn disable_debugger(&self, completion: Completion);
	fn disable_debugger_finish(&self, result: AsyncResult) -> Result<(), NativeError>;
}

/// A script created inside a session.
pub trait NativeScript: NativeHandle {
	fn name(&self) -> String;

	/// Routes the script's engine signals (e.g. `"message"`) into `forwarder`.
	fn connect_signals(&self, forwarder: SignalForwarder) {
		let _ = forwarder;
	}

	fn load(&self, completion: Completion);
	fn load_finish(&self, result: AsyncResult) -> Result<(), NativeError>;

	fn unload(&self, completion: Completion);
	fn unload_finish(&self, result: AsyncResult) -> Result<(), NativeError>;

	/// Posts a message to the script. Synchronous on the engine side.
	fn post_message(&self, message: &str) -> Result<(), NativeError>;
}
