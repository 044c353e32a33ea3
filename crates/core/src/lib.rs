//! sonde: Session and script bindings for a remote-process instrumentation engine
//!
//! This crate exposes an engine's sessions and scripts to a single-threaded
//! scripting host. Every engine call returns a [`Promise`] right away and is
//! settled on the scripting thread once the engine reports back.
//!
//! # Examples
//!
//! ```ignore
//! use sonde::{CreateScriptArgs, RuntimeConfig, ScriptThread, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let thread = ScriptThread::spawn(RuntimeConfig::from_env())?;
//!     let handle = engine.attach(pid)?;
//!
//!     let (detached, created) = thread
//!         .invoke(move |cx| {
//!             let session = Session::new(cx, &handle);
//!             let args = CreateScriptArgs::from_host(&argv)?;
//!             let created = session.create_script(cx, args.name.as_deref(), &args.source);
//!             Ok::<_, sonde::Error>((session.events().wait_for("detached"), created))
//!         })
//!         .await??;
//!
//!     let script = created.await?;
//!     thread.invoke(move |cx| script.load(cx)).await?.await?;
//!     detached.await?;
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod engine;
pub mod events;
pub mod script;
pub mod session;

pub use args::{CreateScriptArgs, EnableDebuggerArgs};
pub use engine::{NativeScript, NativeSession};
pub use events::{EventStream, EventWaiter, Events, SignalForwarder};
pub use script::Script;
pub use session::{DETACHED, Session};
// Re-export the runtime types hosts need alongside the bindings
pub use sonde_protocol::{ErrorPayload, HostValue, SignalEvent};
pub use sonde_runtime::{
	AsyncResult, Completion, Error, ErrorCode, NativeError, NativeHandle, NativeId, Promise,
	Result, RuntimeConfig, ScriptContext, ScriptThread, StrongRef, Wrapped,
};
