//! Sonde Runtime - async operation bridge for a single-threaded scripting host
//!
//! This crate lets any number of asynchronous calls into a native
//! instrumentation engine run concurrently while their results are delivered
//! to one scripting thread:
//!
//! - **Native model**: Reference-counted engine handles and their results
//! - **Wrappers**: Managed objects owning exactly one native reference
//! - **Operations**: begin / end / result hooks driven by one generic driver
//! - **Scheduler**: The thread hop from engine threads onto the scripting thread
//! - **Liveness monitors**: One-shot terminal-state notifications
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │    sonde    │  Session, Script, Events
//! └──────┬──────┘
//!        │ implements Operation / Wrapped
//! ┌──────▼───────────────────────────────┐
//! │  sonde-runtime        (this crate)   │
//! │  schedule ──► begin ──► engine       │
//! │                           │ any thread
//! │  settle ◄── end ◄── Scheduler::post  │
//! │      scripting thread                │
//! └──────────────────────────────────────┘
//! ```
//!
//! Everything that settles a promise or wraps a native object takes a
//! [`ScriptContext`], which only exists on the scripting thread.

pub mod config;
pub mod error;
pub mod monitor;
pub mod native;
pub mod object_store;
pub mod operation;
pub mod promise;
pub mod scheduler;
pub mod script_thread;
pub mod wrapper;

#[cfg(test)]
mod testing;

// Re-export key types at crate root
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use monitor::{EventSink, LivenessMonitor, MonitorGuard};
pub use native::{AsyncResult, ErrorCode, NativeError, NativeHandle, NativeId, StrongRef};
pub use object_store::{ManagedObject, ObjectStore};
pub use operation::{Completion, FnOperation, Operation, OperationId, OperationState, from_fns, schedule};
pub use promise::{Deferred, Promise};
pub use scheduler::{Job, Scheduler};
pub use script_thread::{ScriptContext, ScriptThread};
pub use wrapper::{OwnedWrapper, Wrapped};
