//! Host-boundary types for sonde.
//!
//! This crate contains the serde-serializable shapes that cross between the
//! scripting host and the session layer:
//!
//! - [`HostValue`] - call arguments as the host hands them over
//! - [`ErrorPayload`] - a rejected operation, translated for the host
//! - [`SignalEvent`] - a named notification delivered to the host
//!
//! Types in this crate are pure data. Validation and behavior live in
//! `sonde-runtime` and `sonde`.

pub mod error;
pub mod event;
pub mod value;

pub use error::*;
pub use event::*;
pub use value::*;
