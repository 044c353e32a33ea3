//! OwnedWrapper - the managed side of one native object.
//!
//! A wrapper holds exactly one strong native reference for its whole lifetime
//! and releases it exactly once when dropped. Managed objects (sessions,
//! scripts) embed a wrapper and expose it through [`Wrapped`], which is what
//! the operation driver retains while a native call is in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::monitor::MonitorGuard;
use crate::native::{NativeHandle, NativeId, StrongRef};
use crate::object_store::{ManagedObject, ObjectStore};
use crate::script_thread::ScriptContext;

/// A managed object that owns a native handle through an [`OwnedWrapper`].
pub trait Wrapped: ManagedObject {
	type Handle: NativeHandle;

	fn wrapper(&self) -> &OwnedWrapper<Self::Handle>;
}

/// Owns one strong reference to a native object.
pub struct OwnedWrapper<H: NativeHandle> {
	handle: StrongRef<H>,
	id: NativeId,
	objects: Weak<ObjectStore>,
	pending: AtomicUsize,
	monitor: Mutex<Option<MonitorGuard>>,
}

impl<H: NativeHandle> OwnedWrapper<H> {
	/// Wraps `handle`, acquiring a new strong reference for the wrapper.
	pub fn new(cx: &ScriptContext, handle: &H) -> Self {
		Self::adopt(cx, StrongRef::retain(handle))
	}

	/// Wraps a reference the caller owns. The caller must not release it.
	pub fn adopt(cx: &ScriptContext, handle: StrongRef<H>) -> Self {
		let id = handle.native_id();
		tracing::debug!(kind = H::TYPE_NAME, %id, "Wrapping native object");
		Self {
			handle,
			id,
			objects: Arc::downgrade(cx.objects()),
			pending: AtomicUsize::new(0),
			monitor: Mutex::new(None),
		}
	}

	/// Borrows the native handle. Valid only while the wrapper is alive;
	/// callers must not keep it past their call.
	pub fn handle(&self) -> &H {
		self.handle.handle()
	}

	pub fn native_id(&self) -> NativeId {
		self.id
	}

	/// Number of in-flight operations currently retaining this wrapper.
	pub fn pending_operations(&self) -> usize {
		self.pending.load(Ordering::SeqCst)
	}

	/// Ties a liveness monitor to this wrapper; it is cancelled on drop.
	pub fn attach_monitor(&self, guard: MonitorGuard) {
		if let Some(previous) = self.monitor.lock().replace(guard) {
			tracing::debug!(id = %self.id, "Replacing liveness monitor");
			drop(previous);
		}
	}

	/// Returns true if an attached monitor has fired.
	pub fn monitor_fired(&self) -> bool {
		self.monitor
			.lock()
			.as_ref()
			.is_some_and(MonitorGuard::has_fired)
	}

	pub(crate) fn operation_started(&self) {
		self.pending.fetch_add(1, Ordering::SeqCst);
	}

	pub(crate) fn operation_settled(&self) {
		self.pending.fetch_sub(1, Ordering::SeqCst);
	}
}

impl<H: NativeHandle> Drop for OwnedWrapper<H> {
	fn drop(&mut self) {
		self.monitor.lock().take();
		self.handle.release();
		if let Some(objects) = self.objects.upgrade() {
			objects.remove_dead(self.id);
		}
		tracing::debug!(kind = H::TYPE_NAME, id = %self.id, "Released wrapper");
	}
}

/// Temporary strong reference held by an in-flight operation.
pub(crate) struct Retained<W: Wrapped> {
	target: Arc<W>,
}

impl<W: Wrapped> Retained<W> {
	pub(crate) fn new(target: &Arc<W>) -> Self {
		target.wrapper().operation_started();
		Self {
			target: Arc::clone(target),
		}
	}

	pub(crate) fn handle(&self) -> &W::Handle {
		self.target.wrapper().handle()
	}

	pub(crate) fn native_id(&self) -> NativeId {
		self.target.wrapper().native_id()
	}
}

impl<W: Wrapped> Drop for Retained<W> {
	fn drop(&mut self) {
		self.target.wrapper().operation_settled();
	}
}
