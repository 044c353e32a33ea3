//! Shared fixtures for the runtime's unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::native::{NativeHandle, NativeId};
use crate::object_store::ManagedObject;
use crate::script_thread::ScriptContext;
use crate::wrapper::{OwnedWrapper, Wrapped};

pub(crate) fn test_config() -> RuntimeConfig {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();

	RuntimeConfig::new()
		.thread_name("sonde-test")
		.monitor_interval(Duration::from_millis(5))
}

#[derive(Default)]
struct Counters {
	refcount: AtomicIsize,
	acquires: AtomicUsize,
	releases: AtomicUsize,
	terminal: AtomicBool,
}

/// In-memory native object that only counts references.
#[derive(Clone, Default)]
pub(crate) struct TestHandle {
	counters: Arc<Counters>,
}

impl TestHandle {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn refcount(&self) -> isize {
		self.counters.refcount.load(Ordering::SeqCst)
	}

	pub(crate) fn acquires(&self) -> usize {
		self.counters.acquires.load(Ordering::SeqCst)
	}

	pub(crate) fn releases(&self) -> usize {
		self.counters.releases.load(Ordering::SeqCst)
	}

	pub(crate) fn set_terminal(&self) {
		self.counters.terminal.store(true, Ordering::SeqCst);
	}

	pub(crate) fn is_terminal(&self) -> bool {
		self.counters.terminal.load(Ordering::SeqCst)
	}
}

impl NativeHandle for TestHandle {
	const TYPE_NAME: &'static str = "TestHandle";

	fn native_id(&self) -> NativeId {
		NativeId(Arc::as_ptr(&self.counters) as usize)
	}

	fn acquire(&self) {
		self.counters.refcount.fetch_add(1, Ordering::SeqCst);
		self.counters.acquires.fetch_add(1, Ordering::SeqCst);
	}

	fn release(&self) {
		let previous = self.counters.refcount.fetch_sub(1, Ordering::SeqCst);
		assert!(previous > 0, "released a handle with no references");
		self.counters.releases.fetch_add(1, Ordering::SeqCst);
	}
}

pub(crate) struct TestObject {
	wrapper: OwnedWrapper<TestHandle>,
}

impl TestObject {
	pub(crate) fn wrap(cx: &ScriptContext, handle: &TestHandle) -> Arc<Self> {
		cx.objects().get_or_insert_with(handle.native_id(), || {
			Arc::new(Self {
				wrapper: OwnedWrapper::new(cx, handle),
			})
		})
	}
}

impl ManagedObject for TestObject {
	fn native_id(&self) -> NativeId {
		self.wrapper.native_id()
	}

	fn type_name(&self) -> &'static str {
		"TestObject"
	}
}

impl Wrapped for TestObject {
	type Handle = TestHandle;

	fn wrapper(&self) -> &OwnedWrapper<TestHandle> {
		&self.wrapper
	}
}
