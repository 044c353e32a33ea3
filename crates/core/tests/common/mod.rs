// In-memory instrumentation engine for integration tests.
//
// Every asynchronous call completes on a freshly spawned engine thread, the
// way a real engine reports back from its own worker threads. A session can
// be paused so completions are held until the test resumes it.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sonde::events::SignalForwarder;
use sonde::{
	AsyncResult, Completion, ErrorCode, NativeError, NativeHandle, NativeId, NativeScript,
	NativeSession, RuntimeConfig, ScriptThread, SignalEvent, StrongRef,
};

pub fn spawn_runtime() -> ScriptThread {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();

	let config = RuntimeConfig::new()
		.thread_name("sonde-it")
		.monitor_interval(Duration::from_millis(5));
	ScriptThread::spawn(config).expect("failed to start scripting thread")
}

/// Reference counts of one fake native object.
///
/// Objects start with one reference, owned by whoever received them from
/// the engine.
pub struct Refs {
	count: AtomicIsize,
	acquires: AtomicUsize,
	releases: AtomicUsize,
}

impl Refs {
	fn new() -> Self {
		Self {
			count: AtomicIsize::new(1),
			acquires: AtomicUsize::new(0),
			releases: AtomicUsize::new(0),
		}
	}

	fn acquire(&self) {
		self.count.fetch_add(1, Ordering::SeqCst);
		self.acquires.fetch_add(1, Ordering::SeqCst);
	}

	fn release(&self) {
		let previous = self.count.fetch_sub(1, Ordering::SeqCst);
		assert!(previous > 0, "reference released twice");
		self.releases.fetch_add(1, Ordering::SeqCst);
	}

	pub fn count(&self) -> isize {
		self.count.load(Ordering::SeqCst)
	}

	pub fn acquires(&self) -> usize {
		self.acquires.load(Ordering::SeqCst)
	}

	pub fn releases(&self) -> usize {
		self.releases.load(Ordering::SeqCst)
	}
}

type Held = Box<dyn FnOnce() + Send>;

fn malformed() -> NativeError {
	NativeError::new(ErrorCode::Protocol, "unexpected completion payload")
}

#[derive(Default)]
enum CreateOutcome {
	#[default]
	Script,
	Nothing,
	Fail(NativeError),
}

struct SessionState {
	refs: Refs,
	pid: u32,
	detached: AtomicBool,
	invalidated: AtomicBool,
	detach_error: Mutex<Option<NativeError>>,
	create_outcome: Mutex<CreateOutcome>,
	create_calls: AtomicUsize,
	scripts: Mutex<Vec<FakeScript>>,
	ports: Mutex<Vec<u16>>,
	debugger_disabled: AtomicUsize,
	forwarder: Mutex<Option<SignalForwarder>>,
	paused: AtomicBool,
	held: Mutex<Vec<Held>>,
}

#[derive(Clone)]
pub struct FakeSession {
	state: Arc<SessionState>,
}

impl FakeSession {
	pub fn attach(pid: u32) -> Self {
		Self {
			state: Arc::new(SessionState {
				refs: Refs::new(),
				pid,
				detached: AtomicBool::new(false),
				invalidated: AtomicBool::new(false),
				detach_error: Mutex::new(None),
				create_outcome: Mutex::new(CreateOutcome::default()),
				create_calls: AtomicUsize::new(0),
				scripts: Mutex::new(Vec::new()),
				ports: Mutex::new(Vec::new()),
				debugger_disabled: AtomicUsize::new(0),
				forwarder: Mutex::new(None),
				paused: AtomicBool::new(false),
				held: Mutex::new(Vec::new()),
			}),
		}
	}

	pub fn refs(&self) -> &Refs {
		&self.state.refs
	}

	/// Holds completions until [`resume`](Self::resume).
	pub fn pause(&self) {
		self.state.paused.store(true, Ordering::SeqCst);
	}

	/// Runs every held completion, newest first, on one engine thread.
	pub fn resume(&self) {
		self.state.paused.store(false, Ordering::SeqCst);
		let held: Vec<Held> = self.state.held.lock().drain(..).collect();
		std::thread::spawn(move || {
			for work in held.into_iter().rev() {
				work();
			}
		});
	}

	pub fn held(&self) -> usize {
		self.state.held.lock().len()
	}

	/// Makes the engine forget the session; observing it fails from now on.
	pub fn invalidate(&self) {
		self.state.invalidated.store(true, Ordering::SeqCst);
	}

	pub fn fail_detach(&self, code: ErrorCode, message: &str) {
		*self.state.detach_error.lock() = Some(NativeError::new(code, message));
	}

	pub fn fail_create_script(&self, code: ErrorCode, message: &str) {
		*self.state.create_outcome.lock() = CreateOutcome::Fail(NativeError::new(code, message));
	}

	pub fn create_script_yields_nothing(&self) {
		*self.state.create_outcome.lock() = CreateOutcome::Nothing;
	}

	pub fn create_calls(&self) -> usize {
		self.state.create_calls.load(Ordering::SeqCst)
	}

	pub fn scripts(&self) -> Vec<FakeScript> {
		self.state.scripts.lock().clone()
	}

	pub fn debugger_ports(&self) -> Vec<u16> {
		self.state.ports.lock().clone()
	}

	pub fn debugger_disabled(&self) -> usize {
		self.state.debugger_disabled.load(Ordering::SeqCst)
	}

	/// Raises an engine signal from an engine thread.
	pub fn raise(&self, event: SignalEvent) {
		let forwarder = self.state.forwarder.lock().clone();
		std::thread::spawn(move || {
			if let Some(forwarder) = forwarder {
				forwarder.forward(event);
			}
		})
		.join()
		.expect("signal thread panicked");
	}

	fn dispatch(&self, work: impl FnOnce() + Send + 'static) {
		if self.state.paused.load(Ordering::SeqCst) {
			self.state.held.lock().push(Box::new(work));
			return;
		}
		std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(2));
			work();
		});
	}
}

impl NativeHandle for FakeSession {
	const TYPE_NAME: &'static str = "FakeSession";

	fn native_id(&self) -> NativeId {
		NativeId(Arc::as_ptr(&self.state) as usize)
	}

	fn acquire(&self) {
		self.state.refs.acquire();
	}

	fn release(&self) {
		self.state.refs.release();
	}
}

impl NativeSession for FakeSession {
	type Script = FakeScript;

	fn pid(&self) -> u32 {
		self.state.pid
	}

	fn is_detached(&self) -> Result<bool, NativeError> {
		if self.state.invalidated.load(Ordering::SeqCst) {
			return Err(NativeError::new(ErrorCode::InvalidOperation, "Session is gone"));
		}
		Ok(self.state.detached.load(Ordering::SeqCst))
	}

	fn connect_signals(&self, forwarder: SignalForwarder) {
		*self.state.forwarder.lock() = Some(forwarder);
	}

	fn detach(&self, completion: Completion) {
		let state = Arc::clone(&self.state);
		self.dispatch(move || {
			let outcome = match state.detach_error.lock().clone() {
				Some(err) => Err(err),
				None => {
					state.detached.store(true, Ordering::SeqCst);
					Ok(())
				}
			};
			completion.complete(AsyncResult::new(outcome));
		});
	}

	fn detach_finish(&self, result: AsyncResult) -> Result<(), NativeError> {
		result
			.downcast::<Result<(), NativeError>>()
			.map_err(|_| malformed())?
	}

	fn create_script(&self, name: Option<&str>, source: &str, completion: Completion) {
		self.state.create_calls.fetch_add(1, Ordering::SeqCst);
		let state = Arc::clone(&self.state);
		let name = name.unwrap_or("script").to_string();
		let source = source.to_string();
		self.dispatch(move || {
			let outcome: Result<Option<FakeScript>, NativeError> = match &*state.create_outcome.lock() {
				CreateOutcome::Script => {
					let script = FakeScript::new(name, source);
					state.scripts.lock().push(script.clone());
					Ok(Some(script))
				}
				CreateOutcome::Nothing => Ok(None),
				CreateOutcome::Fail(err) => Err(err.clone()),
			};
			completion.complete(AsyncResult::new(outcome));
		});
	}

	fn create_script_finish(
		&self,
		result: AsyncResult,
	) -> Result<Option<StrongRef<FakeScript>>, NativeError> {
		let created = result
			.downcast::<Result<Option<FakeScript>, NativeError>>()
			.map_err(|_| malformed())??;
		Ok(created.map(StrongRef::adopt))
	}

	fn enable_debugger(&self, port: u16, completion: Completion) {
		let state = Arc::clone(&self.state);
		self.dispatch(move || {
			state.ports.lock().push(port);
			completion.complete(AsyncResult::new(Ok::<(), NativeError>(())));
		});
	}

	fn enable_debugger_finish(&self, result: AsyncResult) -> Result<(), NativeError> {
		result
			.downcast::<Result<(), NativeError>>()
			.map_err(|_| malformed())?
	}

	fn disable_debugger(&self, completion: Completion) {
		let state = Arc::clone(&self.state);
		self.dispatch(move || {
			state.debugger_disabled.fetch_add(1, Ordering::SeqCst);
			completion.complete(AsyncResult::new(Ok::<(), NativeError>(())));
		});
	}

	fn disable_debugger_finish(&self, result: AsyncResult) -> Result<(), NativeError> {
		result
			.downcast::<Result<(), NativeError>>()
			.map_err(|_| malformed())?
	}
}

struct ScriptState {
	refs: Refs,
	name: String,
	source: String,
	loaded: AtomicBool,
	messages: Mutex<Vec<String>>,
	forwarder: Mutex<Option<SignalForwarder>>,
}

#[derive(Clone)]
pub struct FakeScript {
	state: Arc<ScriptState>,
}

impl FakeScript {
	fn new(name: String, source: String) -> Self {
		Self {
			state: Arc::new(ScriptState {
				refs: Refs::new(),
				name,
				source,
				loaded: AtomicBool::new(false),
				messages: Mutex::new(Vec::new()),
				forwarder: Mutex::new(None),
			}),
		}
	}

	pub fn refs(&self) -> &Refs {
		&self.state.refs
	}

	pub fn source(&self) -> &str {
		&self.state.source
	}

	pub fn is_loaded(&self) -> bool {
		self.state.loaded.load(Ordering::SeqCst)
	}

	pub fn messages(&self) -> Vec<String> {
		self.state.messages.lock().clone()
	}

	fn set_loaded(&self, loaded: bool, completion: Completion) {
		let state = Arc::clone(&self.state);
		std::thread::spawn(move || {
			let was = state.loaded.swap(loaded, Ordering::SeqCst);
			let outcome = if was == loaded {
				Err(NativeError::new(
					ErrorCode::InvalidOperation,
					if loaded { "Script is already loaded" } else { "Script is not loaded" },
				))
			} else {
				Ok(())
			};
			completion.complete(AsyncResult::new(outcome));
		});
	}
}

impl NativeHandle for FakeScript {
	const TYPE_NAME: &'static str = "FakeScript";

	fn native_id(&self) -> NativeId {
		NativeId(Arc::as_ptr(&self.state) as usize)
	}

	fn acquire(&self) {
		self.state.refs.acquire();
	}

	fn release(&self) {
		self.state.refs.release();
	}
}

impl NativeScript for FakeScript {
	fn name(&self) -> String {
		self.state.name.clone()
	}

	fn connect_signals(&self, forwarder: SignalForwarder) {
		*self.state.forwarder.lock() = Some(forwarder);
	}

	fn load(&self, completion: Completion) {
		self.set_loaded(true, completion);
	}

	fn load_finish(&self, result: AsyncResult) -> Result<(), NativeError> {
		result
			.downcast::<Result<(), NativeError>>()
			.map_err(|_| malformed())?
	}

	fn unload(&self, completion: Completion) {
		self.set_loaded(false, completion);
	}

	fn unload_finish(&self, result: AsyncResult) -> Result<(), NativeError> {
		result
			.downcast::<Result<(), NativeError>>()
			.map_err(|_| malformed())?
	}

	/// Records the message and echoes it back as a `"message"` signal.
	fn post_message(&self, message: &str) -> Result<(), NativeError> {
		if !self.is_loaded() {
			return Err(NativeError::new(ErrorCode::InvalidOperation, "Script is not loaded"));
		}
		self.state.messages.lock().push(message.to_string());

		let forwarder = self.state.forwarder.lock().clone();
		let event = SignalEvent::new("message", serde_json::json!({ "payload": message }));
		std::thread::spawn(move || {
			if let Some(forwarder) = forwarder {
				forwarder.forward(event);
			}
		});
		Ok(())
	}
}
