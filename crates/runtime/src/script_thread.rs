//! The single scripting thread and its context token.
//!
//! [`ScriptThread::spawn`] starts a dedicated OS thread running a
//! current-thread tokio runtime inside a [`LocalSet`]. The thread dequeues
//! work posted through its [`Scheduler`] and runs each job with the thread's
//! [`ScriptContext`]. Local tasks (liveness monitors) make progress between
//! jobs.
//!
//! [`ScriptContext`] is `!Send`: holding one proves the code runs on the
//! scripting thread. Everything that settles a promise or creates a managed
//! object takes `&mut ScriptContext`.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::native::AsyncResult;
use crate::object_store::ObjectStore;
use crate::operation::{Finisher, OperationId};
use crate::promise::{self, Deferred, Promise};
use crate::scheduler::{Envelope, Scheduler};

/// Scripting-thread state, handed to every job.
pub struct ScriptContext {
	scheduler: Scheduler,
	objects: Arc<ObjectStore>,
	config: Arc<RuntimeConfig>,
	operations: HashMap<OperationId, Finisher>,
	last_operation: OperationId,
	thread: ThreadId,
	_not_send: PhantomData<*const ()>,
}

impl ScriptContext {
	fn new(scheduler: Scheduler, objects: Arc<ObjectStore>, config: Arc<RuntimeConfig>) -> Self {
		Self {
			scheduler,
			objects,
			config,
			operations: HashMap::new(),
			last_operation: 0,
			thread: std::thread::current().id(),
			_not_send: PhantomData,
		}
	}

	pub fn scheduler(&self) -> &Scheduler {
		&self.scheduler
	}

	pub fn objects(&self) -> &Arc<ObjectStore> {
		&self.objects
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.config
	}

	pub fn thread_id(&self) -> ThreadId {
		self.thread
	}

	/// Creates an unsettled promise and its settling half.
	pub fn promise<T: Send + 'static>(&self) -> (Deferred<T>, Promise<T>) {
		promise::pending(self.scheduler.clone())
	}

	/// Spawns a task onto the scripting thread's local set.
	pub fn spawn_local<F>(&self, future: F) -> tokio::task::JoinHandle<()>
	where
		F: Future<Output = ()> + 'static,
	{
		tokio::task::spawn_local(future)
	}

	/// Number of operations begun and not yet settled.
	pub fn in_flight(&self) -> usize {
		self.operations.len()
	}

	pub(crate) fn next_operation_id(&mut self) -> OperationId {
		self.last_operation += 1;
		self.last_operation
	}

	pub(crate) fn register_operation(&mut self, id: OperationId, finisher: Finisher) {
		let previous = self.operations.insert(id, finisher);
		assert!(previous.is_none(), "operation {id} registered twice");
	}

	/// Runs the finisher of operation `id` with its native result.
	///
	/// Each completion token delivers exactly once, so a missing entry means
	/// the bridge itself is broken.
	pub(crate) fn finish_operation(&mut self, id: OperationId, result: Result<AsyncResult>) {
		let Some(finisher) = self.operations.remove(&id) else {
			panic!("completion delivered for unknown operation {id}");
		};
		finisher(self, result);
	}
}

/// Handle to a running scripting thread.
pub struct ScriptThread {
	scheduler: Scheduler,
	objects: Arc<ObjectStore>,
	config: Arc<RuntimeConfig>,
	thread_id: ThreadId,
	join: Option<JoinHandle<()>>,
}

impl ScriptThread {
	/// Starts the scripting thread.
	pub fn spawn(config: RuntimeConfig) -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()?;

		let (scheduler, rx) = Scheduler::channel();
		let objects = Arc::new(ObjectStore::new());
		let config = Arc::new(config);

		let parts = (scheduler.clone(), Arc::clone(&objects), Arc::clone(&config));
		let join = std::thread::Builder::new()
			.name(config.thread_name.clone())
			.spawn(move || {
				let (scheduler, objects, config) = parts;
				let local = LocalSet::new();
				local.block_on(&runtime, run_loop(rx, scheduler, objects, config));
			})?;

		let thread_id = join.thread().id();
		tracing::info!(thread = %config.thread_name, "Scripting thread started");

		Ok(Self {
			scheduler,
			objects,
			config,
			thread_id,
			join: Some(join),
		})
	}

	pub fn scheduler(&self) -> &Scheduler {
		&self.scheduler
	}

	pub fn objects(&self) -> &Arc<ObjectStore> {
		&self.objects
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.config
	}

	pub fn thread_id(&self) -> ThreadId {
		self.thread_id
	}

	/// Returns true when called from the scripting thread.
	pub fn is_current(&self) -> bool {
		std::thread::current().id() == self.thread_id
	}

	/// Runs `f` on the scripting thread and resolves with its return value.
	///
	/// This is the host's way in: everything a script would do synchronously
	/// (wrapping handles, starting operations) happens inside `f`.
	pub fn invoke<F, R>(&self, f: F) -> BoxFuture<'static, Result<R>>
	where
		F: FnOnce(&mut ScriptContext) -> R + Send + 'static,
		R: Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let posted = self.scheduler.post(move |cx| {
			let _ = tx.send(f(cx));
		});

		async move {
			if !posted {
				return Err(Error::RuntimeClosed);
			}
			rx.await.map_err(|_| Error::RuntimeClosed)
		}
		.boxed()
	}

	/// Stops the scripting thread and waits for it to exit.
	///
	/// Work queued before this call still runs. Operations still in flight
	/// are dropped and their promises fail with [`Error::RuntimeClosed`].
	pub fn shutdown(mut self) {
		self.stop();
	}

	fn stop(&mut self) {
		self.scheduler.close();
		let Some(join) = self.join.take() else {
			return;
		};
		if self.is_current() {
			return;
		}
		if join.join().is_err() {
			tracing::error!("Scripting thread panicked");
		}
	}
}

impl Drop for ScriptThread {
	fn drop(&mut self) {
		self.stop();
	}
}

impl std::fmt::Debug for ScriptThread {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScriptThread")
			.field("thread", &self.config.thread_name)
			.field("closed", &self.scheduler.is_closed())
			.finish()
	}
}

async fn run_loop(
	mut rx: mpsc::UnboundedReceiver<Envelope>,
	scheduler: Scheduler,
	objects: Arc<ObjectStore>,
	config: Arc<RuntimeConfig>,
) {
	let mut cx = ScriptContext::new(scheduler, objects, config);

	while let Some(envelope) = rx.recv().await {
		match envelope {
			Envelope::Run(job) => job(&mut cx),
			Envelope::Shutdown => break,
		}
	}

	rx.close();
	let abandoned = cx.in_flight();
	if abandoned > 0 {
		tracing::debug!(abandoned, "Dropping in-flight operations at shutdown");
	}
	drop(cx);
	tracing::info!("Scripting thread stopped");
}
