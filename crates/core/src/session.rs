//! The managed wrapper of an attached session.

use std::sync::Arc;

use sonde_runtime::{
	AsyncResult, Completion, Error, LivenessMonitor, ManagedObject, NativeId, Operation,
	OwnedWrapper, Promise, Result, ScriptContext, StrongRef, Wrapped, from_fns, schedule,
};

use crate::engine::NativeSession;
use crate::events::Events;
use crate::script::Script;

/// Signal emitted once the session reaches its detached state.
pub const DETACHED: &str = "detached";

/// An attached session with a target process.
///
/// Every method that talks to the engine returns a [`Promise`] immediately;
/// any number of them may be in flight at once.
pub struct Session<S: NativeSession> {
	wrapper: OwnedWrapper<S>,
	events: Events,
}

impl<S: NativeSession> Session<S> {
	/// Wraps the native session `handle`, taking one strong reference.
	///
	/// Returns the existing wrapper if this native session is already wrapped.
	/// A new wrapper starts forwarding engine signals and watching for
	/// detachment, which it reports once as a [`DETACHED`] signal even when
	/// the engine raises its own.
	pub fn new(cx: &ScriptContext, handle: &S) -> Arc<Self> {
		cx.objects().get_or_insert_with(handle.native_id(), || {
			let events = Events::new(cx.config().event_capacity);
			events.latch(DETACHED);
			handle.connect_signals(events.forwarder(cx.scheduler().clone()));

			let session = Arc::new(Self {
				wrapper: OwnedWrapper::new(cx, handle),
				events,
			});
			let monitor = LivenessMonitor::new(DETACHED, |session: &S| session.is_detached());
			let guard = monitor.enable(cx, &session, Arc::new(session.events.clone()));
			session.wrapper.attach_monitor(guard);
			session
		})
	}

	pub fn pid(&self) -> u32 {
		self.wrapper.handle().pid()
	}

	/// A session whose state can no longer be observed counts as detached.
	pub fn is_detached(&self) -> bool {
		self.wrapper.handle().is_detached().unwrap_or(true)
	}

	pub fn events(&self) -> &Events {
		&self.events
	}

	/// Detaches from the target. Engine errors are reported as a rejection.
	pub fn detach(self: &Arc<Self>, cx: &mut ScriptContext) -> Promise<()> {
		schedule(cx, self, Detach)
	}

	/// Creates a script from `source`, named `name` if given.
	///
	/// No script wrapper exists unless the promise resolves.
	pub fn create_script(
		self: &Arc<Self>,
		cx: &mut ScriptContext,
		name: Option<&str>,
		source: &str,
	) -> Promise<Arc<Script<S::Script>>> {
		schedule(
			cx,
			self,
			CreateScript {
				name: name.map(str::to_string),
				source: source.to_string(),
			},
		)
	}

	pub fn enable_debugger(self: &Arc<Self>, cx: &mut ScriptContext, port: u16) -> Promise<()> {
		let op = from_fns(
			"enable_debugger",
			move |session: &S, completion: Completion| session.enable_debugger(port, completion),
			|session: &S, result: AsyncResult| -> Result<()> {
				Ok(session.enable_debugger_finish(result)?)
			},
			|_: &mut ScriptContext, (): ()| -> Result<()> { Ok(()) },
		);
		schedule(cx, self, op)
	}

	pub fn disable_debugger(self: &Arc<Self>, cx: &mut ScriptContext) -> Promise<()> {
		let op = from_fns(
			"disable_debugger",
			|session: &S, completion: Completion| session.disable_debugger(completion),
			|session: &S, result: AsyncResult| -> Result<()> {
				Ok(session.disable_debugger_finish(result)?)
			},
			|_: &mut ScriptContext, (): ()| -> Result<()> { Ok(()) },
		);
		schedule(cx, self, op)
	}
}

impl<S: NativeSession> ManagedObject for Session<S> {
	fn native_id(&self) -> NativeId {
		self.wrapper.native_id()
	}

	fn type_name(&self) -> &'static str {
		"Session"
	}
}

impl<S: NativeSession> Wrapped for Session<S> {
	type Handle = S;

	fn wrapper(&self) -> &OwnedWrapper<S> {
		&self.wrapper
	}
}

impl<S: NativeSession> std::fmt::Debug for Session<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.wrapper.native_id())
			.field("pending", &self.wrapper.pending_operations())
			.finish()
	}
}

struct Detach;

impl<S: NativeSession> Operation<S> for Detach {
	type Outcome = ();
	type Output = ();

	fn name(&self) -> &'static str {
		"detach"
	}

	fn begin(&mut self, session: &S, completion: Completion) {
		session.detach(completion);
	}

	fn end(&mut self, session: &S, result: AsyncResult) -> Result<()> {
		Ok(session.detach_finish(result)?)
	}

	fn result(self, _: &mut ScriptContext, (): ()) -> Result<()> {
		Ok(())
	}
}

struct CreateScript {
	name: Option<String>,
	source: String,
}

impl<S: NativeSession> Operation<S> for CreateScript {
	type Outcome = Option<StrongRef<S::Script>>;
	type Output = Arc<Script<S::Script>>;

	fn name(&self) -> &'static str {
		"create_script"
	}

	fn begin(&mut self, session: &S, completion: Completion) {
		session.create_script(self.name.as_deref(), &self.source, completion);
	}

	fn end(&mut self, session: &S, result: AsyncResult) -> Result<Self::Outcome> {
		Ok(session.create_script_finish(result)?)
	}

	fn result(self, cx: &mut ScriptContext, outcome: Self::Outcome) -> Result<Self::Output> {
		let handle = outcome.ok_or(Error::MissingResult("script"))?;
		Ok(Script::adopt(cx, handle))
	}
}
