use std::sync::Arc;

use sonde_runtime::{
	AsyncResult, Completion, ManagedObject, NativeId, Operation, OwnedWrapper, Promise, Result,
	ScriptContext, StrongRef, Wrapped, schedule,
};

use crate::engine::NativeScript;
use crate::events::Events;

/// A script created inside a session.
///
/// Obtained from [`Session::create_script`](crate::Session::create_script).
pub struct Script<H: NativeScript> {
	wrapper: OwnedWrapper<H>,
	events: Events,
}

impl<H: NativeScript> Script<H> {
	/// Wraps a script reference transferred by the engine.
	///
	/// If the native script already has a wrapper, that wrapper is returned
	/// and `handle` is released.
	pub fn adopt(cx: &ScriptContext, handle: StrongRef<H>) -> Arc<Self> {
		cx.objects().get_or_insert_with(handle.native_id(), move || {
			let events = Events::new(cx.config().event_capacity);
			handle
				.handle()
				.connect_signals(events.forwarder(cx.scheduler().clone()));
			Arc::new(Self {
				wrapper: OwnedWrapper::adopt(cx, handle),
				events,
			})
		})
	}

	pub fn name(&self) -> String {
		self.wrapper.handle().name()
	}

	pub fn events(&self) -> &Events {
		&self.events
	}

	pub fn load(self: &Arc<Self>, cx: &mut ScriptContext) -> Promise<()> {
		schedule(cx, self, Load)
	}

	pub fn unload(self: &Arc<Self>, cx: &mut ScriptContext) -> Promise<()> {
		schedule(cx, self, Unload)
	}

	/// Posts `message` to the script. Completes synchronously.
	pub fn post_message(&self, message: &str) -> Result<()> {
		Ok(self.wrapper.handle().post_message(message)?)
	}
}

impl<H: NativeScript> ManagedObject for Script<H> {
	fn native_id(&self) -> NativeId {
		self.wrapper.native_id()
	}

	fn type_name(&self) -> &'static str {
		"Script"
	}
}

impl<H: NativeScript> Wrapped for Script<H> {
	type Handle = H;

	fn wrapper(&self) -> &OwnedWrapper<H> {
		&self.wrapper
	}
}

impl<H: NativeScript> std::fmt::Debug for Script<H> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Script")
			.field("id", &self.wrapper.native_id())
			.finish()
	}
}

struct Load;

impl<H: NativeScript> Operation<H> for Load {
	type Outcome = ();
	type Output = ();

	fn name(&self) -> &'static str {
		"load"
	}

	fn begin(&mut self, handle: &H, completion: Completion) {
		handle.load(completion);
	}

	fn end(&mut self, handle: &H, result: AsyncResult) -> Result<()> {
		Ok(handle.load_finish(result)?)
	}

	fn result(self, _: &mut ScriptContext, (): ()) -> Result<()> {
		Ok(())
	}
}

struct Unload;

impl<H: NativeScript> Operation<H> for Unload {
	type Outcome = ();
	type Output = ();

	fn name(&self) -> &'static str {
		"unload"
	}

	fn begin(&mut self, handle: &H, completion: Completion) {
		handle.unload(completion);
	}

	fn end(&mut self, handle: &H, result: AsyncResult) -> Result<()> {
		Ok(handle.unload_finish(result)?)
	}

	fn result(self, _: &mut ScriptContext, (): ()) -> Result<()> {
		Ok(())
	}
}
