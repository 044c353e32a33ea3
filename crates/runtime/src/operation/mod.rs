//! The asynchronous operation bridge.
//!
//! One [`Operation`] is one native asynchronous call. The driver,
//! [`schedule`], gives every operation the same lifecycle:
//!
//! 1. The caller builds the operation with validated parameters (`Created`)
//! 2. `schedule` retains the target wrapper, allocates the [`Promise`],
//!    calls [`Operation::begin`] and returns the pending promise (`Running`)
//! 3. The engine invokes the [`Completion`] on any thread; it posts the
//!    result onto the scripting thread through the [`Scheduler`]
//! 4. On the scripting thread [`Operation::end`] extracts the typed outcome
//!    (`CompletedOk` / `CompletedError`)
//! 5. [`Operation::result`] converts it to the caller's value, the promise is
//!    settled and the retained wrapper released (`Settled`)
//!
//! Once begun, an operation always runs to completion; there is no
//! cancellation. If the engine never completes the call, the promise stays
//! pending. If the engine drops the completion without invoking it, the
//! promise rejects with [`Error::Abandoned`].
//!
//! [`Scheduler`]: crate::Scheduler

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::native::{AsyncResult, NativeHandle};
use crate::promise::Promise;
use crate::scheduler::Scheduler;
use crate::script_thread::ScriptContext;
use crate::wrapper::{Retained, Wrapped};


/// Identifier of one scheduled operation, unique per scripting thread.
pub type OperationId = u64;

/// Scripting-thread continuation of one in-flight operation.
pub(crate) type Finisher = Box<dyn FnOnce(&mut ScriptContext, Result<AsyncResult>)>;

/// Lifecycle of a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
	Created,
	Running,
	CompletedOk,
	CompletedError,
	Settled,
}

/// One asynchronous native call on a handle of type `H`.
///
/// Implementations declare only their native call, their result extraction
/// and their value conversion; [`schedule`] supplies everything else.
pub trait Operation<H: NativeHandle>: 'static {
	/// What [`end`](Self::end) extracts from the native result.
	type Outcome: 'static;

	/// The value the promise resolves with.
	type Output: Send + 'static;

	/// Short name for diagnostics.
	fn name(&self) -> &'static str {
		std::any::type_name::<Self>()
	}

	/// Issues exactly one native asynchronous call, handing it `completion`.
	fn begin(&mut self, handle: &H, completion: Completion);

	/// Pairs with the native `*_finish` call. Runs on the scripting thread.
	fn end(&mut self, handle: &H, result: AsyncResult) -> Result<Self::Outcome>;

	/// Converts the outcome into the promise's value.
	fn result(self, cx: &mut ScriptContext, outcome: Self::Outcome) -> Result<Self::Output>;
}

/// Completion callback of one native call.
///
/// Consumed by [`complete`](Self::complete) from any thread. Dropping it
/// without completing tells the bridge the engine abandoned the call.
pub struct Completion {
	id: OperationId,
	scheduler: Option<Scheduler>,
}

impl Completion {
	fn new(id: OperationId, scheduler: Scheduler) -> Self {
		Self {
			id,
			scheduler: Some(scheduler),
		}
	}

	pub fn id(&self) -> OperationId {
		self.id
	}

	/// Reports the native result. Safe to call from any thread.
	pub fn complete(mut self, result: AsyncResult) {
		let Some(scheduler) = self.scheduler.take() else {
			return;
		};
		deliver(&scheduler, self.id, Ok(result));
	}
}

impl Drop for Completion {
	fn drop(&mut self) {
		if let Some(scheduler) = self.scheduler.take() {
			tracing::warn!(operation = self.id, "Completion dropped without a result");
			deliver(&scheduler, self.id, Err(Error::Abandoned));
		}
	}
}

impl fmt::Debug for Completion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Completion")
			.field("id", &self.id)
			.field("pending", &self.scheduler.is_some())
			.finish()
	}
}

fn deliver(scheduler: &Scheduler, id: OperationId, result: Result<AsyncResult>) {
	tracing::trace!(operation = id, "Native call completed, hopping to scripting thread");
	if !scheduler.post(move |cx| cx.finish_operation(id, result)) {
		tracing::debug!(operation = id, "Runtime closed, completion dropped");
	}
}

struct Lifecycle {
	id: OperationId,
	name: &'static str,
	state: OperationState,
}

impl Lifecycle {
	fn new(id: OperationId, name: &'static str) -> Self {
		Self {
			id,
			name,
			state: OperationState::Created,
		}
	}

	fn advance(&mut self, to: OperationState) {
		use OperationState::*;

		let legal = matches!(
			(self.state, to),
			(Created, Running)
				| (Running, CompletedOk)
				| (Running, CompletedError)
				| (CompletedOk, Settled)
				| (CompletedError, Settled)
		);
		assert!(
			legal,
			"operation {} ({}): illegal transition {:?} -> {:?}",
			self.id, self.name, self.state, to
		);
		self.state = to;
	}
}

/// Starts `op` against `target` and returns its pending promise.
///
/// `target` is retained until the promise is settled, so its native handle
/// stays valid for the whole call even if every other reference is dropped.
/// Never blocks; the promise is always pending when this returns.
pub fn schedule<W, O>(cx: &mut ScriptContext, target: &Arc<W>, mut op: O) -> Promise<O::Output>
where
	W: Wrapped,
	O: Operation<W::Handle>,
{
	let id = cx.next_operation_id();
	let mut lifecycle = Lifecycle::new(id, op.name());
	let (deferred, promise) = cx.promise::<O::Output>();
	let retained = Retained::new(target);

	lifecycle.advance(OperationState::Running);
	tracing::debug!(
		operation = id,
		kind = lifecycle.name,
		target = %retained.native_id(),
		"Beginning native call"
	);
	op.begin(retained.handle(), Completion::new(id, cx.scheduler().clone()));

	let finisher: Finisher = Box::new(move |cx: &mut ScriptContext, result: Result<AsyncResult>| {
		let outcome = result.and_then(|raw| op.end(retained.handle(), raw));
		lifecycle.advance(match &outcome {
			Ok(_) => OperationState::CompletedOk,
			Err(_) => OperationState::CompletedError,
		});

		let value = outcome.and_then(|outcome| op.result(cx, outcome));
		match &value {
			Ok(_) => tracing::debug!(operation = lifecycle.id, kind = lifecycle.name, "Resolved"),
			Err(err) => tracing::debug!(
				operation = lifecycle.id,
				kind = lifecycle.name,
				error = %err,
				"Rejected"
			),
		}

		deferred.settle(cx, value);
		lifecycle.advance(OperationState::Settled);
		drop(retained);
	});
	cx.register_operation(id, finisher);

	promise
}

/// Closure-based [`Operation`], built with [`from_fns`].
///
/// `T` is the outcome extracted by `end` and `U` the promise's value.
pub struct FnOperation<B, E, C, T, U> {
	name: &'static str,
	begin: B,
	end: E,
	convert: C,
	_types: PhantomData<fn() -> (T, U)>,
}

/// Builds an operation from its three hooks: the native call, the result
/// extraction and the value conversion.
pub fn from_fns<B, E, C, T, U>(
	name: &'static str,
	begin: B,
	end: E,
	convert: C,
) -> FnOperation<B, E, C, T, U> {
	FnOperation {
		name,
		begin,
		end,
		convert,
		_types: PhantomData,
	}
}

impl<H, T, U, B, E, C> Operation<H> for FnOperation<B, E, C, T, U>
where
	H: NativeHandle,
	T: 'static,
	U: Send + 'static,
	B: FnMut(&H, Completion) + 'static,
	E: FnMut(&H, AsyncResult) -> Result<T> + 'static,
	C: FnOnce(&mut ScriptContext, T) -> Result<U> + 'static,
{
	type Outcome = T;
	type Output = U;

	fn name(&self) -> &'static str {
		self.name
	}

	fn begin(&mut self, handle: &H, completion: Completion) {
		(self.begin)(handle, completion)
	}

	fn end(&mut self, handle: &H, result: AsyncResult) -> Result<T> {
		(self.end)(handle, result)
	}

	fn result(self, cx: &mut ScriptContext, outcome: T) -> Result<U> {
		(self.convert)(cx, outcome)
	}
}
