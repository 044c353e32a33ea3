//! Promise/Deferred pair settled from the scripting thread.
//!
//! [`Promise`] is the awaitable half handed to the caller. [`Deferred`] is the
//! settling half; settling consumes it and requires a [`ScriptContext`], so a
//! promise can only ever be settled once and only on the scripting thread.
//!
//! Invariant: never drop an unsettled [`Deferred`] silently. If that happens it
//! posts a rejection to the scripting thread; if the runtime is already gone
//! the awaiting side observes [`Error::RuntimeClosed`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::thread::ThreadId;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::script_thread::ScriptContext;

/// Creates an unsettled promise and its settling half.
pub fn pending<T: Send + 'static>(scheduler: Scheduler) -> (Deferred<T>, Promise<T>) {
	let (tx, rx) = oneshot::channel();
	let settled = Arc::new(OnceLock::new());
	let deferred = Deferred {
		tx: Some(tx),
		settled: Arc::clone(&settled),
		scheduler,
	};
	(deferred, Promise { rx, settled })
}

/// The caller's view of one asynchronous result.
#[must_use = "a promise does nothing unless awaited or inspected"]
pub struct Promise<T> {
	rx: oneshot::Receiver<Result<T>>,
	settled: Arc<OnceLock<ThreadId>>,
}

impl<T> Promise<T> {
	pub fn is_pending(&self) -> bool {
		self.settled.get().is_none()
	}

	/// The thread that settled this promise, once settled.
	pub fn settled_on(&self) -> Option<ThreadId> {
		self.settled.get().copied()
	}
}

impl<T> Future for Promise<T> {
	type Output = Result<T>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		Pin::new(&mut this.rx)
			.poll(cx)
			.map(|received| received.map_err(|_| Error::RuntimeClosed).and_then(|r| r))
	}
}

impl<T> std::fmt::Debug for Promise<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Promise")
			.field("pending", &self.is_pending())
			.finish()
	}
}

/// Settling half of a [`Promise`].
pub struct Deferred<T: Send + 'static> {
	tx: Option<oneshot::Sender<Result<T>>>,
	settled: Arc<OnceLock<ThreadId>>,
	scheduler: Scheduler,
}

impl<T: Send + 'static> Deferred<T> {
	pub fn resolve(self, cx: &mut ScriptContext, value: T) {
		self.settle(cx, Ok(value));
	}

	pub fn reject(self, cx: &mut ScriptContext, error: Error) {
		self.settle(cx, Err(error));
	}

	pub fn settle(mut self, cx: &mut ScriptContext, outcome: Result<T>) {
		let tx = self.tx.take().expect("deferred already settled");
		deliver(cx, &self.settled, tx, outcome);
	}
}

fn deliver<T>(
	cx: &ScriptContext,
	settled: &OnceLock<ThreadId>,
	tx: oneshot::Sender<Result<T>>,
	outcome: Result<T>,
) {
	debug_assert_eq!(std::thread::current().id(), cx.thread_id());
	if settled.set(cx.thread_id()).is_err() {
		panic!("promise settled twice");
	}
	if tx.send(outcome).is_err() {
		tracing::trace!("Promise settled after its receiver was dropped");
	}
}

impl<T: Send + 'static> Drop for Deferred<T> {
	fn drop(&mut self) {
		let Some(tx) = self.tx.take() else {
			return;
		};

		tracing::warn!("Deferred dropped without being settled, rejecting");
		let settled = Arc::clone(&self.settled);
		self.scheduler.post(move |cx| {
			deliver(cx, &settled, tx, Err(Error::Unsettled));
		});
	}
}
