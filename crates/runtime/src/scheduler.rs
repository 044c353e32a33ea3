//! Thread hop onto the scripting thread.
//!
//! [`Scheduler`] is the only cross-thread primitive of the bridge. Any thread
//! may [`post`](Scheduler::post) work; the scripting thread runs each piece of
//! work exactly once, in posting order. Once teardown begins, posted work is
//! dropped on the posting thread instead of being queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::script_thread::ScriptContext;

/// A unit of work executed on the scripting thread.
pub type Job = Box<dyn FnOnce(&mut ScriptContext) + Send + 'static>;

pub(crate) enum Envelope {
	Run(Job),
	Shutdown,
}

struct Shared {
	tx: mpsc::UnboundedSender<Envelope>,
	closed: AtomicBool,
}

/// Posts work from any thread onto the scripting thread.
#[derive(Clone)]
pub struct Scheduler {
	shared: Arc<Shared>,
}

impl Scheduler {
	pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let scheduler = Self {
			shared: Arc::new(Shared {
				tx,
				closed: AtomicBool::new(false),
			}),
		};
		(scheduler, rx)
	}

	/// Queues `work` to run on the scripting thread.
	///
	/// Returns `false` if the runtime is shutting down; the work is then
	/// dropped on the calling thread without running.
	pub fn post<F>(&self, work: F) -> bool
	where
		F: FnOnce(&mut ScriptContext) + Send + 'static,
	{
		if self.shared.closed.load(Ordering::Acquire) {
			tracing::debug!("Scheduler closed, dropping posted work");
			return false;
		}

		if self.shared.tx.send(Envelope::Run(Box::new(work))).is_err() {
			tracing::debug!("Scripting thread gone, dropping posted work");
			return false;
		}

		tracing::trace!("Posted work to scripting thread");
		true
	}

	/// Begins teardown. Work posted afterwards is dropped.
	pub(crate) fn close(&self) {
		if self.shared.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		let _ = self.shared.tx.send(Envelope::Shutdown);
	}

	pub fn is_closed(&self) -> bool {
		self.shared.closed.load(Ordering::Acquire) || self.shared.tx.is_closed()
	}
}

impl std::fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheduler")
			.field("closed", &self.is_closed())
			.finish()
	}
}
