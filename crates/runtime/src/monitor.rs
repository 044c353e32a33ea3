//! One-shot watcher for a native object's terminal state.
//!
//! A [`LivenessMonitor`] runs as a local task on the scripting thread. Each
//! tick it upgrades its weak reference to the target and evaluates the
//! predicate against the native handle. The first tick where the predicate
//! holds (or fails, meaning the handle was invalidated underneath us) emits
//! the configured event once through the [`EventSink`] and ends the task.
//!
//! The returned [`MonitorGuard`] is normally stored in the target's
//! [`OwnedWrapper`](crate::OwnedWrapper); dropping it stops the task, so a
//! monitor never outlives or fires after its wrapper.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sonde_protocol::SignalEvent;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::native::{NativeError, NativeHandle};
use crate::script_thread::ScriptContext;
use crate::wrapper::Wrapped;

/// Receives notifications destined for the scripting host.
pub trait EventSink: Send + Sync + 'static {
	fn emit(&self, event: SignalEvent);
}

type Predicate<H> = Box<dyn Fn(&H) -> std::result::Result<bool, NativeError>>;

/// Watches a handle of type `H` for a terminal state.
pub struct LivenessMonitor<H: NativeHandle> {
	event: String,
	predicate: Predicate<H>,
}

impl<H: NativeHandle> LivenessMonitor<H> {
	/// Creates a monitor emitting `event` once `predicate` reports true.
	pub fn new<P>(event: impl Into<String>, predicate: P) -> Self
	where
		P: Fn(&H) -> std::result::Result<bool, NativeError> + 'static,
	{
		Self {
			event: event.into(),
			predicate: Box::new(predicate),
		}
	}

	/// Starts watching `target`, polling at the configured monitor interval.
	pub fn enable<W>(self, cx: &ScriptContext, target: &Arc<W>, sink: Arc<dyn EventSink>) -> MonitorGuard
	where
		W: Wrapped<Handle = H>,
	{
		let (cancel, mut cancelled) = oneshot::channel::<()>();
		let fired = Arc::new(AtomicBool::new(false));
		let target = Arc::downgrade(target);
		let period = cx.config().monitor_interval_duration();
		let flag = Arc::clone(&fired);

		cx.spawn_local(async move {
			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					biased;
					_ = &mut cancelled => {
						tracing::trace!(event = %self.event, "Liveness monitor cancelled");
						return;
					}
					_ = ticker.tick() => {}
				}

				let Some(target) = target.upgrade() else {
					return;
				};
				let terminal = match (self.predicate)(target.wrapper().handle()) {
					Ok(terminal) => terminal,
					Err(err) => {
						tracing::debug!(error = %err, "Liveness check failed, treating as terminal");
						true
					}
				};
				let id = target.wrapper().native_id();
				drop(target);

				if terminal {
					flag.store(true, Ordering::SeqCst);
					tracing::debug!(%id, event = %self.event, "Liveness monitor fired");
					sink.emit(SignalEvent::bare(self.event));
					return;
				}
			}
		});

		MonitorGuard {
			cancel: Some(cancel),
			fired,
		}
	}
}

/// Keeps a [`LivenessMonitor`] running; dropping it stops the monitor.
#[derive(Debug)]
pub struct MonitorGuard {
	cancel: Option<oneshot::Sender<()>>,
	fired: Arc<AtomicBool>,
}

impl MonitorGuard {
	pub fn has_fired(&self) -> bool {
		self.fired.load(Ordering::SeqCst)
	}

	/// Stops the monitor now. No-op if it already fired or stopped.
	pub fn cancel(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			let _ = cancel.send(());
		}
	}
}

impl Drop for MonitorGuard {
	fn drop(&mut self) {
		self.cancel();
	}
}
