//! Signal delivery for sessions and scripts.
//!
//! Every wrapped object carries an [`Events`] hub. Two kinds of producers feed
//! it:
//!
//! - Liveness monitors, which already run on the scripting thread and emit
//!   directly through [`EventSink`]
//! - The engine, which raises signals on its own threads and goes through a
//!   [`SignalForwarder`] so delivery happens on the scripting thread, in order
//!   with operation settlements
//!
//! Consumers either subscribe to an [`EventStream`] or wait once for a named
//! signal with [`EventWaiter`].
//!
//! A signal name registered with [`Events::latch`] is delivered at most once,
//! whichever producer raises it first.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use sonde_protocol::SignalEvent;
use sonde_runtime::{Error, EventSink, Result, Scheduler};
use tokio::sync::{broadcast, oneshot};

struct WaiterEntry {
	name: String,
	complete_tx: oneshot::Sender<SignalEvent>,
}

struct Hub {
	tx: broadcast::Sender<SignalEvent>,
	waiters: Mutex<Vec<WaiterEntry>>,
	/// Latched signal names, mapped to whether they have fired.
	latched: Mutex<HashMap<String, bool>>,
}

/// Signal hub of one wrapped object. Cloning shares the hub.
#[derive(Clone)]
pub struct Events {
	hub: Arc<Hub>,
}

impl Events {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self {
			hub: Arc::new(Hub {
				tx,
				waiters: Mutex::new(Vec::new()),
				latched: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Delivers `event` to matching waiters first, then to every stream.
	///
	/// Waiters are served before the broadcast so that a lagging stream can
	/// never cause a `wait_for` to miss its signal.
	pub fn emit(&self, event: SignalEvent) {
		if !self.admit(&event.name) {
			tracing::trace!(signal = %event.name, "Dropping repeated latched signal");
			return;
		}
		{
			let mut waiters = self.hub.waiters.lock();
			let mut i = 0;
			while i < waiters.len() {
				if waiters[i].name == event.name {
					let entry = waiters.swap_remove(i);
					let _ = entry.complete_tx.send(event.clone());
				} else {
					i += 1;
				}
			}
		}
		tracing::trace!(signal = %event.name, "Emitting signal");
		let _ = self.hub.tx.send(event);
	}

	/// Limits the signal called `name` to a single delivery.
	pub fn latch(&self, name: impl Into<String>) {
		self.hub.latched.lock().entry(name.into()).or_insert(false);
	}

	fn admit(&self, name: &str) -> bool {
		match self.hub.latched.lock().get_mut(name) {
			Some(fired) => !std::mem::replace(fired, true),
			None => true,
		}
	}

	/// Subscribes to all signals emitted from now on.
	pub fn subscribe(&self) -> EventStream {
		EventStream {
			rx: self.hub.tx.subscribe(),
		}
	}

	/// Waits for the next signal called `name`.
	pub fn wait_for(&self, name: impl Into<String>) -> EventWaiter {
		let (complete_tx, rx) = oneshot::channel();
		let mut waiters = self.hub.waiters.lock();
		waiters.retain(|entry| !entry.complete_tx.is_closed());
		waiters.push(WaiterEntry {
			name: name.into(),
			complete_tx,
		});
		EventWaiter { rx }
	}

	/// Returns a handle the engine may use from any thread to raise signals.
	pub fn forwarder(&self, scheduler: Scheduler) -> SignalForwarder {
		SignalForwarder {
			hub: Arc::downgrade(&self.hub),
			scheduler,
		}
	}

	pub fn subscriber_count(&self) -> usize {
		self.hub.tx.receiver_count()
	}

	pub fn waiter_count(&self) -> usize {
		self.hub.waiters.lock().len()
	}
}

impl EventSink for Events {
	fn emit(&self, event: SignalEvent) {
		Events::emit(self, event);
	}
}

impl std::fmt::Debug for Events {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Events")
			.field("subscribers", &self.subscriber_count())
			.field("waiters", &self.waiter_count())
			.finish()
	}
}

/// Thread-safe entry point for engine signals.
///
/// Forwarded signals are emitted on the scripting thread. Signals raised
/// after the owning object is gone, or after the runtime shut down, are
/// dropped.
#[derive(Clone)]
pub struct SignalForwarder {
	hub: Weak<Hub>,
	scheduler: Scheduler,
}

impl SignalForwarder {
	pub fn forward(&self, event: SignalEvent) {
		let hub = self.hub.clone();
		let posted = self.scheduler.post(move |_| {
			if let Some(hub) = hub.upgrade() {
				Events { hub }.emit(event);
			}
		});
		if !posted {
			tracing::debug!("Runtime closed, dropping engine signal");
		}
	}
}

impl EventSink for SignalForwarder {
	fn emit(&self, event: SignalEvent) {
		self.forward(event);
	}
}

/// A subscription to every signal of one object.
///
/// Broadcast lag is logged and skipped rather than surfaced.
pub struct EventStream {
	rx: broadcast::Receiver<SignalEvent>,
}

impl EventStream {
	/// Receives the next signal, or `None` once the object is gone.
	pub async fn recv(&mut self) -> Option<SignalEvent> {
		loop {
			match self.rx.recv().await {
				Ok(event) => return Some(event),
				Err(broadcast::error::RecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped signals");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	pub fn try_recv(&mut self) -> Option<SignalEvent> {
		loop {
			match self.rx.try_recv() {
				Ok(event) => return Some(event),
				Err(broadcast::error::TryRecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped signals");
				}
				Err(
					broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
				) => return None,
			}
		}
	}
}

/// One-shot wait for a named signal.
///
/// Await it directly, or use [`wait`](Self::wait) to bound the wait.
pub struct EventWaiter {
	rx: oneshot::Receiver<SignalEvent>,
}

impl EventWaiter {
	/// # Errors
	///
	/// - [`Error::Timeout`] if the signal does not arrive within `timeout`
	/// - [`Error::ChannelClosed`] if the object is dropped first
	pub async fn wait(self, timeout: Duration) -> Result<SignalEvent> {
		tokio::time::timeout(timeout, self.rx)
			.await
			.map_err(|_| Error::Timeout("Timeout waiting for signal".to_string()))?
			.map_err(|_| Error::ChannelClosed)
	}
}

impl Future for EventWaiter {
	type Output = Result<SignalEvent>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(event)) => Poll::Ready(Ok(event)),
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::ChannelClosed)),
			Poll::Pending => Poll::Pending,
		}
	}
}
