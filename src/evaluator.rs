use parking_lot::Mutex;

use crate::gen_index::GenerationalIndex;

pub(crate) type DeferredInvocation = Box<dyn FnOnce() + Send>;

// Identifies a connection across threads without referencing the signal
// itself: signal implementations are `Rc`-based and must never leave their
// thread, so the queue keys on the implementation address plus the
// generational index instead.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct InvocationKey {
	signal: usize,
	id: GenerationalIndex,
}

impl InvocationKey {
	pub(crate) fn new(signal: usize, id: GenerationalIndex) -> Self {
		InvocationKey { signal, id }
	}
}

/// Collects slot invocations from deferred connections and replays them on
/// demand, possibly on another thread.
///
/// Share it as an `Arc<ConnectionEvaluator>`; signals only keep weak
/// references to it. Emitting through a deferred connection enqueues a thunk
/// that owns a clone of the emitted payload; nothing runs until
/// [`evaluate_deferred_connections`](Self::evaluate_deferred_connections) is
/// called.
pub struct ConnectionEvaluator {
	queue: Mutex<Vec<(InvocationKey, DeferredInvocation)>>,
	notify: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Default for ConnectionEvaluator {
	fn default() -> Self {
		Self::new()
	}
}

impl ConnectionEvaluator {
	pub fn new() -> Self {
		ConnectionEvaluator {
			queue: Mutex::new(Vec::new()),
			notify: None,
		}
	}

	/// Like [`new`](Self::new), but `notify` is invoked every time an
	/// invocation is enqueued. Use this to wake up the thread that drains
	/// the evaluator.
	pub fn with_notify(notify: impl Fn() + Send + Sync + 'static) -> Self {
		ConnectionEvaluator {
			queue: Mutex::new(Vec::new()),
			notify: Some(Box::new(notify)),
		}
	}

	/// Runs all queued slot invocations in the order they were enqueued.
	///
	/// The queue is swapped out under the lock and the lock released before
	/// any thunk runs. Thunks may therefore emit signals that enqueue into
	/// this same evaluator (those land in the fresh queue and run on the
	/// next call) and may take arbitrary application locks.
	pub fn evaluate_deferred_connections(&self) {
		let queue = std::mem::take(&mut *self.queue.lock());
		tracing::trace!(invocations = queue.len(), "draining deferred connections");
		for (_, invocation) in queue {
			invocation();
		}
	}

	pub(crate) fn enqueue(&self, key: InvocationKey, invocation: DeferredInvocation) {
		self.queue.lock().push((key, invocation));
		if let Some(notify) = &self.notify {
			notify();
		}
	}

	// Drops every queued invocation recorded for `key`. Called when a
	// deferred connection is disconnected, so cancelled slots never run.
	pub(crate) fn dequeue(&self, key: InvocationKey) {
		self.queue.lock().retain(|(entry, _)| *entry != key);
	}
}
