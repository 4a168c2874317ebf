use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::connection::{ConnectionHandle, OutOfRangeError, SignalCore};
use crate::evaluator::{ConnectionEvaluator, InvocationKey};
use crate::gen_index::{GenerationalIndex, GenerationalIndexArray};

/// Conversion of callables into connectable slots.
///
/// Implemented for `Fn(&T)`, which receives the emitted payload, and for
/// `Fn()`, which discards it. The `M` marker type only exists to keep the
/// two implementations apart during inference.
pub trait IntoSlot<T, M> {
	fn into_slot(self) -> Rc<dyn Fn(&T)>;
}

/// Marker for slots of the signal's full arity.
pub struct PayloadSlot;

/// Marker for slots that discard the payload.
pub struct UnitSlot;

impl<T, F> IntoSlot<T, PayloadSlot> for F
where
	F: Fn(&T) + 'static,
{
	fn into_slot(self) -> Rc<dyn Fn(&T)> {
		Rc::new(self)
	}
}

impl<T, F> IntoSlot<T, UnitSlot> for F
where
	F: Fn() + 'static,
{
	fn into_slot(self) -> Rc<dyn Fn(&T)> {
		Rc::new(move |_| self())
	}
}

/// [`IntoSlot`]'s counterpart for deferred connections, whose slots cross
/// threads: the erased callable must be `Send + Sync`.
pub trait IntoDeferredSlot<T, M> {
	fn into_deferred_slot(self) -> Arc<dyn Fn(&T) + Send + Sync>;
}

impl<T, F> IntoDeferredSlot<T, PayloadSlot> for F
where
	F: Fn(&T) + Send + Sync + 'static,
{
	fn into_deferred_slot(self) -> Arc<dyn Fn(&T) + Send + Sync> {
		Arc::new(self)
	}
}

impl<T, F> IntoDeferredSlot<T, UnitSlot> for F
where
	F: Fn() + Send + Sync + 'static,
{
	fn into_deferred_slot(self) -> Arc<dyn Fn(&T) + Send + Sync> {
		Arc::new(move |_| self())
	}
}

enum Slot<T> {
	Plain(Rc<dyn Fn(&T)>),
	// Receives its own handle first; single-shot and deferred connections
	// are reflective slots under the hood.
	Reflective(Rc<dyn Fn(ConnectionHandle, &T)>),
}

impl<T> Clone for Slot<T> {
	fn clone(&self) -> Self {
		match self {
			Slot::Plain(slot) => Slot::Plain(slot.clone()),
			Slot::Reflective(slot) => Slot::Reflective(slot.clone()),
		}
	}
}

struct Connection<T> {
	slot: Slot<T>,
	blocked: Cell<bool>,
	// Set when a disconnect arrives while the signal is emitting; the entry
	// stays in the table until the outermost emission sweeps it.
	to_disconnect: Cell<bool>,
	evaluator: Option<std::sync::Weak<ConnectionEvaluator>>,
}

struct SignalImpl<T> {
	connections: RefCell<GenerationalIndexArray<Connection<T>>>,
	emit_depth: Cell<usize>,
	pending_disconnect: Cell<bool>,
	this: Weak<SignalImpl<T>>,
}

impl<T> SignalImpl<T> {
	fn address(&self) -> usize {
		self as *const SignalImpl<T> as *const () as usize
	}

	fn disconnect_id(&self, id: GenerationalIndex) {
		if self.emit_depth.get() > 0 {
			let connections = self.connections.borrow();
			if let Some(connection) = connections.get(id) {
				connection.to_disconnect.set(true);
				self.pending_disconnect.set(true);
			}
			return;
		}
		self.remove(id);
	}

	fn remove(&self, id: GenerationalIndex) {
		let removed = self.connections.borrow_mut().erase(id);
		if let Some(connection) = removed {
			tracing::trace!(?id, "slot disconnected");
			if let Some(evaluator) = connection.evaluator.as_ref().and_then(std::sync::Weak::upgrade) {
				evaluator.dequeue(InvocationKey::new(self.address(), id));
			}
		}
	}

	fn disconnect_all(&self) {
		let count = self.connections.borrow().entries_len();
		for entry in 0..count {
			let id = self.connections.borrow().index_at_entry(entry);
			if let Some(id) = id {
				self.disconnect_id(id);
			}
		}
	}

	fn block_id(&self, id: GenerationalIndex, blocked: bool) -> Result<bool, OutOfRangeError> {
		let connections = self.connections.borrow();
		let connection = connections.get(id).ok_or(OutOfRangeError)?;
		Ok(connection.blocked.replace(blocked))
	}

	fn is_blocked_id(&self, id: GenerationalIndex) -> Result<bool, OutOfRangeError> {
		let connections = self.connections.borrow();
		let connection = connections.get(id).ok_or(OutOfRangeError)?;
		Ok(connection.blocked.get())
	}

	// Erases every connection that was marked for disconnection while an
	// emission was running.
	fn sweep(&self) {
		let count = self.connections.borrow().entries_len();
		for entry in 0..count {
			let id = {
				let connections = self.connections.borrow();
				connections.index_at_entry(entry).filter(|id| {
					connections
						.get(*id)
						.map_or(false, |connection| connection.to_disconnect.get())
				})
			};
			if let Some(id) = id {
				self.remove(id);
			}
		}
	}
}

impl<T: 'static> SignalImpl<T> {
	fn handle_for(&self, id: GenerationalIndex) -> ConnectionHandle {
		let core: Weak<dyn SignalCore> = self.this.clone();
		ConnectionHandle::new(core, id)
	}

	fn insert(&self, connection: Connection<T>) -> ConnectionHandle {
		let id = self.connections.borrow_mut().insert(connection);
		tracing::trace!(?id, "slot connected");
		self.handle_for(id)
	}

	fn emit(&self, args: &T) {
		let depth = self.emit_depth.get();
		self.emit_depth.set(depth + 1);

		// The guard restores the depth and runs the sweep even when a slot
		// panics, so the table is never left with stale pending entries.
		let _guard = EmitGuard { signal: self, depth };

		// Entries connected during this emission land at indices >= count
		// and are not invoked by it.
		let count = self.connections.borrow().entries_len();
		for entry in 0..count {
			let invocation = {
				let connections = self.connections.borrow();
				connections.index_at_entry(entry).and_then(|id| {
					let connection = connections.get(id)?;
					if connection.blocked.get() || connection.to_disconnect.get() {
						None
					} else {
						Some((id, connection.slot.clone()))
					}
				})
			};

			// The cloned Rc keeps the slot alive for the duration of the
			// call, even if the slot disconnects itself.
			match invocation {
				Some((_, Slot::Plain(slot))) => slot(args),
				Some((id, Slot::Reflective(slot))) => slot(self.handle_for(id), args),
				None => {}
			}
		}
	}
}

impl<T: 'static> SignalCore for SignalImpl<T> {
	fn disconnect_id(&self, id: GenerationalIndex) {
		SignalImpl::disconnect_id(self, id);
	}

	fn block_id(&self, id: GenerationalIndex, blocked: bool) -> Result<bool, OutOfRangeError> {
		SignalImpl::block_id(self, id, blocked)
	}

	fn is_blocked_id(&self, id: GenerationalIndex) -> Result<bool, OutOfRangeError> {
		SignalImpl::is_blocked_id(self, id)
	}

	fn is_active_id(&self, id: GenerationalIndex) -> bool {
		self.connections.borrow().get(id).is_some()
	}
}

struct EmitGuard<'a, T> {
	signal: &'a SignalImpl<T>,
	depth: usize,
}

impl<T> Drop for EmitGuard<'_, T> {
	fn drop(&mut self) {
		self.signal.emit_depth.set(self.depth);
		if self.depth == 0 && self.signal.pending_disconnect.replace(false) {
			self.signal.sweep();
		}
	}
}

/// A multi-listener callback emitter publishing payloads of type `T`.
///
/// Multi-argument signals publish tuples; argument-less signals use
/// `Signal<()>`. Slots run in connection order and borrow the emitted
/// payload.
///
/// Signals are move-only. The connection table lives behind a shared
/// implementation object, so moving a `Signal` keeps every
/// [`ConnectionHandle`] valid; dropping it deactivates them all.
///
/// A `Signal` is not internally synchronized: all operations must stay on
/// one thread. The one sanctioned cross-thread path is
/// [`connect_deferred`](Self::connect_deferred).
pub struct Signal<T> {
	body: Rc<SignalImpl<T>>,
}

impl<T: 'static> Default for Signal<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: 'static> Signal<T> {
	pub fn new() -> Self {
		Signal {
			body: Rc::new_cyclic(|this| SignalImpl {
				connections: RefCell::new(GenerationalIndexArray::new()),
				emit_depth: Cell::new(0),
				pending_disconnect: Cell::new(false),
				this: this.clone(),
			}),
		}
	}

	/// Connects a slot, to be invoked on every emission.
	///
	/// Accepts both `Fn(&T)` and payload-discarding `Fn()` callables.
	#[must_use = "dropping the handle leaves the connection in place with no way to disconnect it"]
	pub fn connect<M>(&self, slot: impl IntoSlot<T, M>) -> ConnectionHandle {
		self.body.insert(Connection {
			slot: Slot::Plain(slot.into_slot()),
			blocked: Cell::new(false),
			to_disconnect: Cell::new(false),
			evaluator: None,
		})
	}

	/// Connects a slot that receives its own [`ConnectionHandle`] as first
	/// argument, so it can disconnect or block itself.
	#[must_use = "dropping the handle leaves the connection in place with no way to disconnect it"]
	pub fn connect_reflective(&self, slot: impl Fn(ConnectionHandle, &T) + 'static) -> ConnectionHandle {
		self.body.insert(Connection {
			slot: Slot::Reflective(Rc::new(slot)),
			blocked: Cell::new(false),
			to_disconnect: Cell::new(false),
			evaluator: None,
		})
	}

	/// Connects a slot that is disconnected by its first non-blocked
	/// invocation, before the slot body runs. A reentrant emission from
	/// inside the slot therefore cannot invoke it a second time.
	#[must_use = "dropping the handle leaves the connection in place with no way to disconnect it"]
	pub fn connect_single_shot<M>(&self, slot: impl IntoSlot<T, M>) -> ConnectionHandle {
		let slot = slot.into_slot();
		self.connect_reflective(move |mut handle, args| {
			handle.disconnect();
			slot(args);
		})
	}

	/// Connects a slot whose invocations are deferred through `evaluator`.
	///
	/// Emitting clones the payload into a thunk and enqueues it; the slot
	/// runs when [`ConnectionEvaluator::evaluate_deferred_connections`] is
	/// called, possibly on another thread. Disconnecting drops any thunks
	/// still queued.
	#[must_use = "dropping the handle leaves the connection in place with no way to disconnect it"]
	pub fn connect_deferred<M>(
		&self,
		evaluator: &Arc<ConnectionEvaluator>,
		slot: impl IntoDeferredSlot<T, M>,
	) -> ConnectionHandle
	where
		T: Clone + Send,
	{
		let slot = slot.into_deferred_slot();
		let weak_evaluator = Arc::downgrade(evaluator);
		let deferred = move |handle: ConnectionHandle, args: &T| {
			if let Some(evaluator) = weak_evaluator.upgrade() {
				if let Some(key) = handle.invocation_key() {
					let slot = Arc::clone(&slot);
					let args = args.clone();
					evaluator.enqueue(key, Box::new(move || slot(&args)));
				}
			} else {
				tracing::warn!("deferred connection emitted after its evaluator was dropped");
			}
		};

		self.body.insert(Connection {
			slot: Slot::Reflective(Rc::new(deferred)),
			blocked: Cell::new(false),
			to_disconnect: Cell::new(false),
			evaluator: Some(Arc::downgrade(evaluator)),
		})
	}

	/// Emits the signal, invoking every connected, non-blocked slot in
	/// connection order with a borrow of `args`.
	///
	/// Slots may connect, disconnect (including themselves) and emit this
	/// signal reentrantly. Slots connected during an emission are not
	/// invoked by it; disconnections requested during an emission take
	/// effect once the outermost emission finishes.
	pub fn emit(&self, args: &T) {
		self.body.emit(args);
	}

	/// Disconnects `handle` if it refers to an active connection of this
	/// signal; otherwise does nothing.
	pub fn disconnect(&self, handle: &ConnectionHandle) {
		if !handle.belongs_to(self) {
			return;
		}
		if let Some(id) = handle.id() {
			self.body.disconnect_id(id);
		}
	}

	/// Disconnects every connection. All outstanding handles become
	/// inactive.
	pub fn disconnect_all(&self) {
		self.body.disconnect_all();
	}

	/// Sets the blocked state of `handle`'s connection, returning the
	/// previous state. A blocked connection stays connected but is skipped
	/// by emissions.
	pub fn block_connection(&self, handle: &ConnectionHandle, blocked: bool) -> Result<bool, OutOfRangeError> {
		match handle.id() {
			Some(id) if handle.belongs_to(self) => self.body.block_id(id, blocked),
			_ => Err(OutOfRangeError),
		}
	}

	pub fn is_connection_blocked(&self, handle: &ConnectionHandle) -> Result<bool, OutOfRangeError> {
		match handle.id() {
			Some(id) if handle.belongs_to(self) => self.body.is_blocked_id(id),
			_ => Err(OutOfRangeError),
		}
	}

	pub(crate) fn core_addr(&self) -> *const () {
		Rc::as_ptr(&self.body) as *const ()
	}
}

impl<T> Drop for Signal<T> {
	fn drop(&mut self) {
		// Dropping the body would deactivate the handles on its own, but
		// queued deferred invocations have to be dequeued explicitly.
		self.body.disconnect_all();
	}
}

/// Scoped blocking of a single connection.
///
/// Construction records the connection's blocked state and blocks it; drop
/// restores the recorded state, so blockers nest: one built over an already
/// blocked connection leaves it blocked on exit.
pub struct ConnectionBlocker {
	handle: ConnectionHandle,
	was_blocked: bool,
}

impl ConnectionBlocker {
	/// Blocks the connection `handle` refers to.
	///
	/// Fails with [`OutOfRangeError`] if the connection is no longer
	/// active.
	pub fn new(handle: &ConnectionHandle) -> Result<Self, OutOfRangeError> {
		let handle = handle.clone();
		let was_blocked = handle.block(true)?;
		Ok(ConnectionBlocker { handle, was_blocked })
	}
}

impl Drop for ConnectionBlocker {
	fn drop(&mut self) {
		// The connection may have died while the blocker was alive.
		let _ = self.handle.block(self.was_blocked);
	}
}
