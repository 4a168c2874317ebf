use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::evaluator::InvocationKey;
use crate::gen_index::GenerationalIndex;
use crate::signal::Signal;

/// Raised when a blocking operation is attempted on a handle that no longer
/// references an active connection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("connection handle does not reference an active connection")]
pub struct OutOfRangeError;

// The type-erased face a signal implementation presents to its handles.
// Handles are not generic over the signal's payload, so everything they can
// do is routed through this object-safe seam.
pub(crate) trait SignalCore {
	fn disconnect_id(&self, id: GenerationalIndex);
	fn block_id(&self, id: GenerationalIndex, blocked: bool) -> Result<bool, OutOfRangeError>;
	fn is_blocked_id(&self, id: GenerationalIndex) -> Result<bool, OutOfRangeError>;
	fn is_active_id(&self, id: GenerationalIndex) -> bool;
}

/// A weak, value-typed reference to one connection of a [`Signal`].
///
/// Handles are freely cloneable; all clones refer to the same connection and
/// all of them observe its removal at once, because activity is decided by
/// the generational index, not by the handle.
#[derive(Clone, Default)]
pub struct ConnectionHandle {
	core: Option<Weak<dyn SignalCore>>,
	id: Option<GenerationalIndex>,
}

impl ConnectionHandle {
	pub(crate) fn new(core: Weak<dyn SignalCore>, id: GenerationalIndex) -> Self {
		ConnectionHandle {
			core: Some(core),
			id: Some(id),
		}
	}

	fn upgraded(&self) -> Option<Rc<dyn SignalCore>> {
		self.core.as_ref()?.upgrade()
	}

	// Upgrades only when the connection is still live on the signal side.
	fn checked_core(&self) -> Option<(Rc<dyn SignalCore>, GenerationalIndex)> {
		let id = self.id?;
		let core = self.upgraded()?;
		if core.is_active_id(id) {
			Some((core, id))
		} else {
			None
		}
	}

	/// Disconnects the slot this handle refers to.
	///
	/// Infallible: a handle that is inactive, empty, or already disconnected
	/// is left alone. On return the handle no longer references any signal,
	/// so subsequent [`is_active`](Self::is_active) checks are cheap.
	pub fn disconnect(&mut self) {
		if let Some((core, id)) = self.checked_core() {
			core.disconnect_id(id);
		}
		self.core = None;
	}

	pub fn is_active(&self) -> bool {
		self.checked_core().is_some()
	}

	/// Sets the blocked state of the connection, returning the previous
	/// state.
	pub fn block(&self, blocked: bool) -> Result<bool, OutOfRangeError> {
		match (self.id, self.upgraded()) {
			(Some(id), Some(core)) => core.block_id(id, blocked),
			_ => Err(OutOfRangeError),
		}
	}

	pub fn is_blocked(&self) -> Result<bool, OutOfRangeError> {
		match (self.id, self.upgraded()) {
			(Some(id), Some(core)) => core.is_blocked_id(id),
			_ => Err(OutOfRangeError),
		}
	}

	/// Whether this handle refers to a connection within `signal`.
	pub fn belongs_to<T: 'static>(&self, signal: &Signal<T>) -> bool {
		match self.upgraded() {
			Some(core) => Rc::as_ptr(&core) as *const () == signal.core_addr(),
			None => false,
		}
	}

	pub(crate) fn invocation_key(&self) -> Option<InvocationKey> {
		let id = self.id?;
		let core = self.core.as_ref()?;
		Some(InvocationKey::new(core.as_ptr() as *const () as usize, id))
	}

	pub(crate) fn id(&self) -> Option<GenerationalIndex> {
		self.id
	}
}

impl PartialEq for ConnectionHandle {
	fn eq(&self, other: &Self) -> bool {
		match (self.upgraded(), other.upgraded()) {
			(Some(this), Some(that)) => Rc::ptr_eq(&this, &that) && self.id == other.id,
			// Two handles that reference nothing at all compare equal, the
			// same as two default-constructed ones.
			(None, None) => self.id.is_none() && other.id.is_none(),
			_ => false,
		}
	}
}

impl std::fmt::Debug for ConnectionHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectionHandle")
			.field("id", &self.id)
			.field("active", &self.is_active())
			.finish()
	}
}

/// Exclusive owner of a [`ConnectionHandle`] that disconnects when dropped
/// or reassigned. Move-only.
#[derive(Default)]
pub struct ScopedConnection {
	handle: ConnectionHandle,
}

impl ScopedConnection {
	pub fn new(handle: ConnectionHandle) -> Self {
		ScopedConnection { handle }
	}

	/// Takes ownership of `handle`, disconnecting the previously guarded
	/// connection first.
	pub fn set(&mut self, handle: ConnectionHandle) {
		self.handle.disconnect();
		self.handle = handle;
	}

	pub fn handle(&self) -> &ConnectionHandle {
		&self.handle
	}

	pub fn handle_mut(&mut self) -> &mut ConnectionHandle {
		&mut self.handle
	}
}

impl From<ConnectionHandle> for ScopedConnection {
	fn from(handle: ConnectionHandle) -> Self {
		ScopedConnection::new(handle)
	}
}

impl Drop for ScopedConnection {
	fn drop(&mut self) {
		self.handle.disconnect();
	}
}
